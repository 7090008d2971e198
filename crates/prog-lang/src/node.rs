//! The executable tree produced by the compiler.
//!
//! Nodes are immutable once built. Each execution threads its own [`VariableScope`]
//! through the tree and returns results up the call stack, so one compiled tree can be
//! executed from several threads at once.
pub mod binary;
pub mod call;
pub mod constant;
pub mod dot;
pub mod extension;
pub mod index;
pub mod invoke;
pub mod unary;
pub mod variable;

use std::fmt::Debug;

use crate::error::runtime::RuntimeError;
use crate::scope::VariableScope;
use crate::types::ProgType;
use crate::value::Value;

pub trait Node: Debug + Send + Sync {
    /// The static type of every value this node produces.
    fn return_type(&self) -> ProgType;

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError>;

    /// `true` for nodes built directly from a literal in the source text.
    fn is_literal(&self) -> bool {
        false
    }
}

pub type NodeRef = Box<dyn Node>;

/// Executes `nodes` left to right, stopping at the first failure.
pub(crate) fn execute_all(
    nodes: &[NodeRef],
    scope: &mut VariableScope,
) -> Result<smallvec::SmallVec<[Value; 4]>, RuntimeError> {
    nodes.iter().map(|node| node.execute(scope)).collect()
}
