use super::{Node, NodeRef};
use crate::Shared;
use crate::ast::Ident;
use crate::error::runtime::RuntimeError;
use crate::scope::VariableScope;
use crate::types::ProgType;
use crate::value::Value;

pub type PropertyGetter = Shared<dyn Fn(&Value) -> Result<Value, RuntimeError> + Send + Sync>;

/// `target.Name`
pub struct PropertyNode {
    target: NodeRef,
    name: Ident,
    getter: PropertyGetter,
    ty: ProgType,
}

impl std::fmt::Debug for PropertyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyNode")
            .field("target", &self.target)
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish()
    }
}

impl PropertyNode {
    pub fn new(target: NodeRef, name: Ident, getter: PropertyGetter, ty: ProgType) -> Self {
        Self {
            target,
            name,
            getter,
            ty,
        }
    }
}

impl Node for PropertyNode {
    fn return_type(&self) -> ProgType {
        self.ty
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        match self.target.execute(scope)? {
            Value::Null => Err(RuntimeError::NullReference(self.name.clone())),
            target => (self.getter)(&target),
        }
    }
}
