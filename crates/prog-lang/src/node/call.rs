use super::{Node, NodeRef, execute_all};
use crate::ast::Ident;
use crate::error::runtime::RuntimeError;
use crate::scope::VariableScope;
use crate::types::ProgType;
use crate::value::Value;

/// Native implementation of a built-in function, called with already evaluated arguments.
pub type BuiltinFn = fn(&[Value]) -> Result<Value, RuntimeError>;

#[derive(Debug)]
pub struct BuiltinCallNode {
    name: Ident,
    func: BuiltinFn,
    args: Vec<NodeRef>,
    ty: ProgType,
}

impl BuiltinCallNode {
    pub fn new(name: Ident, func: BuiltinFn, args: Vec<NodeRef>, ty: ProgType) -> Self {
        Self { name, func, args, ty }
    }
}

impl Node for BuiltinCallNode {
    fn return_type(&self) -> ProgType {
        self.ty
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        let args = execute_all(&self.args, scope)?;
        (self.func)(&args).map_err(|e| match e {
            RuntimeError::InvalidTypes { .. } => RuntimeError::invalid_types(&self.name, &args),
            e => e,
        })
    }
}

/// `if(condition, then, otherwise)`; only the selected branch is executed.
#[derive(Debug)]
pub struct IfNode {
    args: Vec<NodeRef>,
    ty: ProgType,
}

impl IfNode {
    pub fn new(args: Vec<NodeRef>, ty: ProgType) -> Self {
        Self { args, ty }
    }
}

impl Node for IfNode {
    fn return_type(&self) -> ProgType {
        self.ty
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        let [condition, then, otherwise] = self.args.as_slice() else {
            return Err(RuntimeError::Runtime("if takes exactly three arguments".to_string()));
        };

        match condition.execute(scope)? {
            Value::Boolean(true) => then.execute(scope),
            Value::Boolean(false) => otherwise.execute(scope),
            other => Err(RuntimeError::invalid_types("if", &[other])),
        }
    }
}
