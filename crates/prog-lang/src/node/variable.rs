use super::Node;
use crate::ast::Ident;
use crate::error::runtime::RuntimeError;
use crate::scope::VariableScope;
use crate::types::ProgType;
use crate::value::Value;

#[derive(Debug)]
pub struct VariableNode {
    name: Ident,
    ty: ProgType,
}

impl VariableNode {
    pub fn new(name: Ident, ty: ProgType) -> Self {
        Self { name, ty }
    }
}

impl Node for VariableNode {
    fn return_type(&self) -> ProgType {
        self.ty
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        scope
            .resolve(&self.name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedVariable(self.name.clone()))
    }
}
