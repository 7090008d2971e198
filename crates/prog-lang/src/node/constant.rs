use super::Node;
use crate::error::runtime::RuntimeError;
use crate::scope::VariableScope;
use crate::types::ProgType;
use crate::value::Value;

#[derive(Debug)]
pub struct ConstantNode {
    value: Value,
    ty: ProgType,
}

impl ConstantNode {
    pub fn new(value: Value, ty: ProgType) -> Self {
        Self { value, ty }
    }
}

impl Node for ConstantNode {
    fn return_type(&self) -> ProgType {
        self.ty
    }

    fn execute(&self, _scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        Ok(self.value.clone())
    }

    fn is_literal(&self) -> bool {
        true
    }
}
