use super::{Node, NodeRef};
use crate::error::runtime::RuntimeError;
use crate::scope::VariableScope;
use crate::types::ProgType;
use crate::value::Value;

#[derive(Debug)]
pub struct NegateNode {
    operand: NodeRef,
}

impl NegateNode {
    /// Negation is defined for numbers and time spans only.
    pub fn accepts(ty: &ProgType) -> bool {
        *ty == ProgType::NUMBER || *ty == ProgType::TIMESPAN
    }

    pub fn new(operand: NodeRef) -> Self {
        Self { operand }
    }
}

impl Node for NegateNode {
    fn return_type(&self) -> ProgType {
        self.operand.return_type()
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        match self.operand.execute(scope)? {
            Value::Number(n) => Ok(Value::Number(-n)),
            Value::TimeSpan(t) => Ok(Value::TimeSpan(-t)),
            other => Err(RuntimeError::invalid_types("-", &[other])),
        }
    }
}
