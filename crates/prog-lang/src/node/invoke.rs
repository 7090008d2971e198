use super::{Node, NodeRef, execute_all};
use crate::Shared;
use crate::error::runtime::RuntimeError;
use crate::registry::UserProgram;
use crate::scope::VariableScope;
use crate::types::ProgType;
use crate::value::Value;

/// `@name(args)`: evaluates the arguments and hands them to a registered user program.
pub struct ProgCallNode {
    program: Shared<dyn UserProgram>,
    args: Vec<NodeRef>,
}

// Programs may call themselves, so only the callee's name is printed.
impl std::fmt::Debug for ProgCallNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgCallNode")
            .field("program", &self.program.name())
            .field("args", &self.args)
            .finish()
    }
}

impl ProgCallNode {
    pub fn new(program: Shared<dyn UserProgram>, args: Vec<NodeRef>) -> Self {
        Self { program, args }
    }
}

impl Node for ProgCallNode {
    fn return_type(&self) -> ProgType {
        self.program.return_type()
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        let args = execute_all(&self.args, scope)?;
        self.program.invoke(args.into_vec(), scope.call_depth())
    }
}
