use smol_str::SmolStr;
use thiserror::Error;

use crate::number::Number;

type ProgramName = SmolStr;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum RuntimeError {
    #[error("Divided by 0")]
    ZeroDivision,
    #[error("Index {index} is out of range for a collection of {len} elements")]
    IndexOutOfBounds { index: Number, len: usize },
    #[error("The variable @{0} has no value")]
    UndefinedVariable(SmolStr),
    #[error("Cannot read {0} of a null value")]
    NullReference(SmolStr),
    #[error("Maximum call depth of {0} exceeded")]
    RecursionError(u32),
    #[error(r#"Invalid types for "{}", got {}"#, name, args.join(", "))]
    InvalidTypes { name: SmolStr, args: Vec<SmolStr> },
    #[error("There is no program @{0}")]
    UndefinedProgram(ProgramName),
    #[error("Program @{0} has not been compiled")]
    NotCompiled(ProgramName),
    #[error("Error in program @{name} at line {line}: {inner}")]
    Program {
        name: ProgramName,
        line: usize,
        inner: Box<RuntimeError>,
    },
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl RuntimeError {
    /// Builds the type-mismatch error for a function given the runtime values it received.
    pub fn invalid_types(name: &str, args: &[crate::Value]) -> Self {
        RuntimeError::InvalidTypes {
            name: SmolStr::new(name),
            args: args.iter().map(|v| SmolStr::new_static(v.name())).collect(),
        }
    }
}
