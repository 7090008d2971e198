use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use smol_str::SmolStr;
use thiserror::Error;

use crate::ast::Ident;
use crate::range::Range;
use crate::types::ProgType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// A type or name-resolution failure, located at the sub-expression that caused it.
#[derive(Error, Debug, PartialEq)]
#[error("{kind}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub range: Range,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, range: Range) -> Self {
        Self { kind, range }
    }

    /// Range of the innermost failing sub-expression.
    pub fn location(&self) -> Range {
        match &self.kind {
            CompileErrorKind::Operand { inner, .. }
            | CompileErrorKind::Argument { inner, .. }
            | CompileErrorKind::Member { inner, .. }
            | CompileErrorKind::Indexer { inner }
            | CompileErrorKind::ExtensionInner { inner, .. } => inner.location(),
            _ => self.range,
        }
    }

    /// The innermost error kind, with every wrapping layer removed.
    pub fn root(&self) -> &CompileErrorKind {
        match &self.kind {
            CompileErrorKind::Operand { inner, .. }
            | CompileErrorKind::Argument { inner, .. }
            | CompileErrorKind::Member { inner, .. }
            | CompileErrorKind::Indexer { inner }
            | CompileErrorKind::ExtensionInner { inner, .. } => inner.root(),
            kind => kind,
        }
    }
}

fn describe_args(args: &[ProgType]) -> String {
    args.iter().join(", ")
}

#[derive(Error, Debug, PartialEq)]
pub enum CompileErrorKind {
    #[error("The variable @{0} is not defined")]
    UndefinedVariable(Ident),
    #[error("Unexpected identifier `{0}`, variables are written as @{0}")]
    BareIdentifier(Ident),
    #[error("Error with {side} operand of {operator}: {inner}")]
    Operand {
        operator: SmolStr,
        side: Side,
        inner: Box<CompileError>,
    },
    #[error("Operator {operator} cannot be applied to {left} and {right}")]
    OperatorTypes {
        operator: SmolStr,
        left: ProgType,
        right: ProgType,
    },
    #[error("Operator - cannot be applied to {0}")]
    NegateType(ProgType),
    #[error("There is no function called {0}")]
    UndefinedFunction(Ident),
    #[error("Error with argument {index} of {function}: {inner}")]
    Argument {
        function: Ident,
        index: usize,
        inner: Box<CompileError>,
    },
    #[error("No overload of {function} accepts ({})", describe_args(args))]
    NoMatchingOverload { function: Ident, args: Vec<ProgType> },
    #[error("There is no program @{name} accepting ({})", describe_args(args))]
    UndefinedProgram { name: Ident, args: Vec<ProgType> },
    #[error("{owner} has no property {name}")]
    UndefinedProperty { owner: ProgType, name: Ident },
    #[error("Error with target of .{member}: {inner}")]
    Member { member: Ident, inner: Box<CompileError> },
    #[error("{0} cannot be indexed")]
    NotIndexable(ProgType),
    #[error("Indexing {target} requires a {expected} key, not {actual}")]
    IndexKey {
        target: ProgType,
        expected: ProgType,
        actual: ProgType,
    },
    #[error("Error with indexer: {inner}")]
    Indexer { inner: Box<CompileError> },
    #[error("Cannot assign {actual} to an element of {target}")]
    AssignmentType { target: ProgType, actual: ProgType },
    #[error("Collection extension {0} must be called as {0}(variable, expression)")]
    ExtensionShape(Ident),
    #[error("{function} can only be called on a collection, not on {target}")]
    ExtensionTarget { function: Ident, target: ProgType },
    #[error("Error in inner expression of {function}: {inner}")]
    ExtensionInner { function: Ident, inner: Box<CompileError> },
    #[error("There is no collection extension {function} for {element} elements with a {inner} expression")]
    UndefinedExtension {
        function: Ident,
        element: ProgType,
        inner: ProgType,
    },
    #[error("Expected a {expected} return value, found {actual}")]
    ReturnType { expected: ProgType, actual: ProgType },
}

impl CompileErrorKind {
    pub fn at(self, range: Range) -> CompileError {
        CompileError::new(self, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Position;

    #[test]
    fn test_nested_message_and_location() {
        let inner_range = Range::new(Position::new(1, 5), Position::new(1, 7));
        let inner = CompileErrorKind::UndefinedVariable("y".into()).at(inner_range);
        let outer = CompileErrorKind::Operand {
            operator: "+".into(),
            side: Side::Right,
            inner: Box::new(inner),
        }
        .at(Range::default());

        assert_eq!(
            outer.to_string(),
            "Error with right operand of +: The variable @y is not defined"
        );
        assert_eq!(outer.location(), inner_range);
        assert_eq!(outer.root(), &CompileErrorKind::UndefinedVariable("y".into()));
    }
}
