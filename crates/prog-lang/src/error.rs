pub mod runtime;

use miette::{Diagnostic, SourceSpan};

use crate::ast::error::ParseError;
use crate::compiler::error::{CompileError, CompileErrorKind};
use crate::lexer::error::LexerError;
use crate::range::Range;
use runtime::RuntimeError;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl InnerError {
    fn range(&self) -> Option<Range> {
        match self {
            InnerError::Lexer(e) => Some(e.range()),
            InnerError::Parse(e) => Some(e.range()),
            InnerError::Compile(e) => Some(e.location()),
            InnerError::Runtime(_) => None,
        }
    }
}

/// A failure to compile or execute one source line, with diagnostic information for the user.
#[derive(PartialEq, Debug, thiserror::Error)]
#[error("Line {line}: {cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The source line that failed.
    pub source_code: String,
    /// The 1-based line number the caller compiled the source under.
    pub line: usize,
    /// The location in the source line for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, line: usize, cause: impl Into<InnerError>) -> Self {
        let source_code = source_code.into();
        let cause = cause.into();

        let location = match cause.range() {
            Some(range) => {
                let (offset, len) = range.to_offset(&source_code);
                SourceSpan::new(offset.into(), len)
            }
            None => SourceSpan::new(0.into(), source_code.len().max(1)),
        };

        Self {
            cause,
            source_code,
            line,
            location,
        }
    }

    /// The message without the line prefix.
    pub fn message(&self) -> String {
        self.cause.to_string()
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match &self.cause {
            InnerError::Lexer(LexerError::Unbalanced(_)) => "LexerError::Unbalanced",
            InnerError::Lexer(LexerError::UnexpectedCharacter(_, _)) => "LexerError::UnexpectedCharacter",
            InnerError::Parse(ParseError::UnexpectedToken(_)) => "ParseError::UnexpectedToken",
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => "ParseError::UnexpectedEOFDetected",
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => "ParseError::ExpectedClosingParen",
            InnerError::Parse(ParseError::ExpectedClosingBracket(_)) => "ParseError::ExpectedClosingBracket",
            InnerError::Parse(ParseError::ExpectedMemberName(_)) => "ParseError::ExpectedMemberName",
            InnerError::Parse(ParseError::InvalidAssignmentTarget(_)) => "ParseError::InvalidAssignmentTarget",
            InnerError::Parse(ParseError::NestingTooDeep(_, _)) => "ParseError::NestingTooDeep",
            InnerError::Compile(e) => match e.root() {
                CompileErrorKind::UndefinedVariable(_) => "CompileError::UndefinedVariable",
                CompileErrorKind::BareIdentifier(_) => "CompileError::BareIdentifier",
                CompileErrorKind::OperatorTypes { .. } | CompileErrorKind::NegateType(_) => {
                    "CompileError::OperatorTypes"
                }
                CompileErrorKind::UndefinedFunction(_) => "CompileError::UndefinedFunction",
                CompileErrorKind::NoMatchingOverload { .. } => "CompileError::NoMatchingOverload",
                CompileErrorKind::UndefinedProgram { .. } => "CompileError::UndefinedProgram",
                CompileErrorKind::UndefinedProperty { .. } => "CompileError::UndefinedProperty",
                CompileErrorKind::NotIndexable(_)
                | CompileErrorKind::IndexKey { .. }
                | CompileErrorKind::AssignmentType { .. } => "CompileError::Indexer",
                CompileErrorKind::ExtensionShape(_)
                | CompileErrorKind::ExtensionTarget { .. }
                | CompileErrorKind::UndefinedExtension { .. } => "CompileError::CollectionExtension",
                CompileErrorKind::ReturnType { .. } => "CompileError::ReturnType",
                CompileErrorKind::Operand { .. }
                | CompileErrorKind::Argument { .. }
                | CompileErrorKind::Member { .. }
                | CompileErrorKind::Indexer { .. }
                | CompileErrorKind::ExtensionInner { .. } => "CompileError",
            },
            InnerError::Runtime(RuntimeError::ZeroDivision) => "RuntimeError::ZeroDivision",
            InnerError::Runtime(RuntimeError::IndexOutOfBounds { .. }) => "RuntimeError::IndexOutOfBounds",
            InnerError::Runtime(RuntimeError::UndefinedVariable(_)) => "RuntimeError::UndefinedVariable",
            InnerError::Runtime(RuntimeError::NullReference(_)) => "RuntimeError::NullReference",
            InnerError::Runtime(RuntimeError::RecursionError(_)) => "RuntimeError::RecursionError",
            InnerError::Runtime(RuntimeError::InvalidTypes { .. }) => "RuntimeError::InvalidTypes",
            InnerError::Runtime(RuntimeError::UndefinedProgram(_)) => "RuntimeError::UndefinedProgram",
            InnerError::Runtime(RuntimeError::NotCompiled(_)) => "RuntimeError::NotCompiled",
            InnerError::Runtime(RuntimeError::Program { .. }) => "RuntimeError::Program",
            InnerError::Runtime(RuntimeError::Runtime(_)) => "RuntimeError::Runtime",
        };
        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Lexer(LexerError::Unbalanced(_)) => {
                Some("Check that every `(`, `[` and `\"` has a matching partner.".to_string())
            }
            InnerError::Lexer(LexerError::UnexpectedCharacter(_, _)) => {
                Some("Remove the character or quote it inside a text literal.".to_string())
            }
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => {
                Some("The expression ended early. Check for a missing operand or argument.".to_string())
            }
            InnerError::Parse(ParseError::NestingTooDeep(_, _)) => {
                Some("Split the expression into smaller programs.".to_string())
            }
            InnerError::Parse(_) => Some("Check for syntax errors or misplaced tokens.".to_string()),
            InnerError::Compile(e) => match e.root() {
                CompileErrorKind::UndefinedVariable(name) => {
                    Some(format!("Declare @{name} as a parameter before using it."))
                }
                CompileErrorKind::BareIdentifier(name) => Some(format!("Did you mean @{name}?")),
                CompileErrorKind::NoMatchingOverload { function, .. } => {
                    Some(format!("Run `prog docs` to list the overloads of {function}."))
                }
                CompileErrorKind::UndefinedExtension { .. } | CompileErrorKind::ExtensionShape(_) => Some(
                    "Collection extensions take a loop variable and an expression, e.g. `@list.any(x, @x > 5)`."
                        .to_string(),
                ),
                _ => None,
            },
            InnerError::Runtime(RuntimeError::RecursionError(_)) => {
                Some("Check the program for unbounded recursion.".to_string())
            }
            InnerError::Runtime(_) => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(miette::LabeledSpan::new_with_span(
            Some(format!("{}", self.cause)),
            self.location,
        ))))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Position;

    #[test]
    fn test_from_lexer_error() {
        let range = Range::new(Position::new(1, 3), Position::new(1, 4));
        let error = Error::from_error("1 # 2", 7, LexerError::UnexpectedCharacter(range, '#'));

        assert_eq!(error.line, 7);
        assert_eq!(error.location, SourceSpan::new(2.into(), 1));
        assert_eq!(error.to_string(), "Line 7: Unexpected character `#`");
        assert_eq!(error.message(), "Unexpected character `#`");
        assert_eq!(
            error.code().map(|c| c.to_string()),
            Some("LexerError::UnexpectedCharacter".to_string())
        );
    }

    #[test]
    fn test_from_runtime_error_spans_line() {
        let error = Error::from_error("1 / 0", 1, RuntimeError::ZeroDivision);

        assert_eq!(error.location, SourceSpan::new(0.into(), 5));
        assert!(error.help().is_none());
    }
}
