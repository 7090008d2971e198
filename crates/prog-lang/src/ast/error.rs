use thiserror::Error;

use crate::lexer::token::Token;
use crate::range::Range;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token `{0}`")]
    UnexpectedToken(Token),
    #[error("Unexpected end of expression")]
    UnexpectedEOFDetected(Range),
    #[error("Expected a closing parenthesis `)` but got `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedClosingParen(Token),
    #[error("Expected a closing bracket `]` but got `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedClosingBracket(Token),
    #[error("Expected a member name after `.` but got `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedMemberName(Token),
    #[error("Only an indexer such as `@dict[\"key\"]` can be assigned to")]
    InvalidAssignmentTarget(Token),
    #[error("Expression is nested more than {1} levels deep")]
    NestingTooDeep(Range, usize),
}

impl ParseError {
    pub fn range(&self) -> Range {
        match self {
            ParseError::UnexpectedToken(token)
            | ParseError::ExpectedClosingParen(token)
            | ParseError::ExpectedClosingBracket(token)
            | ParseError::ExpectedMemberName(token)
            | ParseError::InvalidAssignmentTarget(token) => token.range,
            ParseError::UnexpectedEOFDetected(range) | ParseError::NestingTooDeep(range, _) => *range,
        }
    }
}
