use thiserror::Error;

use crate::range::Range;

#[derive(Error, Debug, PartialEq)]
pub enum LexerError {
    #[error("Found unbalanced brackets or string literals")]
    Unbalanced(Range),
    #[error("Unexpected character `{1}`")]
    UnexpectedCharacter(Range, char),
}

impl LexerError {
    pub fn range(&self) -> Range {
        match self {
            LexerError::Unbalanced(range) => *range,
            LexerError::UnexpectedCharacter(range, _) => *range,
        }
    }
}
