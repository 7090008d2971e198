use std::fmt::{self, Display, Formatter};

use chrono::TimeDelta;
use smol_str::SmolStr;

use crate::number::Number;
use crate::range::Range;
use crate::value::format_timespan;

#[derive(PartialEq, Debug, Clone)]
pub struct Token {
    pub range: Range,
    pub kind: TokenKind,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum TokenKind {
    And,
    Asterisk,
    BoolLiteral(bool),
    Caret,
    Comma,
    Dot,
    DurationLiteral(TimeDelta),
    Eof,
    EqEq,
    Equal,
    Gt,
    Gte,
    Ident(SmolStr),
    LBracket,
    LParen,
    Lt,
    LtGt,
    Lte,
    Minus,
    NeEq,
    NumberLiteral(Number),
    Or,
    Percent,
    Plus,
    RBracket,
    RParen,
    Slash,
    StringLiteral(String),
    TildeEq,
    Variable(SmolStr),
    Xor,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match &self {
            TokenKind::And => write!(f, "and"),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::BoolLiteral(b) => write!(f, "{}", b),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::DurationLiteral(d) => write!(f, "{}", format_timespan(d)),
            TokenKind::Eof => write!(f, ""),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::Equal => write!(f, "="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Gte => write!(f, ">="),
            TokenKind::Ident(ident) => write!(f, "{}", ident),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::LParen => write!(f, "("),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::LtGt => write!(f, "<>"),
            TokenKind::Lte => write!(f, "<="),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::NeEq => write!(f, "!="),
            TokenKind::NumberLiteral(n) => write!(f, "{}", n),
            TokenKind::Or => write!(f, "or"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::StringLiteral(s) => write!(f, "\"{}\"", s),
            TokenKind::TildeEq => write!(f, "~="),
            TokenKind::Variable(name) => write!(f, "@{}", name),
            TokenKind::Xor => write!(f, "xor"),
        }
    }
}
