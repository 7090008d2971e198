use std::fmt::{self, Display, Formatter};

use chrono::TimeDelta;
use smol_str::SmolStr;

use crate::number::Number;
use crate::range::Range;

pub type Ident = SmolStr;
pub type Args = Vec<Node>;

#[derive(PartialEq, PartialOrd, Debug, Clone)]
pub enum Literal {
    Boolean(bool),
    Number(Number),
    Text(String),
    TimeSpan(TimeDelta),
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl BinaryOp {
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
        )
    }
}

/// A binary operator together with the spelling the author used, so diagnostics can
/// quote `<>` or `~=` rather than a canonical form.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Operator {
    pub op: BinaryOp,
    pub symbol: SmolStr,
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Node {
    pub range: Range,
    pub expr: Expr,
}

impl Node {
    pub fn new(range: Range, expr: Expr) -> Self {
        Self { range, expr }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    /// `@name`
    Variable(Ident),
    /// A bare word; only meaningful as the loop variable of a collection extension.
    Ident(Ident),
    /// `name(args)`, resolved against the builtin function registry.
    Call(Ident, Args),
    /// `@name(args)`, resolved against registered user programs.
    ProgCall(Ident, Args),
    Binary(Operator, Box<Node>, Box<Node>),
    Negate(Box<Node>),
    /// `target.Name` or `target.name(args)`.
    Dot(Box<Node>, Ident, Option<Args>),
    Index(Box<Node>, Box<Node>),
    /// `target[key] = value`
    Assign(Box<Node>, Box<Node>, Box<Node>),
}
