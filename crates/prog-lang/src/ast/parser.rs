use std::iter::Peekable;

use smol_str::SmolStr;

use super::error::ParseError;
use super::node::{Args, BinaryOp, Expr, Literal, Node, Operator};
use crate::lexer::token::{Token, TokenKind};
use crate::range::Range;

const POWER_PRECEDENCE: u8 = 5;

pub struct Parser<'a> {
    tokens: Peekable<core::slice::Iter<'a, Token>>,
    depth: usize,
    max_depth: usize,
    eof: Range,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], max_depth: usize) -> Self {
        Self {
            eof: tokens.last().map(|t| t.range).unwrap_or_default(),
            tokens: tokens.iter().peekable(),
            depth: 0,
            max_depth,
        }
    }

    /// Parses a single expression that must span the whole token stream.
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let node = self.parse_expr()?;

        match self.tokens.next() {
            Some(token) if token.is_eof() => Ok(node),
            Some(token) => Err(ParseError::UnexpectedToken(token.clone())),
            None => Ok(node),
        }
    }

    fn parse_expr(&mut self) -> Result<Node, ParseError> {
        self.enter()?;
        let lhs = self.parse_unary()?;
        let lhs = Self::parse_binary_op(self, 1, lhs)?;
        let node = self.parse_assignment(lhs)?;
        self.depth -= 1;
        Ok(node)
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            let range = self.tokens.peek().map(|t| t.range).unwrap_or(self.eof);
            return Err(ParseError::NestingTooDeep(range, self.max_depth));
        }
        Ok(())
    }

    // Assignment binds loosest and is only legal when the left side is an indexer.
    fn parse_assignment(&mut self, lhs: Node) -> Result<Node, ParseError> {
        let Some(token) = self.tokens.next_if(|t| matches!(t.kind, TokenKind::Equal)) else {
            return Ok(lhs);
        };

        match lhs.expr {
            Expr::Index(target, key) => {
                let value = self.parse_expr()?;
                Ok(Node::new(
                    lhs.range.merge(&value.range),
                    Expr::Assign(target, key, Box::new(value)),
                ))
            }
            _ => Err(ParseError::InvalidAssignmentTarget(token.clone())),
        }
    }

    fn is_binary_op(kind: &TokenKind) -> bool {
        Self::binary_op_precedence(kind) > 0
    }

    fn binary_op_precedence(kind: &TokenKind) -> u8 {
        match kind {
            TokenKind::And | TokenKind::Or | TokenKind::Xor => 1,
            TokenKind::EqEq
            | TokenKind::NeEq
            | TokenKind::LtGt
            | TokenKind::TildeEq
            | TokenKind::Gt
            | TokenKind::Gte
            | TokenKind::Lt
            | TokenKind::Lte => 2,
            TokenKind::Plus | TokenKind::Minus => 3,
            TokenKind::Asterisk | TokenKind::Slash | TokenKind::Percent => 4,
            TokenKind::Caret => POWER_PRECEDENCE,
            _ => 0,
        }
    }

    fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
        let op = match kind {
            TokenKind::And => BinaryOp::And,
            TokenKind::Or => BinaryOp::Or,
            TokenKind::Xor => BinaryOp::Xor,
            TokenKind::EqEq => BinaryOp::Equal,
            TokenKind::NeEq | TokenKind::LtGt | TokenKind::TildeEq => BinaryOp::NotEqual,
            TokenKind::Gt => BinaryOp::Greater,
            TokenKind::Gte => BinaryOp::GreaterEqual,
            TokenKind::Lt => BinaryOp::Less,
            TokenKind::Lte => BinaryOp::LessEqual,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Subtract,
            TokenKind::Asterisk => BinaryOp::Multiply,
            TokenKind::Slash => BinaryOp::Divide,
            TokenKind::Percent => BinaryOp::Modulo,
            TokenKind::Caret => BinaryOp::Power,
            _ => return None,
        };
        Some(op)
    }

    // Precedence climbing; every tier is left-associative.
    fn parse_binary_op(parser: &mut Parser, min_prec: u8, mut lhs: Node) -> Result<Node, ParseError> {
        while let Some(peeked) = parser.tokens.peek() {
            let kind = &peeked.kind;
            if !Self::is_binary_op(kind) {
                break;
            }

            let prec = Self::binary_op_precedence(kind);
            if prec < min_prec {
                break;
            }

            let Some(operator_token) = parser.tokens.next() else {
                break;
            };
            let Some(op) = Self::binary_op(&operator_token.kind) else {
                return Err(ParseError::UnexpectedToken(operator_token.clone()));
            };
            let mut rhs = parser.parse_unary()?;

            loop {
                let next_prec = match parser.tokens.peek() {
                    Some(next) if Self::is_binary_op(&next.kind) => Self::binary_op_precedence(&next.kind),
                    _ => 0,
                };

                if next_prec > prec {
                    rhs = Self::parse_binary_op(parser, next_prec, rhs)?;
                } else {
                    break;
                }
            }

            let range = lhs.range.merge(&rhs.range);
            lhs = Node::new(
                range,
                Expr::Binary(
                    Operator {
                        op,
                        symbol: SmolStr::new(operator_token.to_string()),
                    },
                    Box::new(lhs),
                    Box::new(rhs),
                ),
            );
        }

        Ok(lhs)
    }

    // Prefix minus binds tighter than everything except `^`, so `-2^2` is `-(2^2)`.
    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        match self.tokens.next_if(|t| matches!(t.kind, TokenKind::Minus)) {
            Some(minus) => {
                self.enter()?;
                let operand = self.parse_unary()?;
                let operand = Self::parse_binary_op(self, POWER_PRECEDENCE, operand)?;
                self.depth -= 1;
                Ok(Node::new(
                    minus.range.merge(&operand.range),
                    Expr::Negate(Box::new(operand)),
                ))
            }
            None => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let Some(token) = self.tokens.next() else {
            return Err(ParseError::UnexpectedEOFDetected(self.eof));
        };

        match &token.kind {
            TokenKind::NumberLiteral(n) => Ok(Node::new(token.range, Expr::Literal(Literal::Number(*n)))),
            TokenKind::StringLiteral(s) => Ok(Node::new(token.range, Expr::Literal(Literal::Text(s.clone())))),
            TokenKind::BoolLiteral(b) => Ok(Node::new(token.range, Expr::Literal(Literal::Boolean(*b)))),
            TokenKind::DurationLiteral(d) => Ok(Node::new(token.range, Expr::Literal(Literal::TimeSpan(*d)))),
            TokenKind::Variable(name) => match self.tokens.next_if(|t| matches!(t.kind, TokenKind::LParen)) {
                Some(_) => {
                    let (args, end) = self.parse_args()?;
                    Ok(Node::new(token.range.merge(&end), Expr::ProgCall(name.clone(), args)))
                }
                None => Ok(Node::new(token.range, Expr::Variable(name.clone()))),
            },
            TokenKind::Ident(name) => match self.tokens.next_if(|t| matches!(t.kind, TokenKind::LParen)) {
                Some(_) => {
                    let (args, end) = self.parse_args()?;
                    Ok(Node::new(token.range.merge(&end), Expr::Call(name.clone(), args)))
                }
                None => Ok(Node::new(token.range, Expr::Ident(name.clone()))),
            },
            TokenKind::LParen => self.parse_paren(token),
            TokenKind::Eof => Err(ParseError::UnexpectedEOFDetected(token.range)),
            _ => Err(ParseError::UnexpectedToken(token.clone())),
        }
    }

    // Runs of opening parentheses are consumed together so that `((((x))))` costs a
    // single level of nesting; after each closing parenthesis the enclosed expression
    // may continue with postfix and binary operators.
    fn parse_paren(&mut self, open: &Token) -> Result<Node, ParseError> {
        let mut layers = 1usize;
        while self.tokens.next_if(|t| matches!(t.kind, TokenKind::LParen)).is_some() {
            layers += 1;
        }

        let mut node = self.parse_expr()?;

        for layer in (0..layers).rev() {
            match self.tokens.next() {
                Some(token) if matches!(token.kind, TokenKind::RParen) => {
                    node.range = open.range.merge(&token.range).merge(&node.range);
                }
                Some(token) => return Err(ParseError::ExpectedClosingParen(token.clone())),
                None => return Err(ParseError::UnexpectedEOFDetected(self.eof)),
            }

            node = self.parse_postfix(node)?;

            if layer > 0 {
                node = Self::parse_binary_op(self, 1, node)?;
                node = self.parse_assignment(node)?;
            }
        }

        Ok(node)
    }

    fn parse_postfix(&mut self, mut node: Node) -> Result<Node, ParseError> {
        loop {
            match self.tokens.peek().map(|t| &t.kind) {
                Some(TokenKind::Dot) => {
                    self.tokens.next();
                    let name = match self.tokens.next() {
                        Some(Token {
                            kind: TokenKind::Ident(name),
                            range,
                        }) => (name.clone(), *range),
                        Some(token) => return Err(ParseError::ExpectedMemberName(token.clone())),
                        None => return Err(ParseError::UnexpectedEOFDetected(self.eof)),
                    };

                    node = match self.tokens.next_if(|t| matches!(t.kind, TokenKind::LParen)) {
                        Some(_) => {
                            let (args, end) = self.parse_args()?;
                            Node::new(node.range.merge(&end), Expr::Dot(Box::new(node), name.0, Some(args)))
                        }
                        None => Node::new(node.range.merge(&name.1), Expr::Dot(Box::new(node), name.0, None)),
                    };
                }
                Some(TokenKind::LBracket) => {
                    self.tokens.next();
                    let key = self.parse_expr()?;
                    match self.tokens.next() {
                        Some(token) if matches!(token.kind, TokenKind::RBracket) => {
                            node = Node::new(node.range.merge(&token.range), Expr::Index(Box::new(node), Box::new(key)));
                        }
                        Some(token) => return Err(ParseError::ExpectedClosingBracket(token.clone())),
                        None => return Err(ParseError::UnexpectedEOFDetected(self.eof)),
                    }
                }
                _ => return Ok(node),
            }
        }
    }

    /// Parses a comma separated argument list after its opening parenthesis, returning
    /// the range of the closing parenthesis.
    fn parse_args(&mut self) -> Result<(Args, Range), ParseError> {
        let mut args = Args::new();

        if let Some(close) = self.tokens.next_if(|t| matches!(t.kind, TokenKind::RParen)) {
            return Ok((args, close.range));
        }

        loop {
            args.push(self.parse_expr()?);

            match self.tokens.next() {
                Some(token) if matches!(token.kind, TokenKind::Comma) => continue,
                Some(token) if matches!(token.kind, TokenKind::RParen) => return Ok((args, token.range)),
                Some(token) if token.is_eof() => return Err(ParseError::UnexpectedEOFDetected(token.range)),
                Some(token) => return Err(ParseError::ExpectedClosingParen(token.clone())),
                None => return Err(ParseError::UnexpectedEOFDetected(self.eof)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use rstest::rstest;

    fn parse(input: &str) -> Result<Node, ParseError> {
        let tokens = Lexer::new().tokenize(input).unwrap();
        Parser::new(&tokens, 64).parse()
    }

    /// Renders a tree with explicit grouping so precedence is easy to assert.
    fn render(node: &Node) -> String {
        match &node.expr {
            Expr::Literal(Literal::Number(n)) => n.to_string(),
            Expr::Literal(Literal::Text(s)) => format!("{s:?}"),
            Expr::Literal(Literal::Boolean(b)) => b.to_string(),
            Expr::Literal(Literal::TimeSpan(d)) => format!("{}s", d.num_seconds()),
            Expr::Variable(name) => format!("@{name}"),
            Expr::Ident(name) => name.to_string(),
            Expr::Call(name, args) => format!("{name}({})", args.iter().map(render).collect::<Vec<_>>().join(", ")),
            Expr::ProgCall(name, args) => {
                format!("@{name}({})", args.iter().map(render).collect::<Vec<_>>().join(", "))
            }
            Expr::Binary(op, lhs, rhs) => format!("({} {} {})", render(lhs), op, render(rhs)),
            Expr::Negate(operand) => format!("(-{})", render(operand)),
            Expr::Dot(target, name, None) => format!("{}.{name}", render(target)),
            Expr::Dot(target, name, Some(args)) => format!(
                "{}.{name}({})",
                render(target),
                args.iter().map(render).collect::<Vec<_>>().join(", ")
            ),
            Expr::Index(target, key) => format!("{}[{}]", render(target), render(key)),
            Expr::Assign(target, key, value) => {
                format!("({}[{}] = {})", render(target), render(key), render(value))
            }
        }
    }

    #[rstest]
    #[case::multiplicative_over_additive("1 + 2 * 3", "(1 + (2 * 3))")]
    #[case::parens("(2 + 3) * 4", "((2 + 3) * 4)")]
    #[case::left_assoc_sub("10 - 4 - 3", "((10 - 4) - 3)")]
    #[case::left_assoc_power("2 ^ 3 ^ 2", "((2 ^ 3) ^ 2)")]
    #[case::comparison_over_logical("@x > 5 and @x < 10", "((@x > 5) and (@x < 10))")]
    #[case::single_logical_tier("@a or @b and @c", "((@a or @b) and @c)")]
    #[case::negate_power("-2 ^ 2", "(-(2 ^ 2))")]
    #[case::negate_product("-2 * 3", "((-2) * 3)")]
    #[case::spelled_not_equal("1 <> 2", "(1 <> 2)")]
    #[case::redundant_parens("((((1))))", "1")]
    #[case::paren_continuations("((1 + 2) * 3) - 4", "(((1 + 2) * 3) - 4)")]
    #[case::sibling_parens("((1) + (2))", "(1 + 2)")]
    #[case::call("max(1, 2 + 3)", "max(1, (2 + 3))")]
    #[case::empty_call("now()", "now()")]
    #[case::prog_call("@double(4)", "@double(4)")]
    #[case::member("@ch.Name.Length", "@ch.Name.Length")]
    #[case::extension("@list.where(x, @x > 5)", "@list.where(x, (@x > 5))")]
    #[case::index("@d[\"k\"][0]", "@d[\"k\"][0]")]
    #[case::index_then_member("(@l)[0].Length", "@l[0].Length")]
    #[case::assign("@d[\"k\"] = 1 + 2", "(@d[\"k\"] = (1 + 2))")]
    #[case::duration("1m + 30s", "(60s + 30s)")]
    fn test_parse(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse(input).map(|node| render(&node)), Ok(expected.to_string()));
    }

    #[rstest]
    #[case::dangling_operator("1 +")]
    #[case::trailing_token("1 2")]
    #[case::assign_to_variable("@x = 1")]
    #[case::missing_member("@x.")]
    #[case::missing_comma("max(1 2)")]
    #[case::empty("")]
    fn test_parse_error(#[case] input: &str) {
        assert!(parse(input).is_err());
    }

    #[test]
    fn test_assign_error_names_target() {
        assert_eq!(
            parse("1 = 2").map_err(|e| e.to_string()),
            Err("Only an indexer such as `@dict[\"key\"]` can be assigned to".to_string())
        );
    }

    #[test]
    fn test_nesting_limit() {
        let input = format!("{}1{}", "-(".repeat(40), ")".repeat(40));
        let tokens = Lexer::new().tokenize(&input).unwrap();
        assert!(matches!(
            Parser::new(&tokens, 16).parse(),
            Err(ParseError::NestingTooDeep(_, 16))
        ));
        assert!(Parser::new(&tokens, 256).parse().is_ok());
    }

    #[test]
    fn test_binary_range_covers_operands() {
        let node = parse("@a + 12").unwrap();
        assert_eq!(node.range.start.column, 1);
        assert_eq!(node.range.end.column, 8);
    }
}
