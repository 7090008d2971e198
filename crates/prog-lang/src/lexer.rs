pub mod error;
pub mod scan;
pub mod token;

use chrono::TimeDelta;
use error::LexerError;
use nom::Parser;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};
use nom_locate::position;
use smol_str::SmolStr;
use token::{Token, TokenKind};

use crate::number::Number;
use crate::range::{Position, Range, Span};

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token {
                range: span.into(),
                kind: $kind,
            })
            .parse(input)
        }
    };
}

/// Duration units in the order they must appear inside a literal such as `1d 2h 30m`.
const DURATION_UNITS: [(char, fn(i64) -> Option<TimeDelta>); 5] = [
    ('d', TimeDelta::try_days),
    ('h', TimeDelta::try_hours),
    ('m', TimeDelta::try_minutes),
    ('s', TimeDelta::try_seconds),
    ('f', TimeDelta::try_milliseconds),
];

#[derive(Debug, Clone, Default)]
pub struct Lexer;

impl Lexer {
    pub fn new() -> Self {
        Self
    }

    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, LexerError> {
        scan::check_balance(input)?;

        match tokens(Span::new(input)) {
            Ok((span, tokens)) => match span.fragment().chars().next() {
                None => {
                    let eof: Range = span.into();
                    Ok([tokens, vec![Token { range: eof, kind: TokenKind::Eof }]].concat())
                }
                Some(c) => {
                    let start: Position = span.into();
                    let end = Position::new(start.line, start.column + 1);
                    Err(LexerError::UnexpectedCharacter(Range::new(start, end), c))
                }
            },
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(LexerError::Unbalanced(e.input.into()))
            }
            Err(nom::Err::Incomplete(_)) => Err(LexerError::Unbalanced(Range::default())),
        }
    }
}

define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(dot, ".", TokenKind::Dot);
define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(l_bracket, "[", TokenKind::LBracket);
define_token_parser!(r_bracket, "]", TokenKind::RBracket);
define_token_parser!(eq_eq, "==", TokenKind::EqEq);
define_token_parser!(ne_eq, "!=", TokenKind::NeEq);
define_token_parser!(lt_gt, "<>", TokenKind::LtGt);
define_token_parser!(tilde_eq, "~=", TokenKind::TildeEq);
define_token_parser!(gte, ">=", TokenKind::Gte);
define_token_parser!(lte, "<=", TokenKind::Lte);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(equal, "=", TokenKind::Equal);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(asterisk, "*", TokenKind::Asterisk);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);
define_token_parser!(caret, "^", TokenKind::Caret);

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((comma, dot, l_paren, r_paren, l_bracket, r_bracket)).parse(input)
}

// Two-character operators must be tried before their one-character prefixes.
fn operators(input: Span) -> IResult<Span, Token> {
    alt((
        eq_eq, ne_eq, lt_gt, tilde_eq, gte, lte, gt, lt, equal, plus, minus, asterisk, slash, percent, caret,
    ))
    .parse(input)
}

type ParseError<'a> = nom::error::Error<Span<'a>>;

fn here(input: Span) -> IResult<Span, Span> {
    position(input)
}

fn word_end(input: Span) -> IResult<Span, ()> {
    not(peek(satisfy(|c: char| c.is_alphanumeric() || c == '_'))).parse(input)
}

// A digit may follow a unit directly, since it starts the next segment (`1d2h`).
fn unit_end(input: Span) -> IResult<Span, ()> {
    not(peek(satisfy(|c: char| c.is_alphabetic() || c == '_'))).parse(input)
}

fn duration_segment(unit: char) -> impl Fn(Span) -> IResult<Span, i64> {
    move |input: Span| {
        terminated(
            map_res(digit1, |span: Span| span.fragment().parse::<i64>()),
            terminated(satisfy(move |c: char| c.eq_ignore_ascii_case(&unit)), unit_end),
        )
        .parse(input)
    }
}

fn duration_literal(input: Span) -> IResult<Span, Token> {
    let (mut rest, start) = here(input)?;
    let mut total = TimeDelta::zero();
    let mut found = false;

    for (unit, scale) in DURATION_UNITS {
        let segment = if found {
            preceded(multispace0, duration_segment(unit)).parse(rest)
        } else {
            duration_segment(unit).parse(rest)
        };

        if let Ok((next, amount)) = segment {
            let delta = scale(amount)
                .and_then(|delta| total.checked_add(&delta))
                .ok_or_else(|| {
                    nom::Err::Error(nom::error::Error::new(rest, nom::error::ErrorKind::TooLarge))
                })?;
            total = delta;
            found = true;
            rest = next;
        }
    }

    if !found {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        )));
    }

    let (rest, _) = word_end(rest)?;
    let (rest, end) = here(rest)?;
    Ok((
        rest,
        Token {
            range: Range::new(start.into(), end.into()),
            kind: TokenKind::DurationLiteral(total),
        },
    ))
}

fn number_literal(input: Span) -> IResult<Span, Token> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |span: Span| {
            str::parse::<f64>(span.fragment()).map(|n| Token {
                range: span.into(),
                kind: TokenKind::NumberLiteral(Number::new(n)),
            })
        },
    )
    .parse(input)
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    let (span, start) = here(input)?;
    let (span, _) = char::<Span, ParseError>('"').parse(span)?;
    let mut text = String::new();
    let mut chars = span.fragment().char_indices();
    let mut closing = None;

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                closing = Some(i);
                break;
            }
            '\\' => match chars.next() {
                Some((_, '"')) => text.push('"'),
                Some((_, '\\')) => text.push('\\'),
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, other)) => {
                    text.push('\\');
                    text.push(other);
                }
                None => break,
            },
            c => text.push(c),
        }
    }

    let Some(closing) = closing else {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    };

    let consumed = span.fragment()[..=closing].chars().count();
    let (span, _) = take::<usize, Span, ParseError>(consumed).parse(span)?;
    let (span, end) = here(span)?;

    Ok((
        span,
        Token {
            range: Range::new(start.into(), end.into()),
            kind: TokenKind::StringLiteral(text),
        },
    ))
}

fn literals(input: Span) -> IResult<Span, Token> {
    alt((duration_literal, number_literal, string_literal)).parse(input)
}

fn identifier(input: Span) -> IResult<Span, Span> {
    recognize(pair(alpha1, many0(alt((alphanumeric1, tag("_")))))).parse(input)
}

fn variable(input: Span) -> IResult<Span, Token> {
    map(recognize(preceded(char('@'), identifier)), |span: Span| Token {
        range: span.into(),
        kind: TokenKind::Variable(SmolStr::new(&span.fragment()[1..])),
    })
    .parse(input)
}

fn ident(input: Span) -> IResult<Span, Token> {
    map(identifier, |span: Span| {
        let kind = match span.fragment().to_ascii_lowercase().as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "xor" => TokenKind::Xor,
            "true" => TokenKind::BoolLiteral(true),
            "false" => TokenKind::BoolLiteral(false),
            _ => TokenKind::Ident(SmolStr::new(span.fragment())),
        };

        Token {
            range: span.into(),
            kind,
        }
    })
    .parse(input)
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((punctuations, operators, literals, variable, ident)).parse(input)
}

fn tokens(input: Span) -> IResult<Span, Vec<Token>> {
    terminated(many0(delimited(multispace0, token, multispace0)), multispace0).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kinds(input: &str) -> Result<Vec<TokenKind>, LexerError> {
        Lexer::new()
            .tokenize(input)
            .map(|tokens| tokens.into_iter().map(|t| t.kind).collect())
    }

    #[rstest]
    #[case::arithmetic("(2 + 3) * 4",
        vec![
            TokenKind::LParen,
            TokenKind::NumberLiteral(2.into()),
            TokenKind::Plus,
            TokenKind::NumberLiteral(3.into()),
            TokenKind::RParen,
            TokenKind::Asterisk,
            TokenKind::NumberLiteral(4.into()),
            TokenKind::Eof,
        ])]
    #[case::keywords_any_case("@x > 5 AND @y Or true",
        vec![
            TokenKind::Variable("x".into()),
            TokenKind::Gt,
            TokenKind::NumberLiteral(5.into()),
            TokenKind::And,
            TokenKind::Variable("y".into()),
            TokenKind::Or,
            TokenKind::BoolLiteral(true),
            TokenKind::Eof,
        ])]
    #[case::not_equal_spellings("1 != 2 <> 3 ~= 4",
        vec![
            TokenKind::NumberLiteral(1.into()),
            TokenKind::NeEq,
            TokenKind::NumberLiteral(2.into()),
            TokenKind::LtGt,
            TokenKind::NumberLiteral(3.into()),
            TokenKind::TildeEq,
            TokenKind::NumberLiteral(4.into()),
            TokenKind::Eof,
        ])]
    #[case::decimal("1.25", vec![TokenKind::NumberLiteral(Number::new(1.25)), TokenKind::Eof])]
    #[case::member("@list.Count",
        vec![
            TokenKind::Variable("list".into()),
            TokenKind::Dot,
            TokenKind::Ident("Count".into()),
            TokenKind::Eof,
        ])]
    #[case::duration("1d 2h 30m",
        vec![
            TokenKind::DurationLiteral(TimeDelta::days(1) + TimeDelta::hours(2) + TimeDelta::minutes(30)),
            TokenKind::Eof,
        ])]
    #[case::millis("5s 250f",
        vec![
            TokenKind::DurationLiteral(TimeDelta::seconds(5) + TimeDelta::milliseconds(250)),
            TokenKind::Eof,
        ])]
    #[case::unspaced("1d2h30m",
        vec![
            TokenKind::DurationLiteral(TimeDelta::days(1) + TimeDelta::hours(2) + TimeDelta::minutes(30)),
            TokenKind::Eof,
        ])]
    #[case::unspaced_hours_minutes("1h30m",
        vec![TokenKind::DurationLiteral(TimeDelta::minutes(90)), TokenKind::Eof])]
    #[case::unspaced_millis("5s250f",
        vec![
            TokenKind::DurationLiteral(TimeDelta::seconds(5) + TimeDelta::milliseconds(250)),
            TokenKind::Eof,
        ])]
    #[case::unspaced_then_operator("2h30m+1m",
        vec![
            TokenKind::DurationLiteral(TimeDelta::minutes(150)),
            TokenKind::Plus,
            TokenKind::DurationLiteral(TimeDelta::minutes(1)),
            TokenKind::Eof,
        ])]
    #[case::escapes(r#""a\"b\\c\nd\qe""#,
        vec![TokenKind::StringLiteral("a\"b\\c\nd\\qe".to_string()), TokenKind::Eof])]
    #[case::empty_string(r#""""#, vec![TokenKind::StringLiteral(String::new()), TokenKind::Eof])]
    #[case::empty("   ", vec![TokenKind::Eof])]
    fn test_tokenize(#[case] input: &str, #[case] expected: Vec<TokenKind>) {
        assert_eq!(kinds(input), Ok(expected));
    }

    #[test]
    fn test_number_then_word_is_not_duration() {
        assert_eq!(
            kinds("5 min"),
            Ok(vec![
                TokenKind::NumberLiteral(5.into()),
                TokenKind::Ident("min".into()),
                TokenKind::Eof,
            ])
        );
    }

    #[test]
    fn test_ranges() {
        let tokens = Lexer::new().tokenize("@a + \"xy\"").unwrap();
        assert_eq!(tokens[0].range, Range::new(Position::new(1, 1), Position::new(1, 3)));
        assert_eq!(tokens[2].range, Range::new(Position::new(1, 6), Position::new(1, 10)));
    }

    #[rstest]
    #[case::unbalanced_paren("(1 + 2")]
    #[case::unbalanced_string("\"abc")]
    fn test_unbalanced(#[case] input: &str) {
        assert!(matches!(Lexer::new().tokenize(input), Err(LexerError::Unbalanced(_))));
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(
            Lexer::new().tokenize("1 # 2"),
            Err(LexerError::UnexpectedCharacter(
                Range::new(Position::new(1, 3), Position::new(1, 4)),
                '#'
            ))
        );
    }
}
