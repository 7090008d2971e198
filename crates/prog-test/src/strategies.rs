//! Proptest strategies for prog expressions.
//!
//! Each arithmetic strategy yields the source text together with the value a plain
//! `f64` reference evaluation produces, so tests can compare the compiler against it.
//!
//! ```rust,ignore
//! use prog_test::strategies::*;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn test_something((code, expected) in arb_arithmetic_expr()) {
//!         // compile `code` and compare with `expected`
//!     }
//! }
//! ```
use proptest::prelude::*;

const OPERATORS: [&str; 3] = ["+", "-", "*"];

fn apply(lhs: f64, op: &str, rhs: f64) -> f64 {
    match op {
        "+" => lhs + rhs,
        "-" => lhs - rhs,
        _ => lhs * rhs,
    }
}

/// Fully parenthesised arithmetic over small integers, nested up to four levels.
pub fn arb_arithmetic_expr() -> impl Strategy<Value = (String, f64)> {
    let leaf = (0i32..50).prop_map(|n| (n.to_string(), n as f64));

    leaf.prop_recursive(4, 16, 2, |inner| {
        (inner.clone(), prop::sample::select(OPERATORS.to_vec()), inner).prop_map(
            |((lhs, a), op, (rhs, b))| (format!("({lhs} {op} {rhs})"), apply(a, op, b)),
        )
    })
}

/// `a op b op c` without parentheses, with the expected value computed by applying
/// `*` before `+`/`-` and otherwise left to right.
pub fn arb_precedence_expr() -> impl Strategy<Value = (String, f64)> {
    (
        0i32..20,
        prop::sample::select(OPERATORS.to_vec()),
        0i32..20,
        prop::sample::select(OPERATORS.to_vec()),
        0i32..20,
    )
        .prop_map(|(a, op1, b, op2, c)| {
            let (a, b, c) = (a as f64, b as f64, c as f64);
            let expected = if op2 == "*" && op1 != "*" {
                apply(a, op1, b * c)
            } else {
                apply(apply(a, op1, b), op2, c)
            };
            (format!("{a} {op1} {b} {op2} {c}"), expected)
        })
}

/// An arithmetic expression and the same expression wrapped in 1 to 5 extra layers of
/// parentheses, with random spacing.
pub fn arb_wrapped_expr() -> impl Strategy<Value = (String, String)> {
    (arb_precedence_expr(), 1usize..6, prop::bool::ANY).prop_map(|((code, _), layers, spaced)| {
        let (open, close) = if spaced { ("( ", " )") } else { ("(", ")") };
        (code.clone(), format!("{}{code}{}", open.repeat(layers), close.repeat(layers)))
    })
}

/// Text whose brackets or string literals do not close.
pub fn arb_unbalanced_expr() -> impl Strategy<Value = String> {
    (
        arb_arithmetic_expr(),
        prop::sample::select(vec!["drop_close", "extra_open", "extra_close", "open_string", "open_bracket"]),
    )
        .prop_map(|((code, _), mutation)| match mutation {
            "drop_close" => format!("({code}"),
            "extra_open" => format!("(({code})"),
            "extra_close" => format!("{code})"),
            "open_string" => format!("{code} + \"abc"),
            _ => format!("@list[{code}"),
        })
}

/// Identifiers usable as variable names: no keywords.
pub fn arb_variable_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_filter("Avoid keywords", |s| {
        !matches!(s.as_str(), "and" | "or" | "xor" | "true" | "false")
    })
}
