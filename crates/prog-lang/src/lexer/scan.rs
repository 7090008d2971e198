//! Character-level checks that run before tokenization.
use std::borrow::Cow;

use super::error::LexerError;
use crate::range::{Position, Range};

/// Rejects text whose parentheses, square brackets or string literals do not close.
///
/// A `"` toggles the in-string state unless it is escaped with a backslash, and
/// brackets inside string literals are not counted.
pub fn check_balance(text: &str) -> Result<(), LexerError> {
    let mut parens = 0i64;
    let mut brackets = 0i64;
    let mut in_string = false;
    let mut escaped = false;
    let mut string_start = 0usize;

    for (column, c) in text.chars().enumerate() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                string_start = column;
            }
            '(' => parens += 1,
            ')' => parens -= 1,
            '[' => brackets += 1,
            ']' => brackets -= 1,
            _ => {}
        }

        if parens < 0 || brackets < 0 {
            return Err(LexerError::Unbalanced(column_range(column)));
        }
    }

    if in_string {
        Err(LexerError::Unbalanced(column_range(string_start)))
    } else if parens != 0 || brackets != 0 {
        Err(LexerError::Unbalanced(column_range(text.chars().count())))
    } else {
        Ok(())
    }
}

fn column_range(index: usize) -> Range {
    Range::new(Position::new(1, index + 1), Position::new(1, index + 2))
}

/// Blanks out parentheses that wrap the whole expression, layer by layer.
///
/// The parentheses are replaced with spaces rather than removed so the columns of
/// every remaining token stay where the author wrote them.
pub fn unwrap_redundant_parens(text: &str) -> Cow<'_, str> {
    let mut current = Cow::Borrowed(text);

    loop {
        let trimmed = current.trim();
        if !trimmed.starts_with('(') || !trimmed.ends_with(')') {
            return current;
        }

        let open = current.len() - current.trim_start().len();
        let close = current.trim_end().len() - 1;

        if matching_paren(&current, open) != Some(close) {
            return current;
        }

        let mut unwrapped = current.into_owned();
        unwrapped.replace_range(open..=open, " ");
        unwrapped.replace_range(close..=close, " ");
        current = Cow::Owned(unwrapped);
    }
}

/// Byte index of the `)` that closes the `(` at `open`, skipping string literals.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::balanced("(1 + [2])", true)]
    #[case::nested("((@a[\"k\"]))", true)]
    #[case::brackets_in_string("\"(\" + \"]\"", true)]
    #[case::escaped_quote(r#""a\"b""#, true)]
    #[case::escaped_backslash(r#""a\\" + "b""#, true)]
    #[case::open_paren("(1 + 2", false)]
    #[case::close_first(")(", false)]
    #[case::open_bracket("@a[1", false)]
    #[case::open_string("\"abc", false)]
    #[case::escaped_closing_quote(r#""abc\""#, false)]
    fn test_check_balance(#[case] input: &str, #[case] balanced: bool) {
        assert_eq!(check_balance(input).is_ok(), balanced);
    }

    #[test]
    fn test_unbalanced_message() {
        assert_eq!(
            check_balance("(1").unwrap_err().to_string(),
            "Found unbalanced brackets or string literals"
        );
    }

    #[rstest]
    #[case::single("(1 + 2)", " 1 + 2 ")]
    #[case::layered(" ((1 + 2)) ", "   1 + 2   ")]
    #[case::not_wrapping("(1) + (2)", "(1) + (2)")]
    #[case::string_paren("(\")\")", " \")\" ")]
    #[case::bare("1 + 2", "1 + 2")]
    fn test_unwrap_redundant_parens(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(unwrap_redundant_parens(input), expected);
    }
}
