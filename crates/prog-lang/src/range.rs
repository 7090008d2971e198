use nom_locate::LocatedSpan;

pub type Span<'a> = LocatedSpan<&'a str>;

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub struct Position {
    pub line: u32,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Position {
    pub fn new(line: u32, column: usize) -> Self {
        Position { line, column }
    }
}

/// A column range inside a single source line, used to label diagnostics.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Default, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Range { start, end }
    }

    /// Smallest range covering both `self` and `other`.
    pub fn merge(&self, other: &Range) -> Range {
        Range {
            start: std::cmp::min(self.start, other.start),
            end: std::cmp::max(self.end, other.end),
        }
    }

    /// Byte offset and length of this range inside `source`, for `miette` spans.
    pub fn to_offset(&self, source: &str) -> (usize, usize) {
        let start = char_offset(source, self.start.column);
        let end = char_offset(source, self.end.column);
        (start, end.saturating_sub(start).max(1))
    }
}

fn char_offset(source: &str, column: usize) -> usize {
    source
        .char_indices()
        .nth(column.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(source.len())
}

impl<'a> From<Span<'a>> for Range {
    fn from(span: Span<'a>) -> Self {
        let fragment = span.fragment();

        Range {
            start: Position {
                line: span.location_line(),
                column: span.get_utf8_column(),
            },
            end: Position {
                line: span.location_line(),
                column: span.get_utf8_column() + fragment.chars().count(),
            },
        }
    }
}

impl<'a> From<Span<'a>> for Position {
    fn from(span: Span<'a>) -> Self {
        Position {
            line: span.location_line(),
            column: span.get_utf8_column(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::start(Range::new(Position::new(1, 1), Position::new(1, 4)), "abcdef", (0, 3))]
    #[case::middle(Range::new(Position::new(1, 3), Position::new(1, 5)), "abcdef", (2, 2))]
    #[case::empty(Range::new(Position::new(1, 7), Position::new(1, 7)), "abcdef", (6, 1))]
    fn test_to_offset(#[case] range: Range, #[case] source: &str, #[case] expected: (usize, usize)) {
        assert_eq!(range.to_offset(source), expected);
    }

    #[test]
    fn test_merge() {
        let a = Range::new(Position::new(1, 3), Position::new(1, 5));
        let b = Range::new(Position::new(1, 1), Position::new(1, 4));
        assert_eq!(a.merge(&b), Range::new(Position::new(1, 1), Position::new(1, 5)));
    }
}
