use serde::Serialize;

/// Byte range in the source text, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Union of two spans. A zero-width span never widens the result.
    pub fn merge(self, other: Span) -> Span {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other;
        }
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(&self, other: Span) -> bool {
        other.is_empty() || (self.start <= other.start && other.end <= self.end)
    }

    /// Shift the span by `offset` bytes, used for tokens coming from a sub-lexer.
    pub fn offset(self, offset: usize) -> Span {
        Span {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

/// 1-based line and column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn merge_covers_both() {
        let a = Span::new(3, 7);
        let b = Span::new(10, 12);
        assert_eq!(a.merge(b), Span::new(3, 12));
        assert_eq!(b.merge(a), Span::new(3, 12));
    }

    #[test]
    fn zero_width_is_ignored() {
        let a = Span::new(3, 7);
        assert_eq!(a.merge(Span::new(100, 100)), a);
        assert_eq!(Span::new(0, 0).merge(a), a);
    }

    #[test]
    fn line_col_counts_newlines() {
        let src = "ab\ncd\nef";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 4), (2, 2));
        assert_eq!(line_col(src, 6), (3, 1));
    }

    proptest! {
        #[test]
        fn union_covers_every_input(spans in prop::collection::vec((0usize..500, 0usize..50), 1..20)) {
            let spans: Vec<Span> = spans.into_iter().map(|(s, w)| Span::new(s, s + w)).collect();
            let union = spans.iter().fold(Span::empty(), |acc, s| acc.merge(*s));
            for span in &spans {
                prop_assert!(union.contains(*span));
            }
        }
    }
}
