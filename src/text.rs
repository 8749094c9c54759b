//! Line bookkeeping shared by the fence scanner, marker scanner, and resolver.

use crate::types::LineSpan;

/// One physical line of a text, terminator excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Offset just past the terminator (or end of text for the last line).
    pub next: usize,
    /// Offset of the first byte of the line.
    pub start: usize,
    /// Line content without `\n` or `\r\n`.
    pub text: &'a str,
}

impl Line<'_> {
    /// Whether the line holds only spaces and tabs.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Byte offsets of every line start, for offset-to-line lookups and line slicing.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Total text length in bytes.
    len: usize,
    /// Offset of the first byte of each line.
    starts: Vec<usize>,
}

impl LineIndex {
    /// Byte range of a line's content, terminator excluded.
    fn content_bounds(&self, text: &str, line: u32) -> Option<(usize, usize)> {
        let idx = usize::try_from(line).ok()?.checked_sub(1)?;
        let start = *self.starts.get(idx)?;
        let next = self.starts.get(idx.saturating_add(1)).copied().unwrap_or(self.len);
        let raw = text.get(start..next)?;
        let content_len = raw.strip_suffix('\n').map_or(raw.len(), |rest| {
            rest.strip_suffix('\r').map_or(rest.len(), str::len)
        });
        Some((start, start.saturating_add(content_len)))
    }

    /// Number of lines. A trailing terminator does not start a new line.
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// 1-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> u32 {
        let line = self.starts.partition_point(|&start| start <= offset).max(1);
        u32::try_from(line).unwrap_or(u32::MAX)
    }

    /// Index the line starts of `text`.
    pub fn new(text: &str) -> Self {
        let mut starts = Vec::new();
        if !text.is_empty() {
            starts.push(0);
        }
        for (idx, byte) in text.bytes().enumerate() {
            let next = idx.saturating_add(1);
            if byte == b'\n' && next < text.len() {
                starts.push(next);
            }
        }
        Self { len: text.len(), starts }
    }

    /// The literal text of lines `span.start..=span.end`, internal terminators
    /// kept, final terminator dropped. `None` when the span leaves the text.
    pub fn slice<'a>(&self, text: &'a str, span: LineSpan) -> Option<&'a str> {
        if span.start == 0 || span.start > span.end {
            return None;
        }
        let (start, _) = self.content_bounds(text, span.start)?;
        let (_, end) = self.content_bounds(text, span.end)?;
        text.get(start..end)
    }
}

/// Iterate the lines of `text` with their byte offsets.
pub fn lines_with_offsets(text: &str) -> impl Iterator<Item = Line<'_>> {
    let mut cursor = 0_usize;
    std::iter::from_fn(move || {
        let rest = text.get(cursor..).filter(|rest| !rest.is_empty())?;
        let start = cursor;
        let (raw, next) = match rest.find('\n') {
            Some(pos) => (rest.get(..pos)?, start.saturating_add(pos).saturating_add(1)),
            None => (rest, text.len()),
        };
        cursor = next;
        Some(Line {
            next,
            start,
            text: raw.strip_suffix('\r').unwrap_or(raw),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_without_phantom_trailing_line() {
        assert_eq!(LineIndex::new("a\nb\n").line_count(), 2);
        assert_eq!(LineIndex::new("a\nb").line_count(), 2);
        assert_eq!(LineIndex::new("").line_count(), 0);
    }

    #[test]
    fn maps_offsets_to_lines() {
        let index = LineIndex::new("one\ntwo\nthree\n");
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(3), 1);
        assert_eq!(index.line_of(4), 2);
        assert_eq!(index.line_of(8), 3);
    }

    #[test]
    fn slices_inclusive_lines_verbatim() {
        let text = "l1\n  l2\n\n\tl4  \nl5\n";
        let index = LineIndex::new(text);
        assert_eq!(index.slice(text, LineSpan::new(2, 4)), Some("  l2\n\n\tl4  "));
        assert_eq!(index.slice(text, LineSpan::new(5, 5)), Some("l5"));
        assert_eq!(index.slice(text, LineSpan::new(5, 6)), None);
        assert_eq!(index.slice(text, LineSpan::new(0, 1)), None);
    }

    #[test]
    fn slice_drops_crlf_terminator_only_at_the_end() {
        let text = "a\r\nb\r\nc\r\n";
        let index = LineIndex::new(text);
        assert_eq!(index.slice(text, LineSpan::new(1, 2)), Some("a\r\nb"));
    }

    #[test]
    fn iterates_lines_with_offsets() {
        let lines: Vec<_> = lines_with_offsets("ab\r\n\ncd").collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.first().map(|l| (l.start, l.text, l.next)), Some((0, "ab", 4)));
        assert_eq!(lines.get(1).map(|l| (l.start, l.text, l.next)), Some((4, "", 5)));
        assert_eq!(lines.get(2).map(|l| (l.start, l.text, l.next)), Some((5, "cd", 7)));
    }
}
