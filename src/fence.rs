//! Code-fence map: which byte ranges of a markdown document are literal code.
//!
//! A fence opens on a line whose first non-blank characters are a run of at
//! least three backticks or tildes. It closes only on a line holding a run of
//! the same character with exactly the same length, so an example of a fenced
//! block can be nested inside a longer (or shorter) fence. A fence that never
//! closes runs to the end of the document. Inline code spans are collected
//! afterwards from the text between fenced blocks.

use crate::text::{Line, lines_with_offsets};
use crate::types::{CodeRange, Fence};

/// A fenced code block found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// Byte range between the opening and closing fence lines.
    pub content: CodeRange,
    /// Opening run; only an identical run closes the block.
    pub fence: Fence,
    /// Trimmed info string after the opening run, if any.
    pub info: Option<String>,
    /// Whole block, from the opening run to past the closing fence line.
    pub range: CodeRange,
}

impl FencedBlock {
    /// First word of the info string, e.g. `ts` for "```ts title=a.ts".
    pub fn language(&self) -> Option<&str> {
        self.info.as_deref().and_then(|info| info.split_whitespace().next())
    }
}

/// Sorted, non-overlapping ranges of fenced and inline code in one document.
#[derive(Debug, Clone, Default)]
pub struct FenceMap {
    /// Fenced blocks in document order.
    blocks: Vec<FencedBlock>,
    /// Fenced blocks and inline spans, sorted by start.
    ranges: Vec<CodeRange>,
}

/// A fence block that has been opened but not yet closed.
struct OpenFence {
    /// Offset of the line after the opener.
    content_start: usize,
    /// Opening run.
    fence: Fence,
    /// Trimmed info string.
    info: Option<String>,
    /// Offset of the opening run.
    start: usize,
}

/// A fence-character run at the start of a line.
struct FenceRun<'a> {
    /// Fence character and run length.
    fence: Fence,
    /// Leading spaces before the run.
    indent: usize,
    /// Text after the run.
    rest: &'a str,
}

impl FenceMap {
    /// Scan `text` once and map every fenced block and inline code span.
    pub fn build(text: &str) -> Self {
        let blocks = scan_fenced_blocks(text);
        let mut ranges: Vec<CodeRange> = blocks.iter().map(|block| block.range).collect();

        let mut gap_start = 0_usize;
        for block in &blocks {
            collect_inline_spans(text, gap_start, block.range.start, &mut ranges);
            gap_start = block.range.end;
        }
        collect_inline_spans(text, gap_start, text.len(), &mut ranges);

        ranges.sort_unstable_by_key(|range| range.start);
        Self { blocks, ranges }
    }

    /// The first fenced block starting at or after `offset`.
    pub fn first_block_from(&self, offset: usize) -> Option<&FencedBlock> {
        let idx = self.blocks.partition_point(|block| block.range.start < offset);
        self.blocks.get(idx)
    }

    /// Whether `offset` lies inside fenced or inline code.
    pub fn is_code(&self, offset: usize) -> bool {
        let idx = self.ranges.partition_point(|range| range.end <= offset);
        self.ranges.get(idx).is_some_and(|range| range.contains(offset))
    }
}

impl OpenFence {
    /// Finish the block at `closing`, which is excluded from the content.
    fn close(self, closing: &Line<'_>) -> FencedBlock {
        FencedBlock {
            content: CodeRange::new(self.content_start, closing.start.max(self.content_start)),
            fence: self.fence,
            info: self.info,
            range: CodeRange::new(self.start, closing.next),
        }
    }

    /// Finish a block that runs to the end of the document.
    fn unclosed(self, text_len: usize) -> FencedBlock {
        FencedBlock {
            content: CodeRange::new(self.content_start.min(text_len), text_len),
            fence: self.fence,
            info: self.info,
            range: CodeRange::new(self.start, text_len),
        }
    }
}

impl FenceRun<'_> {
    /// Only the same character with exactly the same run length closes a fence.
    fn closes(&self, open: Fence) -> bool {
        self.fence == open && self.rest.trim().is_empty()
    }

    /// Open a block on `line`, unless the run is really inline code.
    fn open(&self, line: &Line<'_>) -> Option<OpenFence> {
        // "```a`b" is inline code, not a fence.
        if self.fence.ch == '`' && self.rest.contains('`') {
            return None;
        }
        let info = self.rest.trim();
        Some(OpenFence {
            content_start: line.next,
            fence: self.fence,
            info: (!info.is_empty()).then(|| info.to_string()),
            start: line.start.saturating_add(self.indent),
        })
    }
}

/// Whether any line of `content` would close a block opened by `fence`.
pub fn closes_fence(content: &str, fence: Fence) -> bool {
    lines_with_offsets(content).any(|line| fence_run(line.text).is_some_and(|run| run.closes(fence)))
}

/// Add inline code spans found in `text[from..to]`. Spans never cross a blank
/// line, so a stray backtick cannot swallow the rest of the document.
fn collect_inline_spans(text: &str, from: usize, to: usize, ranges: &mut Vec<CodeRange>) {
    let Some(gap) = text.get(from..to) else {
        return;
    };

    let mut paragraph_start: Option<usize> = None;
    for line in lines_with_offsets(gap) {
        if !line.is_blank() {
            paragraph_start.get_or_insert(line.start);
            continue;
        }
        if let Some(start) = paragraph_start.take() {
            scan_paragraph_for_spans(gap, start..line.start, from, ranges);
        }
    }
    if let Some(start) = paragraph_start {
        scan_paragraph_for_spans(gap, start..gap.len(), from, ranges);
    }
}

/// Offset just past the first run of exactly `len` backticks at or after `from`.
fn find_closing_backticks(bytes: &[u8], from: usize, len: usize) -> Option<usize> {
    let mut idx = from;
    while let Some(&byte) = bytes.get(idx) {
        if byte != b'`' {
            idx = idx.saturating_add(1);
            continue;
        }
        let run = backtick_run_len(bytes, idx);
        let end = idx.saturating_add(run);
        if run == len {
            return Some(end);
        }
        idx = end;
    }
    None
}

/// Number of consecutive backticks starting at `at`.
fn backtick_run_len(bytes: &[u8], at: usize) -> usize {
    bytes
        .get(at..)
        .map_or(0, |rest| rest.iter().take_while(|&&byte| byte == b'`').count())
}

/// Recognise a fence run at the start of a line, after optional indentation.
fn fence_run(line: &str) -> Option<FenceRun<'_>> {
    let trimmed = line.trim_start_matches([' ', '\t']);
    let ch = trimmed.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let len = trimmed.len().saturating_sub(trimmed.trim_start_matches(ch).len());
    if len < 3 {
        return None;
    }
    Some(FenceRun {
        fence: Fence { ch, len },
        indent: line.len().saturating_sub(trimmed.len()),
        rest: trimmed.get(len..)?,
    })
}

/// Pair up backtick runs of equal length inside one paragraph.
fn scan_paragraph_for_spans(
    gap: &str,
    paragraph: std::ops::Range<usize>,
    base: usize,
    ranges: &mut Vec<CodeRange>,
) {
    let Some(bytes) = gap.as_bytes().get(paragraph.clone()) else {
        return;
    };
    let offset = base.saturating_add(paragraph.start);

    let mut idx = 0_usize;
    while let Some(&byte) = bytes.get(idx) {
        if byte != b'`' {
            idx = idx.saturating_add(1);
            continue;
        }
        let run = backtick_run_len(bytes, idx);
        let after_open = idx.saturating_add(run);
        match find_closing_backticks(bytes, after_open, run) {
            Some(end) => {
                ranges.push(CodeRange::new(offset.saturating_add(idx), offset.saturating_add(end)));
                idx = end;
            },
            None => idx = after_open,
        }
    }
}

/// Single forward pass over lines, pairing opening and closing fences.
fn scan_fenced_blocks(text: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<OpenFence> = None;

    for line in lines_with_offsets(text) {
        let run = fence_run(line.text);
        open = match open.take() {
            Some(current) if run.as_ref().is_some_and(|r| r.closes(current.fence)) => {
                blocks.push(current.close(&line));
                None
            },
            Some(current) => Some(current),
            None => run.and_then(|r| r.open(&line)),
        };
    }

    if let Some(current) = open {
        blocks.push(current.unclosed(text.len()));
    }
    blocks
}
