use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::fence::FenceMap;
use crate::text::LineIndex;
use crate::types::{CapturedBlock, CodeRange, LineSpan, MalformedMarker, MarkerLocation, Reference, TargetSpec};

/// `<!-- CODE_REF: <path><selector> -->`, payload captured without surrounding blanks.
#[allow(clippy::expect_used, reason = "hardcoded pattern, compile-time invariant")]
static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--[ \t]*CODE_REF:[ \t]*([^\n]*?)[ \t]*-->").expect("valid marker regex")
});

/// `path:start-end`, `path#name`, `path#Class#method`, the last two with an optional `:start-end`.
#[allow(clippy::expect_used, reason = "hardcoded pattern, compile-time invariant")]
static PAYLOAD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<path>[^\s#:]+)",
        r"(?::(?P<start>\d+)-(?P<end>\d+)",
        r"|#(?P<name>[A-Za-z_$][\w$]*)(?:#(?P<method>[A-Za-z_$][\w$]*))?",
        r"(?::(?P<hint_start>\d+)-(?P<hint_end>\d+))?)$",
    ))
    .expect("valid payload regex")
});

/// Directory names never descended into while looking for markdown.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target"];

/// A payload parsed into a target, plus where its line numbers sit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPayload {
    /// Byte range of `start-end` relative to the payload start.
    pub lines: Option<Range<usize>>,
    /// Parsed target, path as written.
    pub target: TargetSpec,
}

/// Find markdown documents under the given paths (the project root when empty).
/// Walked directories honour the config's include/exclude prefixes; files named
/// explicitly are always taken. Returned paths are relative to `root` when possible.
pub fn discover_documents(root: &Path, paths: &[PathBuf], config: &Config) -> Vec<PathBuf> {
    let mut documents = Vec::new();
    let default_roots = [root.to_path_buf()];
    let inputs = if paths.is_empty() { &default_roots[..] } else { paths };

    for input in inputs {
        if input.is_file() {
            documents.push(relative_to_root(root, input));
            continue;
        }
        for entry in WalkDir::new(input)
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && is_markdown(e.path()))
        {
            let relative = relative_to_root(root, entry.path());
            if config.should_scan(&relative.to_string_lossy()) {
                documents.push(relative);
            }
        }
    }

    documents.sort();
    documents.dedup();
    documents
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
/// Preserves leading `..` when there is nothing left to pop.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        push_normalized_component(&mut components, component);
    }
    components.iter().collect()
}

/// Parse a marker payload into a target specification.
///
/// # Errors
///
/// Returns a human-readable reason when the payload does not match the marker
/// grammar or its line numbers are not a valid 1-based inclusive range.
pub fn parse_payload(payload: &str) -> Result<ParsedPayload, String> {
    if payload.is_empty() {
        return Err("empty payload".to_string());
    }
    let Some(caps) = PAYLOAD_PATTERN.captures(payload) else {
        return Err(explain_payload_mismatch(payload));
    };
    let file = PathBuf::from(caps.name("path").map_or("", |m| m.as_str()));

    if let Some((lines, range)) = capture_line_span(&caps, "start", "end")? {
        return Ok(ParsedPayload {
            lines: Some(range),
            target: TargetSpec::LineRange { file, lines },
        });
    }

    let hint = capture_line_span(&caps, "hint_start", "hint_end")?;
    let (line_hint, lines) = hint.map_or((None, None), |(span, range)| (Some(span), Some(range)));
    let name = caps.name("name").map_or_else(String::new, |m| m.as_str().to_string());
    let target = match caps.name("method") {
        Some(method) => TargetSpec::ClassMethod {
            class_name: name,
            file,
            line_hint,
            method_name: method.as_str().to_string(),
        },
        None => TargetSpec::Symbol { file, line_hint, name },
    };
    Ok(ParsedPayload { lines, target })
}

/// Find every marker in one document and parse the live ones.
///
/// Markers inside fenced or inline code are examples, not references, and are
/// dropped. Malformed payloads are kept as errors attached to their location.
pub fn scan_document(
    document: &Path,
    text: &str,
    fences: &FenceMap,
) -> Vec<Result<Reference, MalformedMarker>> {
    let index = LineIndex::new(text);
    let mut markers = Vec::new();

    for caps in MARKER_PATTERN.captures_iter(text) {
        let (Some(whole), Some(payload)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let location = MarkerLocation {
            document: document.to_path_buf(),
            line: index.line_of(whole.start()),
            offset: whole.start(),
        };
        if fences.is_code(whole.start()) {
            debug!(document = %document.display(), line = location.line, "skipping marker inside code");
            continue;
        }

        let raw = payload.as_str().to_string();
        let marker = match parse_payload(&raw) {
            Err(reason) => Err(MalformedMarker { location, payload: raw, reason }),
            Ok(parsed) => Ok(Reference {
                following_block: following_block(text, fences, whole.end()),
                lines_range: parsed.lines.map(|range| {
                    CodeRange::new(
                        payload.start().saturating_add(range.start),
                        payload.start().saturating_add(range.end),
                    )
                }),
                location,
                payload: raw,
                target: parsed.target,
            }),
        };
        markers.push(marker);
    }

    markers
}

/// Read a `start-end` pair out of two named groups.
///
/// # Errors
///
/// Returns a reason when a number overflows, is zero, or the range is reversed.
fn capture_line_span(
    caps: &Captures<'_>,
    start_group: &str,
    end_group: &str,
) -> Result<Option<(LineSpan, Range<usize>)>, String> {
    let (Some(start), Some(end)) = (caps.name(start_group), caps.name(end_group)) else {
        return Ok(None);
    };
    let span = LineSpan::new(parse_line_number(start.as_str())?, parse_line_number(end.as_str())?);
    if span.start > span.end {
        return Err(format!("start line {} is after end line {}", span.start, span.end));
    }
    Ok(Some((span, start.start()..end.end())))
}

/// Reason text for a payload that does not match any form.
fn explain_payload_mismatch(payload: &str) -> String {
    if !payload.contains(['#', ':']) {
        return format!("`{payload}` has no selector; expected `path:start-end` or `path#name`");
    }
    format!(
        "`{payload}` is not `path:start-end`, `path#name`, or `path#Class#method` \
         (the last two optionally followed by `:start-end`)"
    )
}

/// The fenced block directly after a marker, with only blank space between.
fn following_block(text: &str, fences: &FenceMap, after: usize) -> Option<CapturedBlock> {
    let block = fences.first_block_from(after)?;
    let between = text.get(after..block.range.start)?;
    if !between.trim().is_empty() {
        return None;
    }
    Some(CapturedBlock {
        content: text.get(block.content.start..block.content.end)?.to_string(),
        content_range: block.content,
        fence: block.fence,
        language: block.language().map(str::to_string),
    })
}

/// Whether `path` has a markdown extension.
fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md" || ext == "markdown")
}

/// Hidden directories, dependency trees, and build output are never scanned.
fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// Parse a 1-based line number.
fn parse_line_number(digits: &str) -> Result<u32, String> {
    let line: u32 = digits
        .parse()
        .map_err(|_err| format!("line number `{digits}` is out of range"))?;
    if line == 0 {
        return Err("line numbers are 1-based; found 0".to_string());
    }
    Ok(line)
}

/// Handle a single path component during normalization.
/// Pops the last component for `..` when possible, preserves it otherwise.
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {},
        Component::ParentDir => {
            let can_pop = matches!(
                components.last(),
                Some(c) if !matches!(c, Component::ParentDir | Component::RootDir)
            );
            if can_pop {
                components.pop();
            } else {
                components.push(component);
            }
        },
        other => components.push(other),
    }
}

/// `path` relative to `root` when it lies under it, normalized.
fn relative_to_root(root: &Path, path: &Path) -> PathBuf {
    normalize_path(path.strip_prefix(root).unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> Vec<Result<Reference, MalformedMarker>> {
        scan_document(Path::new("docs/guide.md"), text, &FenceMap::build(text))
    }

    fn live(text: &str) -> Vec<Reference> {
        scan(text).into_iter().filter_map(Result::ok).collect()
    }

    #[test]
    fn parses_line_range_payload() {
        let parsed = parse_payload("src/a.ts:5-12").unwrap();
        assert_eq!(
            parsed.target,
            TargetSpec::LineRange {
                file: PathBuf::from("src/a.ts"),
                lines: LineSpan::new(5, 12),
            }
        );
        assert_eq!(parsed.lines, Some(9..13));
    }

    #[test]
    fn parses_symbol_payloads_with_and_without_hint() {
        let bare = parse_payload("src/a.ts#add").unwrap();
        assert_eq!(
            bare.target,
            TargetSpec::Symbol { file: PathBuf::from("src/a.ts"), line_hint: None, name: "add".into() }
        );
        assert_eq!(bare.lines, None);

        let hinted = parse_payload("src/a.ts#add:16-18").unwrap();
        assert_eq!(hinted.target.line_hint(), Some(LineSpan::new(16, 18)));
        assert_eq!(hinted.lines, Some(13..18));
    }

    #[test]
    fn parses_class_method_payload() {
        let parsed = parse_payload("src/a.ts#User#getName:3-5").unwrap();
        assert_eq!(
            parsed.target,
            TargetSpec::ClassMethod {
                class_name: "User".into(),
                file: PathBuf::from("src/a.ts"),
                line_hint: Some(LineSpan::new(3, 5)),
                method_name: "getName".into(),
            }
        );
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(parse_payload("").is_err());
        assert!(parse_payload("src/a.ts").unwrap_err().contains("no selector"));
        assert!(parse_payload("src/a.ts:12-5").unwrap_err().contains("after end line"));
        assert!(parse_payload("src/a.ts:0-5").unwrap_err().contains("1-based"));
        assert!(parse_payload("src/a.ts#").is_err());
        assert!(parse_payload("src/a.ts#a#b#c").is_err());
        assert!(parse_payload("src/a.ts:99999999999-99999999999").unwrap_err().contains("out of range"));
    }

    #[test]
    fn captures_block_after_blank_lines() {
        let text = "<!-- CODE_REF: src/a.ts#add -->\n\n\n```ts\nfunction add() {}\n```\n";
        let refs = live(text);
        let block = refs.first().unwrap().following_block.as_ref().unwrap();
        assert_eq!(block.content, "function add() {}\n");
        assert_eq!(block.language.as_deref(), Some("ts"));
    }

    #[test]
    fn prose_between_marker_and_block_means_no_block() {
        let text = "<!-- CODE_REF: src/a.ts#greet -->\nSome prose.\n\n```ts\nx\n```\n";
        let refs = live(text);
        assert_eq!(refs.len(), 1);
        assert!(refs.first().unwrap().following_block.is_none());
    }

    #[test]
    fn markers_inside_code_are_not_live() {
        let text = concat!(
            "Write `<!-- CODE_REF: src/a.ts#x -->` above a block.\n\n",
            "```md\n<!-- CODE_REF: src/a.ts#y -->\n```\n\n",
            "<!-- CODE_REF: src/a.ts#z -->\n```ts\nz\n```\n",
        );
        let refs = live(text);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs.first().unwrap().target.selector(), "z");
    }

    #[test]
    fn malformed_marker_is_reported_with_location() {
        let text = "intro\n<!-- CODE_REF: nothing-here -->\n";
        let markers = scan(text);
        let Some(Err(malformed)) = markers.first() else {
            panic!("expected a malformed marker, got {markers:?}");
        };
        assert_eq!(malformed.location.line, 2);
        assert_eq!(malformed.location.offset, 6);
        assert_eq!(malformed.payload, "nothing-here");
    }

    #[test]
    fn lines_range_points_at_digits_in_document() {
        let text = "x\n<!-- CODE_REF: src/a.ts#add:10-12 -->\n```ts\n```\n";
        let reference = live(text).into_iter().next().unwrap();
        let range = reference.lines_range.unwrap();
        assert_eq!(text.get(range.start..range.end), Some("10-12"));
    }

    #[test]
    fn adjacent_markers_share_no_block() {
        let text = "<!-- CODE_REF: a.ts#one -->\n<!-- CODE_REF: a.ts#two -->\n```ts\ntwo\n```\n";
        let refs = live(text);
        assert_eq!(refs.len(), 2);
        assert!(refs.first().unwrap().following_block.is_none());
        assert!(refs.get(1).unwrap().following_block.is_some());
    }

    #[test]
    fn normalizes_relative_components() {
        assert_eq!(normalize_path(Path::new("docs/../src/./lib.ts")), PathBuf::from("src/lib.ts"));
        assert_eq!(normalize_path(Path::new("../src/lib.ts")), PathBuf::from("../src/lib.ts"));
    }
}
