/// Core domain types for coderef references, resolved spans, and outcomes.
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Fenced code block content that immediately follows a marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedBlock {
    /// Verbatim text between the opening and closing fence lines.
    pub content: String,
    /// Byte range of `content` inside the document.
    pub content_range: CodeRange,
    /// The fence that opened the block.
    pub fence: Fence,
    /// Language tag from the info string, e.g. `ts`.
    pub language: Option<String>,
}

/// Half-open byte range `[start, end)` within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CodeRange {
    /// Exclusive end offset.
    pub end: usize,
    /// Inclusive start offset.
    pub start: usize,
}

impl CodeRange {
    /// Whether `offset` falls inside the range.
    pub const fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Range from `start` up to `end`.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { end, start }
    }
}

/// The opening run of a fenced code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence {
    /// The fence character, either '`' or '~'.
    pub ch: char,
    /// Number of fence characters in the opening run.
    pub len: usize,
}

/// A textual substitution in one document that resolves (part of) a mismatch.
///
/// `expected` holds the text currently at `range`; application refuses to
/// splice if the document no longer reads that way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixEdit {
    /// Markdown document being edited.
    pub document: PathBuf,
    /// Text found at `range` when the edit was planned.
    pub expected: String,
    /// Byte range replaced in the original text.
    pub range: CodeRange,
    /// New text for `range`.
    pub replacement: String,
}

/// Inclusive, 1-based line span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSpan {
    /// Last line, inclusive.
    pub end: u32,
    /// First line.
    pub start: u32,
}

impl LineSpan {
    /// Span from `start` through `end`.
    pub const fn new(start: u32, end: u32) -> Self {
        Self { end, start }
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A marker whose payload could not be parsed into a target specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedMarker {
    /// Where the marker sits.
    pub location: MarkerLocation,
    /// Raw payload text after `CODE_REF:`.
    pub payload: String,
    /// Why parsing failed.
    pub reason: String,
}

/// Where a marker occurs in a markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerLocation {
    /// Markdown document path, relative to the project root when possible.
    pub document: PathBuf,
    /// 1-based line of the marker.
    pub line: u32,
    /// Byte offset of the `<!--` that opens the marker.
    pub offset: usize,
}

/// A reference that did not validate, with everything needed to explain or fix it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// One-line explanation for reports.
    pub detail: String,
    /// Which discrepancy this is.
    pub kind: MismatchKind,
    /// The reference that failed.
    pub reference: Reference,
    /// The resolved source span, when resolution succeeded.
    pub resolved: Option<ResolvedSpan>,
}

/// The error taxonomy for a single reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MismatchKind {
    /// No fenced block directly follows the marker.
    CodeBlockMissing,
    /// The quoted block differs from the resolved source.
    CodeContentMismatch,
    /// Content agrees but the marker's line numbers are stale.
    CodeLocationMismatch,
    /// Referenced file is missing, unreadable, or unparseable.
    FileNotFound,
    /// The marker payload does not parse.
    MalformedReference,
    /// No declaration matches the selector.
    SymbolNotFound,
}

impl MismatchKind {
    /// The upper-case name used in reports, e.g. `CODE_BLOCK_MISSING`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CodeBlockMissing => "CODE_BLOCK_MISSING",
            Self::CodeContentMismatch => "CODE_CONTENT_MISMATCH",
            Self::CodeLocationMismatch => "CODE_LOCATION_MISMATCH",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::MalformedReference => "MALFORMED_REFERENCE",
            Self::SymbolNotFound => "SYMBOL_NOT_FOUND",
        }
    }

    /// Whether the fix planner can compute an edit for this kind.
    pub const fn is_auto_fixable(self) -> bool {
        matches!(self, Self::CodeContentMismatch | Self::CodeLocationMismatch)
    }
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live marker: parsed target plus the block that follows it, if any.
/// Built fresh on every run; it has no identity beyond its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The fenced block directly after the marker.
    pub following_block: Option<CapturedBlock>,
    /// Byte range of the `start-end` digits in the marker, when the payload has one.
    pub lines_range: Option<CodeRange>,
    /// Where the marker sits.
    pub location: MarkerLocation,
    /// Raw payload text after `CODE_REF:`.
    pub payload: String,
    /// What the marker points at.
    pub target: TargetSpec,
}

/// The exact source text a target designates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSpan {
    /// Full lines `lines.start..=lines.end`, without the final line terminator.
    pub content: String,
    /// Source file as written in the marker.
    pub file: PathBuf,
    /// Where the span lives, leading comments included.
    pub lines: LineSpan,
}

/// Parsed marker payload. Exactly one variant per reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// `path#Class#method`, optionally with `:start-end`.
    ClassMethod {
        /// Name of the enclosing class.
        class_name: String,
        /// Source file path as written.
        file: PathBuf,
        /// Claimed location, used for disambiguation and staleness.
        line_hint: Option<LineSpan>,
        /// Method name inside the class.
        method_name: String,
    },
    /// `path:start-end`.
    LineRange {
        /// Source file path as written.
        file: PathBuf,
        /// The quoted lines.
        lines: LineSpan,
    },
    /// `path#name`, optionally with `:start-end`.
    Symbol {
        /// Source file path as written.
        file: PathBuf,
        /// Claimed location, used for disambiguation and staleness.
        line_hint: Option<LineSpan>,
        /// Function, variable, class, or type name.
        name: String,
    },
}

impl TargetSpec {
    /// Source file the target names.
    pub fn file(&self) -> &Path {
        match self {
            Self::ClassMethod { file, .. } | Self::LineRange { file, .. } | Self::Symbol { file, .. } => {
                file
            },
        }
    }

    /// The claimed location of a symbolic target. Always `None` for line ranges,
    /// whose numbers are the lookup itself rather than a claim about it.
    pub const fn line_hint(&self) -> Option<LineSpan> {
        match self {
            Self::ClassMethod { line_hint, .. } | Self::Symbol { line_hint, .. } => *line_hint,
            Self::LineRange { .. } => None,
        }
    }

    /// The selector without the path, e.g. `User#getName` or `5-12`.
    pub fn selector(&self) -> String {
        match self {
            Self::ClassMethod { class_name, method_name, .. } => format!("{class_name}#{method_name}"),
            Self::LineRange { lines, .. } => lines.to_string(),
            Self::Symbol { name, .. } => name.clone(),
        }
    }

    /// The same selector pointed at another file.
    #[must_use]
    pub fn with_file(self, file: PathBuf) -> Self {
        match self {
            Self::ClassMethod { class_name, line_hint, method_name, .. } => {
                Self::ClassMethod { class_name, file, line_hint, method_name }
            },
            Self::LineRange { lines, .. } => Self::LineRange { file, lines },
            Self::Symbol { line_hint, name, .. } => Self::Symbol { file, line_hint, name },
        }
    }
}

/// Exactly one outcome per marker occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The payload did not parse.
    Malformed(MalformedMarker),
    /// Resolution failed or the documentation disagrees with the source.
    Mismatch(Mismatch),
    /// Documentation and source agree.
    Valid(Reference),
}

impl ValidationResult {
    /// The reported kind, `None` when valid.
    pub const fn kind(&self) -> Option<MismatchKind> {
        match self {
            Self::Malformed(_) => Some(MismatchKind::MalformedReference),
            Self::Mismatch(mismatch) => Some(mismatch.kind),
            Self::Valid(_) => None,
        }
    }

    /// Where the marker sits.
    pub const fn location(&self) -> &MarkerLocation {
        match self {
            Self::Malformed(marker) => &marker.location,
            Self::Mismatch(mismatch) => &mismatch.reference.location,
            Self::Valid(reference) => &reference.location,
        }
    }

    /// Raw marker payload.
    pub fn payload(&self) -> &str {
        match self {
            Self::Malformed(marker) => &marker.payload,
            Self::Mismatch(mismatch) => &mismatch.reference.payload,
            Self::Valid(reference) => &reference.payload,
        }
    }

    /// Whether documentation and source agree.
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}
