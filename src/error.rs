/// Crate-level error types for coderef diagnostics.
use std::path::PathBuf;

use crate::types::MismatchKind;

/// Run- and document-level failures. Each variant names the file or reason
/// so the rendered diagnostic is useful without a debugger.
///
/// Per-reference problems are never reported through this type; they are
/// data in a `ValidationResult`.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A markdown document could not be read; its references are excluded.
    #[error("cannot read document {}: {source}", path.display())]
    DocumentUnreadable {
        /// Document that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing a fixed document back to disk failed. The original is untouched.
    #[error("cannot write document {}: {source}", path.display())]
    DocumentWrite {
        /// Document that failed to write.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A fix edit no longer matches the text it was computed from, or overlaps another edit.
    #[error("edit conflict in {} at bytes {start}..{end}: {reason}", document.display())]
    EditConflict {
        /// Document the edit targets.
        document: PathBuf,
        /// End byte offset of the edit.
        end: usize,
        /// Why the edit was refused.
        reason: String,
        /// Start byte offset of the edit.
        start: usize,
    },

    /// A selector passed on the command line could not be parsed.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector {
        /// Why the selector was rejected.
        reason: String,
        /// The selector text as given.
        selector: String,
    },

    /// Underlying I/O error from the filesystem or terminal.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// A source lookup failed outside of document validation (the `resolve` command).
    #[error("{0}")]
    Resolution(
        /// The wrapped resolution failure.
        #[from]
        ResolutionError,
    ),

    /// TOML deserialization of `.coderef.toml` failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),
}

/// Why a target specification could not be turned into a resolved span.
///
/// Cloneable because one failed load is shared by every reference into the
/// same file through the parse cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// The file is missing, unreadable, or failed to parse.
    #[error("file not found: {} ({reason})", path.display())]
    FileNotFound {
        /// Path as it was looked up on disk.
        path: PathBuf,
        /// Missing, unreadable, or the parse failure message.
        reason: String,
    },

    /// The file exists but holds no declaration matching the selector.
    #[error("symbol not found: `{symbol}` in {} ({reason})", file.display())]
    SymbolNotFound {
        /// File that was searched.
        file: PathBuf,
        /// What exactly was missing.
        reason: String,
        /// Addressable names that do exist in the file.
        suggestions: Vec<String>,
        /// The selector that failed, e.g. `User#getName`.
        symbol: String,
    },
}

impl ResolutionError {
    /// The mismatch kind this failure is reported as.
    pub const fn kind(&self) -> MismatchKind {
        match self {
            Self::FileNotFound { .. } => MismatchKind::FileNotFound,
            Self::SymbolNotFound { .. } => MismatchKind::SymbolNotFound,
        }
    }

    /// Short human-readable explanation without the kind prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::FileNotFound { path, reason } => format!("{}: {reason}", path.display()),
            Self::SymbolNotFound { reason, suggestions, .. } if suggestions.is_empty() => {
                reason.clone()
            },
            Self::SymbolNotFound { reason, suggestions, .. } => {
                format!("{reason}; available: {}", suggestions.join(", "))
            },
        }
    }
}
