//! Source files as the resolver sees them, and the per-run cache that loads
//! each one at most once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::debug;

use crate::error::ResolutionError;
use crate::grammar;
use crate::outline::{SourceOutline, parse_outline};
use crate::text::LineIndex;

/// Maximum source file size (16 MiB).
const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// One cache slot: filled by the first worker that needs the file.
type Slot = Arc<OnceLock<Result<Arc<SourceFile>, ResolutionError>>>;

/// Read-only cache of loaded source files, shared by every worker in a run.
///
/// The map lock is only held long enough to find or create a slot; reading
/// and parsing happen inside the slot's `OnceLock`, so two workers asking for
/// the same file wait for one load while different files load in parallel.
#[derive(Debug, Default)]
pub struct ParseCache {
    /// Slot per requested path.
    entries: Mutex<HashMap<PathBuf, Slot>>,
}

impl ParseCache {
    /// Number of distinct paths requested so far.
    pub fn file_count(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Load a file, or return the result of the earlier load of the same path.
    /// Failures are cached too: a missing file is reported identically to
    /// every reference that targets it.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::FileNotFound` if the file cannot be read.
    pub fn load(&self, path: &Path) -> Result<Arc<SourceFile>, ResolutionError> {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(path.to_path_buf()).or_default())
        };
        slot.get_or_init(|| {
            debug!(path = %path.display(), "loading source file");
            SourceFile::read(path).map(Arc::new)
        })
        .clone()
    }

    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

/// The text of one source file plus its lazily built outline.
#[derive(Debug)]
pub struct SourceFile {
    /// Line starts of `text`.
    index: LineIndex,
    /// Built on first symbolic lookup; line ranges never need it.
    outline: OnceLock<Result<SourceOutline, String>>,
    /// Path the file was loaded from.
    path: PathBuf,
    /// File contents.
    text: String,
}

impl SourceFile {
    /// Wrap already loaded text.
    pub fn from_text(path: impl Into<PathBuf>, text: String) -> Self {
        Self {
            index: LineIndex::new(&text),
            outline: OnceLock::new(),
            path: path.into(),
            text,
        }
    }

    /// Line lookup for the file.
    pub const fn index(&self) -> &LineIndex {
        &self.index
    }

    /// The declarations of this file, parsing it on first use.
    /// `Ok(None)` means the file is not TypeScript or JavaScript.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::FileNotFound` when the file does not parse.
    pub fn outline(&self) -> Result<Option<&SourceOutline>, ResolutionError> {
        let Some(language) = grammar::language_for_path(&self.path) else {
            return Ok(None);
        };
        let parsed = self.outline.get_or_init(|| {
            debug!(path = %self.path.display(), "parsing source file");
            parse_outline(&self.text, &language)
        });
        match parsed {
            Ok(outline) => Ok(Some(outline)),
            Err(reason) => Err(ResolutionError::FileNotFound {
                path: self.path.clone(),
                reason: format!("parse failed: {reason}"),
            }),
        }
    }

    /// Read a source file from disk.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::FileNotFound` if the file is missing,
    /// unreadable, not UTF-8, or larger than the size limit.
    pub fn read(path: &Path) -> Result<Self, ResolutionError> {
        let not_found = |reason: String| ResolutionError::FileNotFound {
            path: path.to_path_buf(),
            reason,
        };
        let metadata = std::fs::metadata(path).map_err(|e| not_found(e.to_string()))?;
        if !metadata.is_file() {
            return Err(not_found("not a regular file".to_string()));
        }
        if metadata.len() > MAX_FILE_SIZE {
            return Err(not_found(format!(
                "file is {} bytes (max {MAX_FILE_SIZE})",
                metadata.len()
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| not_found(e.to_string()))?;
        Ok(Self::from_text(path, text))
    }

    /// File contents.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_each_path_once_and_shares_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");
        std::fs::write(&path, "export function a() {}\n").unwrap();

        let cache = ParseCache::new();
        let first = cache.load(&path).unwrap();
        std::fs::write(&path, "changed on disk\n").unwrap();
        let second = cache.load(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.text(), "export function a() {}\n");
        assert_eq!(cache.file_count(), 1);
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParseCache::new();
        let err = cache.load(&dir.path().join("nope.ts")).unwrap_err();
        assert!(matches!(err, ResolutionError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_not_a_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SourceFile::read(dir.path()).unwrap_err();
        assert!(matches!(err, ResolutionError::FileNotFound { reason, .. } if reason == "not a regular file"));
    }

    #[test]
    fn outline_is_none_for_prose() {
        let file = SourceFile::from_text("notes.txt", "function f() {}\n".to_string());
        assert!(file.outline().unwrap().is_none());
    }

    #[test]
    fn syntax_error_surfaces_as_file_not_found() {
        let file = SourceFile::from_text("broken.ts", "export function (\n".to_string());
        let err = file.outline().unwrap_err();
        assert!(
            matches!(&err, ResolutionError::FileNotFound { reason, .. } if reason.starts_with("parse failed")),
            "{err:?}"
        );
    }

    #[test]
    fn concurrent_loads_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.ts");
        std::fs::write(&path, "const x = 1;\n").unwrap();
        let cache = ParseCache::new();

        let loaded: Vec<Arc<SourceFile>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| cache.load(&path).unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(loaded.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }
}
