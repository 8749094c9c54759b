//! Per-document pipeline: read, map fences, scan markers, resolve, validate.
//!
//! Documents are analysed in parallel and so are the references within one
//! document. The only shared state is the parse cache.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{Config, WhitespacePolicy};
use crate::error::Error;
use crate::fence::FenceMap;
use crate::resolver::resolve;
use crate::scanner::{normalize_path, scan_document};
use crate::source::ParseCache;
use crate::types::ValidationResult;
use crate::validator::validate;

/// Everything validation learned about one document.
#[derive(Debug, Clone)]
pub struct DocumentAnalysis {
    /// Document path relative to the project root.
    pub document: PathBuf,
    /// One result per live marker, in document order.
    pub results: Vec<ValidationResult>,
    /// The text the results were computed from.
    pub text: String,
}

impl DocumentAnalysis {
    /// Number of results that are not `Valid`.
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|result| !result.is_valid()).count()
    }
}

/// Analyse documents in parallel. Results keep the order of `documents`.
pub fn analyze_documents(
    root: &Path,
    documents: &[PathBuf],
    config: &Config,
    cache: &ParseCache,
) -> Vec<Result<DocumentAnalysis, Error>> {
    let analyses: Vec<_> = documents
        .par_iter()
        .map(|document| analyze_document(root, document, config.trailing_whitespace, cache))
        .collect();
    info!(documents = documents.len(), sources = cache.file_count(), "analysis finished");
    analyses
}

/// Read and analyse one document.
///
/// # Errors
///
/// Returns `Error::DocumentUnreadable` if the document cannot be read; none
/// of its references are reported in that case.
pub fn analyze_document(
    root: &Path,
    document: &Path,
    policy: WhitespacePolicy,
    cache: &ParseCache,
) -> Result<DocumentAnalysis, Error> {
    let text = std::fs::read_to_string(root.join(document)).map_err(|source| {
        warn!(document = %document.display(), %source, "cannot read document");
        Error::DocumentUnreadable { path: document.to_path_buf(), source }
    })?;

    let results = analyze_text(root, document, &text, policy, cache);
    let analysis = DocumentAnalysis { document: document.to_path_buf(), results, text };
    info!(
        document = %document.display(),
        references = analysis.results.len(),
        failures = analysis.failure_count(),
        "analyzed document"
    );
    Ok(analysis)
}

/// Validate every live marker in already loaded document text.
pub fn analyze_text(
    root: &Path,
    document: &Path,
    text: &str,
    policy: WhitespacePolicy,
    cache: &ParseCache,
) -> Vec<ValidationResult> {
    let fences = FenceMap::build(text);
    scan_document(document, text, &fences)
        .into_par_iter()
        .map(|marker| match marker {
            Err(malformed) => ValidationResult::Malformed(malformed),
            Ok(reference) => {
                let path = source_path(root, document, reference.target.file());
                let resolution = cache.load(&path).and_then(|source| resolve(&source, &reference.target));
                validate(reference, resolution, policy)
            },
        })
        .collect()
}

/// Where a marker path points on disk: relative to the project root, or
/// failing that relative to the document's directory.
pub fn source_path(root: &Path, document: &Path, file: &Path) -> PathBuf {
    let from_root = normalize_path(&root.join(file));
    if from_root.is_file() {
        return from_root;
    }
    let document_dir = root.join(document).parent().map(Path::to_path_buf).unwrap_or_default();
    let from_document = normalize_path(&document_dir.join(file));
    if from_document.is_file() { from_document } else { from_root }
}
