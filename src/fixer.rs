//! Fix planning and application for one markdown document.
//!
//! Every edit is computed from the original document text. Accepted edits
//! are then spliced in descending offset order in a single pass, so earlier
//! replacements never shift the ranges of later ones.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Error;
use crate::fence::closes_fence;
use crate::types::{FixEdit, MarkerLocation, Mismatch, MismatchKind, ValidationResult};

/// A reader's verdict on one proposed fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Stop asking; keep what was accepted so far.
    Abort,
    /// Apply the fix.
    Accept,
    /// Skip the fix and keep asking.
    Reject,
}

/// Everything that needs a fix in one document, split by whether a safe edit exists.
#[derive(Debug, Clone, Default)]
pub struct DocumentPlan {
    /// Document the plan was computed for.
    pub document: PathBuf,
    /// Problems with no safe automatic edit.
    pub manual: Vec<ManualFix>,
    /// Fixes that can be applied, in document order.
    pub proposals: Vec<ProposedFix>,
}

/// What came of applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixOutcome {
    /// The decider asked to stop processing further fixes.
    pub aborted: bool,
    /// Proposals whose edits made it into `text`.
    pub applied: usize,
    /// Proposals the decider turned down.
    pub rejected: usize,
    /// New document text, `None` when nothing was accepted.
    pub text: Option<String>,
}

/// How accepted fixes are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixPolicy {
    /// Ask a decider about each proposal.
    Confirm,
    /// Compute the fixed text but never write it.
    Preview,
    /// Accept every proposal.
    Unconditional,
}

/// A mismatch left for a human.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualFix {
    /// Kind reported for the marker.
    pub kind: MismatchKind,
    /// Where the marker sits.
    pub location: MarkerLocation,
    /// Raw marker payload.
    pub payload: String,
    /// Why no edit was proposed.
    pub reason: String,
}

/// The edits that resolve one mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedFix {
    /// One edit, or two when both the code and a stale line hint change.
    pub edits: Vec<FixEdit>,
    /// Kind being fixed.
    pub kind: MismatchKind,
    /// Where the marker sits.
    pub location: MarkerLocation,
    /// Raw marker payload.
    pub payload: String,
    /// One-line description for prompts and reports.
    pub summary: String,
}

/// Source of decisions for the confirm-each policy.
pub trait FixDecider {
    /// Decide on one proposal. `original` is the unmodified document text
    /// the proposal's edits were computed against.
    fn decide(&mut self, original: &str, proposal: &ProposedFix) -> Decision;
}

/// Apply edits computed against `text`.
///
/// # Errors
///
/// Returns `Error::EditConflict` if an edit falls outside the text, overlaps
/// another edit, or no longer matches the text it was planned against. No
/// edit is applied in that case.
pub fn apply_edits(document: &Path, text: &str, edits: &[FixEdit]) -> Result<String, Error> {
    let mut sorted: Vec<&FixEdit> = edits.iter().collect();
    sorted.sort_by(|a, b| b.range.start.cmp(&a.range.start).then(b.range.end.cmp(&a.range.end)));

    let conflict = |edit: &FixEdit, reason: &str| Error::EditConflict {
        document: document.to_path_buf(),
        end: edit.range.end,
        reason: reason.to_string(),
        start: edit.range.start,
    };

    let mut result = text.to_string();
    let mut floor = usize::MAX;
    for edit in sorted {
        if edit.document != document {
            return Err(conflict(edit, "edit was planned for another document"));
        }
        if edit.range.end > floor {
            return Err(conflict(edit, "overlaps another edit"));
        }
        let current = text
            .get(edit.range.start..edit.range.end)
            .ok_or_else(|| conflict(edit, "range is outside the document"))?;
        if current != edit.expected {
            return Err(conflict(edit, "document changed since the edit was planned"));
        }
        result.replace_range(edit.range.start..edit.range.end, &edit.replacement);
        floor = edit.range.start;
    }
    Ok(result)
}

/// Choose proposals under `policy` and splice their edits into `text`.
///
/// Under `Confirm`, proposals are offered one at a time in document order;
/// `Abort` stops the sequence but keeps everything accepted before it.
///
/// # Errors
///
/// Returns `Error::EditConflict` if the accepted edits cannot be applied
/// cleanly; the caller must then leave the document untouched.
pub fn apply_plan(
    plan: &DocumentPlan,
    text: &str,
    policy: FixPolicy,
    decider: &mut dyn FixDecider,
) -> Result<FixOutcome, Error> {
    let mut outcome = FixOutcome::default();
    let mut accepted: Vec<FixEdit> = Vec::new();

    for proposal in &plan.proposals {
        let decision = match policy {
            FixPolicy::Confirm => decider.decide(text, proposal),
            FixPolicy::Preview | FixPolicy::Unconditional => Decision::Accept,
        };
        match decision {
            Decision::Abort => {
                outcome.aborted = true;
                break;
            },
            Decision::Accept => {
                accepted.extend(proposal.edits.iter().cloned());
                outcome.applied = outcome.applied.saturating_add(1);
            },
            Decision::Reject => outcome.rejected = outcome.rejected.saturating_add(1),
        }
    }

    if !accepted.is_empty() {
        outcome.text = Some(apply_edits(&plan.document, text, &accepted)?);
    }
    debug!(
        document = %plan.document.display(),
        applied = outcome.applied,
        rejected = outcome.rejected,
        aborted = outcome.aborted,
        "fix plan applied"
    );
    Ok(outcome)
}

/// Plan fixes for every failing result of one document.
pub fn plan_document(document: &Path, text: &str, results: &[ValidationResult]) -> DocumentPlan {
    let mut plan = DocumentPlan { document: document.to_path_buf(), ..DocumentPlan::default() };

    for result in results {
        match result {
            ValidationResult::Valid(_) => {},
            ValidationResult::Malformed(marker) => plan.manual.push(ManualFix {
                kind: MismatchKind::MalformedReference,
                location: marker.location.clone(),
                payload: marker.payload.clone(),
                reason: format!("fix the marker payload by hand: {}", marker.reason),
            }),
            ValidationResult::Mismatch(mismatch) => match plan_mismatch(text, mismatch) {
                Ok(proposal) => plan.proposals.push(proposal),
                Err(reason) => plan.manual.push(ManualFix {
                    kind: mismatch.kind,
                    location: mismatch.reference.location.clone(),
                    payload: mismatch.reference.payload.clone(),
                    reason,
                }),
            },
        }
    }

    plan
}

/// Write a document atomically: a temp file in the same directory is
/// synced and then renamed over the original.
///
/// # Errors
///
/// Returns `Error::DocumentWrite` on any I/O failure; the original file is
/// left as it was.
pub fn write_document(path: &Path, contents: &str) -> Result<(), Error> {
    let write_error = |source: std::io::Error| Error::DocumentWrite { path: path.to_path_buf(), source };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_error)?;
    temp.write_all(contents.as_bytes()).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

/// The edit replacing a stale `start-end` in the marker, if it has one.
fn hint_edit(text: &str, mismatch: &Mismatch) -> Option<FixEdit> {
    let range = mismatch.reference.lines_range?;
    let resolved = mismatch.resolved.as_ref()?;
    let expected = text.get(range.start..range.end)?;
    let replacement = resolved.lines.to_string();
    (expected != replacement).then(|| FixEdit {
        document: mismatch.reference.location.document.clone(),
        expected: expected.to_string(),
        range,
        replacement,
    })
}

/// Compute the proposal for one mismatch, or the reason none is safe.
fn plan_mismatch(text: &str, mismatch: &Mismatch) -> Result<ProposedFix, String> {
    let proposal = |edits: Vec<FixEdit>, summary: String| ProposedFix {
        edits,
        kind: mismatch.kind,
        location: mismatch.reference.location.clone(),
        payload: mismatch.reference.payload.clone(),
        summary,
    };

    match mismatch.kind {
        MismatchKind::CodeLocationMismatch => {
            let edit = hint_edit(text, mismatch)
                .ok_or_else(|| "marker has no line numbers to update".to_string())?;
            let summary = format!("update marker lines {} -> {}", edit.expected, edit.replacement);
            Ok(proposal(vec![edit], summary))
        },
        MismatchKind::CodeContentMismatch => {
            let (Some(block), Some(resolved)) = (&mismatch.reference.following_block, &mismatch.resolved) else {
                return Err("nothing to compare the quoted code with".to_string());
            };
            if closes_fence(&resolved.content, block.fence) {
                return Err(format!(
                    "the current source contains a line that would close the {}-character fence; \
                     lengthen the fence and update the block by hand",
                    block.fence.len
                ));
            }
            let terminator = if block.content.ends_with("\r\n") { "\r\n" } else { "\n" };
            // An opener on the last line without a newline leaves the content
            // range at the end of the info string.
            let lead = if starts_mid_line(text, block.content_range.start) { terminator } else { "" };
            let mut edits = vec![FixEdit {
                document: mismatch.reference.location.document.clone(),
                expected: block.content.clone(),
                range: block.content_range,
                replacement: format!("{lead}{}{terminator}", resolved.content),
            }];
            edits.extend(hint_edit(text, mismatch));
            let summary = format!(
                "replace quoted code with {}:{}",
                resolved.file.display(),
                resolved.lines
            );
            Ok(proposal(edits, summary))
        },
        MismatchKind::CodeBlockMissing => {
            Err("no fenced code block follows the marker; add one by hand".to_string())
        },
        MismatchKind::FileNotFound | MismatchKind::SymbolNotFound => {
            Err(format!("{}; update the marker by hand", mismatch.detail))
        },
        MismatchKind::MalformedReference => Err("fix the marker payload by hand".to_string()),
    }
}

/// Whether `offset` falls after the first byte of a line.
fn starts_mid_line(text: &str, offset: usize) -> bool {
    text.get(..offset).is_some_and(|before| !before.is_empty() && !before.ends_with('\n'))
}
