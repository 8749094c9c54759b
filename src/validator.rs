//! Validation: compare what a reference quotes with what its target resolves to.

use std::borrow::Cow;

use tracing::debug;

use crate::config::WhitespacePolicy;
use crate::error::ResolutionError;
use crate::types::{Mismatch, MismatchKind, Reference, ResolvedSpan, ValidationResult};

/// Prepare text for comparison: one trailing line terminator is dropped,
/// and under `Ignore` so is trailing whitespace on every line.
pub fn normalize(text: &str, policy: WhitespacePolicy) -> Cow<'_, str> {
    let trimmed = text
        .strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text);
    match policy {
        WhitespacePolicy::Strict => Cow::Borrowed(trimmed),
        WhitespacePolicy::Ignore => Cow::Owned(
            trimmed
                .split('\n')
                .map(|line| line.trim_end_matches([' ', '\t', '\r']))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
    }
}

/// Produce the single outcome for one reference.
///
/// Resolution failures are reported as-is; otherwise a missing block, then
/// differing content, then a stale line hint are checked in that order.
pub fn validate(
    reference: Reference,
    resolution: Result<ResolvedSpan, ResolutionError>,
    policy: WhitespacePolicy,
) -> ValidationResult {
    let resolved = match resolution {
        Ok(resolved) => resolved,
        Err(err) => {
            return mismatch(reference, err.kind(), err.detail(), None);
        },
    };

    let Some(block) = &reference.following_block else {
        let detail = "no fenced code block directly follows the marker".to_string();
        return mismatch(reference, MismatchKind::CodeBlockMissing, detail, Some(resolved));
    };

    let quoted = normalize(&block.content, policy);
    let actual = normalize(&resolved.content, policy);
    if quoted != actual {
        let detail = format!(
            "quoted code differs from {}:{} (first difference at line {} of the block)",
            resolved.file.display(),
            resolved.lines,
            first_difference(&quoted, &actual),
        );
        return mismatch(reference, MismatchKind::CodeContentMismatch, detail, Some(resolved));
    }

    if let Some(hint) = reference.target.line_hint()
        && hint != resolved.lines
    {
        let detail = format!(
            "marker claims lines {hint}, `{}` is at {}",
            reference.target.selector(),
            resolved.lines
        );
        return mismatch(reference, MismatchKind::CodeLocationMismatch, detail, Some(resolved));
    }

    debug!(
        document = %reference.location.document.display(),
        line = reference.location.line,
        language = block.language.as_deref().unwrap_or_default(),
        "reference is valid"
    );
    ValidationResult::Valid(reference)
}

/// 1-based line of the first difference between two texts.
fn first_difference(left: &str, right: &str) -> usize {
    let mut left_lines = left.split('\n');
    let mut right_lines = right.split('\n');
    let mut line = 1_usize;
    loop {
        match (left_lines.next(), right_lines.next()) {
            (Some(l), Some(r)) if l == r => line = line.saturating_add(1),
            _ => return line,
        }
    }
}

/// Log and build a mismatch result.
fn mismatch(
    reference: Reference,
    kind: MismatchKind,
    detail: String,
    resolved: Option<ResolvedSpan>,
) -> ValidationResult {
    debug!(
        document = %reference.location.document.display(),
        line = reference.location.line,
        %kind,
        "reference mismatch"
    );
    ValidationResult::Mismatch(Mismatch { detail, kind, reference, resolved })
}
