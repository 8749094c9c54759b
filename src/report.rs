//! Check reports: one line per failing reference, or a JSON array of every result.

use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::analysis::DocumentAnalysis;
use crate::types::{MismatchKind, ResolvedSpan, ValidationResult};

/// Output format of `coderef check`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// A JSON array of every result.
    Json,
    /// One line per failure plus a summary.
    #[default]
    Text,
}

/// Totals across one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Documents analysed.
    pub documents: usize,
    /// References that did not validate.
    pub failures: usize,
    /// References checked.
    pub references: usize,
}

/// One result as it appears in the JSON report.
#[derive(Serialize)]
struct ResultJson<'a> {
    /// Why the reference failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    /// Markdown document.
    document: &'a Path,
    /// Whether `coderef fix` can repair it.
    #[serde(skip_serializing_if = "Option::is_none")]
    fixable: Option<bool>,
    /// Failure kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<MismatchKind>,
    /// 1-based marker line.
    line: u32,
    /// Byte offset of the marker.
    offset: usize,
    /// Raw marker payload.
    payload: &'a str,
    /// What the target resolved to, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<&'a ResolvedSpan>,
    /// `valid`, `mismatch`, or `malformed`.
    status: &'static str,
}

impl Summary {
    /// Totals over a set of analyses.
    pub fn from_analyses(analyses: &[DocumentAnalysis]) -> Self {
        analyses.iter().fold(Self::default(), |total, analysis| Self {
            documents: total.documents.saturating_add(1),
            failures: total.failures.saturating_add(analysis.failure_count()),
            references: total.references.saturating_add(analysis.results.len()),
        })
    }
}

/// JSON array with one object per live marker, valid ones included.
pub fn render_json(analyses: &[DocumentAnalysis]) -> String {
    let results: Vec<ResultJson<'_>> = analyses
        .iter()
        .flat_map(|analysis| analysis.results.iter())
        .map(result_json)
        .collect();
    // serde_json::to_string_pretty won't fail on this structure.
    serde_json::to_string_pretty(&results).unwrap_or_default()
}

/// `KIND  doc.md:LINE  payload (detail)` per failure, then a summary line.
pub fn render_text(analyses: &[DocumentAnalysis]) -> String {
    let mut out = String::new();
    for result in analyses.iter().flat_map(|analysis| analysis.results.iter()) {
        let Some(kind) = result.kind() else {
            continue;
        };
        let location = result.location();
        let _ = write!(out, "{kind}  {}:{}  {}", location.document.display(), location.line, result.payload());
        if let Some(detail) = detail(result) {
            let _ = write!(out, " ({detail})");
        }
        out.push('\n');
    }

    let summary = Summary::from_analyses(analyses);
    if summary.failures > 0 {
        out.push('\n');
        let _ = writeln!(
            out,
            "{} of {} references failed in {} documents",
            summary.failures, summary.references, summary.documents
        );
    } else {
        let _ = writeln!(
            out,
            "All {} references valid in {} documents",
            summary.references, summary.documents
        );
    }
    out
}

/// Explanation for a failing result.
fn detail(result: &ValidationResult) -> Option<&str> {
    match result {
        ValidationResult::Malformed(marker) => Some(marker.reason.as_str()),
        ValidationResult::Mismatch(mismatch) => Some(mismatch.detail.as_str()),
        ValidationResult::Valid(_) => None,
    }
}

/// JSON view of one result.
fn result_json(result: &ValidationResult) -> ResultJson<'_> {
    let location = result.location();
    let (status, resolved) = match result {
        ValidationResult::Malformed(_) => ("malformed", None),
        ValidationResult::Mismatch(mismatch) => ("mismatch", mismatch.resolved.as_ref()),
        ValidationResult::Valid(_) => ("valid", None),
    };
    ResultJson {
        detail: detail(result),
        document: &location.document,
        fixable: result.kind().map(MismatchKind::is_auto_fixable),
        kind: result.kind(),
        line: location.line,
        offset: location.offset,
        payload: result.payload(),
        resolved,
        status,
    }
}
