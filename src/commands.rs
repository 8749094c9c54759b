//! CLI commands for coderef: check, fix, resolve.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::info;

use crate::analysis::{DocumentAnalysis, analyze_documents};
use crate::config::Config;
use crate::diagnostics;
use crate::error::Error;
use crate::fixer::{self, FixPolicy, ManualFix};
use crate::grammar::SOURCE_EXTENSIONS;
use crate::prompt::{PromptDecider, render_diff};
use crate::report::{self, OutputFormat};
use crate::resolver;
use crate::scanner;
use crate::source::{ParseCache, SourceFile};
use crate::types::TargetSpec;

/// Exit code when any reference failed or a fix was left undone.
const EXIT_FAILURES: u8 = 1;

/// Exit code when any document could not be read.
const EXIT_UNREADABLE: u8 = 2;

/// Counters for the fix report.
#[derive(Debug, Default)]
struct FixTotals {
    /// Quit was chosen at a prompt.
    aborted: bool,
    /// Documents whose edits could not be applied or written.
    failed: usize,
    /// `(document, fixes)` per document that changed.
    fixed: Vec<(PathBuf, usize)>,
    /// Mismatches with no safe automatic edit.
    manual: Vec<ManualFix>,
    /// Proposals declined at the prompt.
    rejected: usize,
}

/// Validate every reference in the given markdown (or the whole project).
///
/// # Errors
///
/// Returns `Error::Io` or `Error::TomlDe` if `.coderef.toml` cannot be loaded.
pub fn check(paths: &[PathBuf], format: OutputFormat) -> Result<ExitCode, Error> {
    let root = PathBuf::from(".");
    let (analyses, unreadable) = analyze(&root, paths)?;

    match format {
        OutputFormat::Json => println!("{}", report::render_json(&analyses)),
        OutputFormat::Text => print!("{}", report::render_text(&analyses)),
    }

    let failures = analyses.iter().any(|analysis| analysis.failure_count() > 0);
    Ok(exit_code(unreadable, failures))
}

/// Rewrite markdown so quoted code and line hints agree with the source.
///
/// Documents are fixed one at a time. Within a document every accepted edit
/// is written together or not at all. Quitting the prompt keeps documents
/// already written and stops before the next proposal.
///
/// # Errors
///
/// Returns `Error::Io` or `Error::TomlDe` if `.coderef.toml` cannot be loaded.
pub fn fix(paths: &[PathBuf], policy: FixPolicy) -> Result<ExitCode, Error> {
    let root = PathBuf::from(".");
    let (analyses, unreadable) = analyze(&root, paths)?;
    let mut decider = PromptDecider::new(std::io::stdin().lock(), std::io::stderr());
    let mut totals = FixTotals::default();

    for analysis in &analyses {
        let plan = fixer::plan_document(&analysis.document, &analysis.text, &analysis.results);
        totals.manual.extend(plan.manual.iter().cloned());
        if plan.proposals.is_empty() {
            continue;
        }

        let outcome = match fixer::apply_plan(&plan, &analysis.text, policy, &mut decider) {
            Ok(outcome) => outcome,
            Err(e) => {
                diagnostics::print_error(&e);
                totals.failed = totals.failed.saturating_add(1);
                continue;
            },
        };
        totals.rejected = totals.rejected.saturating_add(outcome.rejected);

        if let Some(updated) = &outcome.text {
            if policy == FixPolicy::Preview {
                print!("{}", render_diff(&analysis.document, &analysis.text, updated));
                totals.fixed.push((analysis.document.clone(), outcome.applied));
            } else {
                match write_fixed(&root, analysis, updated) {
                    Ok(()) => {
                        info!(document = %analysis.document.display(), fixes = outcome.applied, "document fixed");
                        totals.fixed.push((analysis.document.clone(), outcome.applied));
                    },
                    Err(e) => {
                        diagnostics::print_error(&e);
                        totals.failed = totals.failed.saturating_add(1);
                    },
                }
            }
        }

        if outcome.aborted {
            totals.aborted = true;
            break;
        }
    }

    eprint!("{}", render_fix_report(&totals, policy));
    let left_over = (policy == FixPolicy::Preview && !totals.fixed.is_empty())
        || !totals.manual.is_empty()
        || totals.rejected > 0
        || totals.failed > 0
        || totals.aborted;
    Ok(exit_code(unreadable, left_over))
}

/// List the addressable symbols of a source file, or print a ready-to-paste
/// marker and code block for one selector.
///
/// # Errors
///
/// Returns `Error::Resolution` if the file cannot be loaded or the selector
/// does not resolve, and `Error::InvalidSelector` if it does not parse.
pub fn resolve(file: &Path, selector: Option<&str>) -> Result<(), Error> {
    let source = SourceFile::read(file)?;

    let Some(selector) = selector else {
        match source.outline()? {
            Some(outline) => {
                for name in outline.addressable_names() {
                    println!("{}#{name}", file.display());
                }
            },
            None => eprintln!(
                "`{}` has no symbols; only line ranges resolve outside .{} files",
                file.display(),
                SOURCE_EXTENSIONS.join("/.")
            ),
        }
        return Ok(());
    };

    let target = resolver::parse_selector(file, selector)?;
    let span = resolver::resolve(&source, &target)?;
    let marker = match &target {
        TargetSpec::LineRange { .. } => format!("{}:{}", file.display(), span.lines),
        TargetSpec::ClassMethod { .. } | TargetSpec::Symbol { .. } => {
            format!("{}#{}:{}", file.display(), target.selector(), span.lines)
        },
    };
    let fence = "`".repeat(longest_backtick_run(&span.content).saturating_add(1).max(3));
    let language = file.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
    println!("<!-- CODE_REF: {marker} -->\n{fence}{language}\n{}\n{fence}", span.content);
    Ok(())
}

/// Discover and analyse documents, printing unreadable ones as they are found.
/// Returns the readable analyses and whether any document was unreadable.
///
/// # Errors
///
/// Returns `Error::Io` or `Error::TomlDe` if `.coderef.toml` cannot be loaded.
fn analyze(root: &Path, paths: &[PathBuf]) -> Result<(Vec<DocumentAnalysis>, bool), Error> {
    let config = Config::load(root)?;
    let documents = scanner::discover_documents(root, paths, &config);
    let cache = ParseCache::new();

    let mut analyses = Vec::with_capacity(documents.len());
    let mut unreadable = false;
    for result in analyze_documents(root, &documents, &config, &cache) {
        match result {
            Ok(analysis) => analyses.push(analysis),
            Err(e) => {
                diagnostics::print_error(&e);
                unreadable = true;
            },
        }
    }
    Ok((analyses, unreadable))
}

/// Unreadable documents outrank reference failures.
fn exit_code(unreadable: bool, failures: bool) -> ExitCode {
    if unreadable {
        ExitCode::from(EXIT_UNREADABLE)
    } else if failures {
        ExitCode::from(EXIT_FAILURES)
    } else {
        ExitCode::SUCCESS
    }
}

/// Longest run of consecutive backticks in `text`.
fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

/// Markdown summary of a fix run, for stderr.
fn render_fix_report(totals: &FixTotals, policy: FixPolicy) -> String {
    let mut out = String::new();
    if totals.fixed.is_empty()
        && totals.manual.is_empty()
        && totals.failed == 0
        && totals.rejected == 0
        && !totals.aborted
    {
        out.push_str("All references valid, nothing to fix.\n");
        return out;
    }

    if !totals.fixed.is_empty() {
        let heading = if policy == FixPolicy::Preview { "Would fix" } else { "Fixed" };
        let _ = write!(out, "\n## {heading}\n\n");
        for (document, count) in &totals.fixed {
            let _ = writeln!(out, "- {}: {count} fix(es)", document.display());
        }
    }

    if !totals.manual.is_empty() {
        out.push_str("\n## Needs manual attention\n\n");
        for manual in &totals.manual {
            let _ = writeln!(
                out,
                "- {}:{}  {}  `{}`: {}",
                manual.location.document.display(),
                manual.location.line,
                manual.kind,
                manual.payload,
                manual.reason
            );
        }
    }

    if totals.rejected > 0 {
        let _ = writeln!(out, "\n{} fix(es) declined.", totals.rejected);
    }
    if totals.aborted {
        out.push_str("\nStopped early; documents after the last answer were not fixed.\n");
    }
    out
}

/// Write a fixed document after checking it still reads as it did during analysis.
///
/// # Errors
///
/// Returns `Error::EditConflict` if the document changed on disk in the
/// meantime, `Error::DocumentUnreadable` if it can no longer be read, and
/// `Error::DocumentWrite` if writing fails.
fn write_fixed(root: &Path, analysis: &DocumentAnalysis, updated: &str) -> Result<(), Error> {
    let path = root.join(&analysis.document);
    let current = std::fs::read_to_string(&path).map_err(|source| Error::DocumentUnreadable {
        path: analysis.document.clone(),
        source,
    })?;
    if current != analysis.text {
        return Err(Error::EditConflict {
            document: analysis.document.clone(),
            end: current.len(),
            reason: "document changed on disk since it was checked".to_string(),
            start: 0,
        });
    }
    fixer::write_document(&path, updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_outranks_failures() {
        assert_eq!(exit_code(true, true), ExitCode::from(EXIT_UNREADABLE));
        assert_eq!(exit_code(false, true), ExitCode::from(EXIT_FAILURES));
        assert_eq!(exit_code(false, false), ExitCode::SUCCESS);
    }

    #[test]
    fn measures_backtick_runs() {
        assert_eq!(longest_backtick_run("no ticks"), 0);
        assert_eq!(longest_backtick_run("a `b` ````c"), 4);
    }

    #[test]
    fn fix_report_lists_manual_items() {
        let totals = FixTotals {
            fixed: vec![(PathBuf::from("docs/a.md"), 2)],
            manual: vec![ManualFix {
                kind: crate::types::MismatchKind::SymbolNotFound,
                location: crate::types::MarkerLocation { document: PathBuf::from("docs/a.md"), line: 7, offset: 0 },
                payload: "src/a.ts#ghost".to_string(),
                reason: "gone".to_string(),
            }],
            ..FixTotals::default()
        };
        let report = render_fix_report(&totals, FixPolicy::Unconditional);
        assert!(report.contains("## Fixed\n\n- docs/a.md: 2 fix(es)"));
        assert!(report.contains("- docs/a.md:7  SYMBOL_NOT_FOUND  `src/a.ts#ghost`: gone"));
    }

    #[test]
    fn clean_run_says_nothing_to_fix() {
        let report = render_fix_report(&FixTotals::default(), FixPolicy::Preview);
        assert_eq!(report, "All references valid, nothing to fix.\n");
    }
}
