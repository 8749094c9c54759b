//! Symbol resolution: a target specification and a loaded source file give
//! the exact span the target designates, or a precise not-found outcome.

use std::path::Path;

use tracing::debug;

use crate::error::{Error, ResolutionError};
use crate::outline::{ClassOutline, DeclarationKind, Method, SourceOutline};
use crate::scanner::parse_payload;
use crate::source::SourceFile;
use crate::types::{LineSpan, ResolvedSpan, TargetSpec};

/// Declaration families tried, in order, for a bare `#name` selector.
/// The first family with any candidate wins, even if a later one is closer to the hint.
pub const SYMBOL_PRECEDENCE: [Matcher; 4] =
    [Matcher::Function, Matcher::Variable, Matcher::Class, Matcher::Type];

/// Cap on names listed in a not-found detail.
const MAX_SUGGESTIONS: usize = 12;

/// One lookup strategy over the declarations of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Classes, including abstract ones.
    Class,
    /// Function declarations and function-valued bindings.
    Function,
    /// Interfaces, type aliases, and enums.
    Type,
    /// Other variable bindings.
    Variable,
}

impl Matcher {
    /// Spans of the declarations of this family that bind `name`, in file order.
    fn candidates(self, outline: &SourceOutline, name: &str) -> Vec<LineSpan> {
        let kind = self.declaration_kind();
        outline
            .declarations
            .iter()
            .filter(|decl| decl.kind == kind && decl.names.iter().any(|n| n == name))
            .map(|decl| decl.lines)
            .collect()
    }

    /// The outline family this matcher selects.
    const fn declaration_kind(self) -> DeclarationKind {
        match self {
            Self::Class => DeclarationKind::Class,
            Self::Function => DeclarationKind::Function,
            Self::Type => DeclarationKind::Type,
            Self::Variable => DeclarationKind::Variable,
        }
    }
}

/// Parse a command-line selector (`5-12`, `add`, `User#getName`, each symbolic
/// form optionally followed by `:start-end`) into a target on `file`.
///
/// # Errors
///
/// Returns `Error::InvalidSelector` if the selector has none of those shapes.
pub fn parse_selector(file: &Path, selector: &str) -> Result<TargetSpec, Error> {
    let separator = if selector.starts_with(|c: char| c.is_ascii_digit()) { ':' } else { '#' };
    let parsed = parse_payload(&format!("_{separator}{selector}")).map_err(|_reason| {
        Error::InvalidSelector {
            reason: "expected `start-end`, `name`, or `Class#method`, optionally followed by `:start-end`"
                .to_string(),
            selector: selector.to_string(),
        }
    })?;
    Ok(parsed.target.with_file(file.to_path_buf()))
}

/// Choose among same-named candidates: the one starting closest to the hint,
/// or the first in file order without a hint. Equidistant candidates also
/// fall back to file order.
pub fn pick_candidate(candidates: &[LineSpan], hint: Option<LineSpan>) -> Option<LineSpan> {
    match hint {
        None => candidates.first().copied(),
        Some(hint) => candidates
            .iter()
            .copied()
            .min_by_key(|candidate| candidate.start.abs_diff(hint.start)),
    }
}

/// Resolve a target against an already loaded source file.
///
/// Line ranges need no parse and work on any file. Symbolic targets require a
/// TypeScript or JavaScript file that parses cleanly.
///
/// # Errors
///
/// Returns `ResolutionError::FileNotFound` if the file does not parse, or
/// `ResolutionError::SymbolNotFound` if nothing matches the selector or the
/// requested lines lie outside the file.
pub fn resolve(source: &SourceFile, target: &TargetSpec) -> Result<ResolvedSpan, ResolutionError> {
    let lines = match target {
        TargetSpec::ClassMethod { class_name, line_hint, method_name, .. } => {
            find_class_method(outline_for(source, target)?, target, class_name, method_name, *line_hint)?
        },
        TargetSpec::LineRange { lines, .. } => *lines,
        TargetSpec::Symbol { line_hint, name, .. } => {
            find_symbol(outline_for(source, target)?, target, name, *line_hint)?
        },
    };

    let content = source.index().slice(source.text(), lines).ok_or_else(|| {
        symbol_not_found(
            target,
            format!(
                "lines {lines} are outside the file, which has {} lines",
                source.index().line_count()
            ),
            Vec::new(),
        )
    })?;

    Ok(ResolvedSpan {
        content: content.to_string(),
        file: target.file().to_path_buf(),
        lines,
    })
}

/// Find `Class#method`, preferring the candidate closest to the hint.
fn find_class_method(
    outline: &SourceOutline,
    target: &TargetSpec,
    class_name: &str,
    method_name: &str,
    hint: Option<LineSpan>,
) -> Result<LineSpan, ResolutionError> {
    let classes: Vec<_> = outline.classes.iter().filter(|class| class.name == class_name).collect();
    if classes.is_empty() {
        let known = outline.classes.iter().map(|class| class.name.clone()).collect();
        return Err(symbol_not_found(
            target,
            format!("class `{class_name}` not found"),
            rank_suggestions(class_name, known),
        ));
    }

    let methods: Vec<(&ClassOutline, &Method)> = classes
        .iter()
        .flat_map(|class| class.methods.iter().map(move |method| (*class, method)))
        .filter(|(_, method)| method.name == method_name)
        .collect();
    let candidates: Vec<LineSpan> = methods.iter().map(|(_, method)| method.lines).collect();

    let picked = pick_candidate(&candidates, hint).ok_or_else(|| {
        let known = classes
            .iter()
            .flat_map(|class| class.methods.iter().map(|m| format!("{}#{}", class.name, m.name)))
            .collect();
        symbol_not_found(
            target,
            format!("class `{class_name}` has no method `{method_name}`"),
            rank_suggestions(method_name, known),
        )
    })?;

    if let Some((class, method)) = methods.iter().find(|(_, method)| method.lines == picked) {
        debug!(
            class = class_name,
            class_lines = %class.lines,
            method = method_name,
            is_static = method.is_static,
            lines = %picked,
            "resolved method"
        );
    }
    Ok(picked)
}

/// Find a top-level name, trying each family in precedence order.
fn find_symbol(
    outline: &SourceOutline,
    target: &TargetSpec,
    name: &str,
    hint: Option<LineSpan>,
) -> Result<LineSpan, ResolutionError> {
    SYMBOL_PRECEDENCE
        .iter()
        .find_map(|matcher| pick_candidate(&matcher.candidates(outline, name), hint))
        .ok_or_else(|| {
            symbol_not_found(
                target,
                format!("no top-level declaration named `{name}`"),
                rank_suggestions(name, outline.addressable_names()),
            )
        })
}

/// The outline of a file a symbolic target points into.
///
/// # Errors
///
/// Returns `FileNotFound` on a parse failure and `SymbolNotFound` for files
/// outside the TypeScript/JavaScript family.
fn outline_for<'a>(source: &'a SourceFile, target: &TargetSpec) -> Result<&'a SourceOutline, ResolutionError> {
    source.outline()?.ok_or_else(|| {
        symbol_not_found(target, "not a TypeScript or JavaScript source file".to_string(), Vec::new())
    })
}

/// Order names so that likely intended ones come first, then cap the list.
fn rank_suggestions(wanted: &str, mut names: Vec<String>) -> Vec<String> {
    let wanted_lower = wanted.to_lowercase();
    names.sort_by_key(|name| {
        let lower = name.to_lowercase();
        let leaf = lower.rsplit('#').next().unwrap_or(&lower).to_string();
        (leaf != wanted_lower, !leaf.contains(&wanted_lower), name.clone())
    });
    names.dedup();
    names.truncate(MAX_SUGGESTIONS);
    names
}

/// Build a not-found error for `target`.
fn symbol_not_found(target: &TargetSpec, reason: String, suggestions: Vec<String>) -> ResolutionError {
    ResolutionError::SymbolNotFound {
        file: target.file().to_path_buf(),
        reason,
        suggestions,
        symbol: target.selector(),
    }
}
