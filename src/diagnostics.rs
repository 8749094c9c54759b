use std::fmt::Write as _;
use std::path::Path;

use crate::config::CONFIG_FILE;
use crate::error::{Error, ResolutionError};

/// ANSI bold, for markdown headings.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is
/// one, how to fix it.
pub fn render_error(e: &Error) -> String {
    match e {
        Error::DocumentUnreadable { path, source } => format!("\
# Error: Document Unreadable

`{}` could not be read: {source}

None of its references were checked.
", path.display()),

        Error::DocumentWrite { path, source } => format!("\
# Error: Write Failed

Could not write `{}`: {source}

The document on disk is unchanged.
", path.display()),

        Error::EditConflict { document, reason, start, end } => format!("\
# Error: Edit Conflict

A fix for `{}` at bytes {start}..{end} was refused: {reason}

The document on disk is unchanged.

## Fix

Run the fix again against the current text:

    coderef fix {}
", document.display(), document.display()),

        Error::InvalidSelector { reason, selector } => render_invalid_selector(selector, reason),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),

        Error::Resolution(ResolutionError::FileNotFound { path, reason }) => format!("\
# Error: File Not Found

`{}` could not be loaded: {reason}
", path.display()),

        Error::Resolution(ResolutionError::SymbolNotFound { file, reason, suggestions, symbol }) => {
            render_symbol_not_found(file, symbol, reason, suggestions)
        },

        Error::TomlDe(e) => format!("\
# Error: Invalid TOML

`{CONFIG_FILE}` could not be parsed:

{e}
"),
    }
}

/// Find a suggestion that differs from `symbol` only in case or separators.
pub(crate) fn find_closest_suggestion(symbol: &str, suggestions: &[String]) -> Option<String> {
    let normalized = fold_name(symbol);
    suggestions.iter().find(|s| fold_name(s) == normalized).cloned()
}

/// Lowercase a name and drop `_`/`-` for loose comparison.
fn fold_name(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Invalid selector block with the accepted selector forms.
fn render_invalid_selector(selector: &str, reason: &str) -> String {
    format!("\
# Error: Invalid Selector

`{selector}`: {reason}

## Accepted forms

- `12-30`: lines 12 through 30
- `add`: a function, variable, class, or type
- `User#getName`: a method of a class
- `add:12-30`, `User#getName:5-9`: with a line hint
")
}

/// Symbol-not-found block with a close match or the available names.
fn render_symbol_not_found(file: &Path, symbol: &str, reason: &str, suggestions: &[String]) -> String {
    let mut out = format!("\
# Error: Symbol Not Found

`{symbol}` could not be resolved in `{}`: {reason}
", file.display());

    if let Some(suggestion) = find_closest_suggestion(symbol, suggestions) {
        let _ = write!(out, "\n## Did you mean `{suggestion}`?\n\n");
        let _ = writeln!(out, "    coderef resolve {} {suggestion}", file.display());
    } else if !suggestions.is_empty() {
        out.push_str("\n## Available symbols\n\n");
        for s in suggestions {
            let _ = writeln!(out, "- `{s}`");
        }
    }

    out
}
