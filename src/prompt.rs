//! Interactive confirmation for `coderef fix`.

use std::io::{BufRead, Write};
use std::path::Path;

use similar::TextDiff;

use crate::fixer::{Decision, FixDecider, ProposedFix, apply_edits};

/// Lines of unchanged context around each diff hunk.
const CONTEXT_LINES: usize = 3;

/// Asks about each fix on `output` and reads `y`/`n`/`q` answers from `input`.
/// End of input counts as `q`.
pub struct PromptDecider<R, W> {
    /// Where answers are read from.
    input: R,
    /// Where questions and diffs are written.
    output: W,
}

impl<R: BufRead, W: Write> PromptDecider<R, W> {
    /// Show one proposal and read an answer. EOF counts as quit.
    fn ask(&mut self, original: &str, proposal: &ProposedFix) -> std::io::Result<Decision> {
        let location = &proposal.location;
        writeln!(
            self.output,
            "\n{}  {}:{}  {}\n{}",
            proposal.kind,
            location.document.display(),
            location.line,
            proposal.payload,
            proposal.summary
        )?;
        match apply_edits(&location.document, original, &proposal.edits) {
            Ok(updated) => write!(self.output, "{}", render_diff(&location.document, original, &updated))?,
            Err(e) => {
                writeln!(self.output, "cannot preview: {e}")?;
                return Ok(Decision::Reject);
            },
        }

        loop {
            write!(self.output, "Apply this fix? [y]es / [n]o / [q]uit: ")?;
            self.output.flush()?;
            let mut answer = String::new();
            if self.input.read_line(&mut answer)? == 0 {
                return Ok(Decision::Abort);
            }
            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(Decision::Accept),
                "" | "n" | "no" => return Ok(Decision::Reject),
                "q" | "quit" => return Ok(Decision::Abort),
                _ => writeln!(self.output, "Please answer y, n, or q.")?,
            }
        }
    }

    /// Prompt on `output`, reading answers from `input`.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> FixDecider for PromptDecider<R, W> {
    fn decide(&mut self, original: &str, proposal: &ProposedFix) -> Decision {
        // A terminal that cannot be read from or written to cannot confirm anything.
        self.ask(original, proposal).unwrap_or(Decision::Abort)
    }
}

/// Unified diff of one document before and after a fix.
pub fn render_diff(document: &Path, original: &str, updated: &str) -> String {
    let name = document.display().to_string();
    TextDiff::from_lines(original, updated)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::types::{CodeRange, FixEdit, MarkerLocation, MismatchKind};

    const DOC: &str = "<!-- CODE_REF: src/a.ts#add:1-3 -->\n```ts\ncode\n```\n";

    fn proposal() -> ProposedFix {
        let start = DOC.find("1-3").unwrap();
        ProposedFix {
            edits: vec![FixEdit {
                document: PathBuf::from("doc.md"),
                expected: "1-3".to_string(),
                range: CodeRange::new(start, start + 3),
                replacement: "11-13".to_string(),
            }],
            kind: MismatchKind::CodeLocationMismatch,
            location: MarkerLocation { document: PathBuf::from("doc.md"), line: 1, offset: 0 },
            payload: "src/a.ts#add:1-3".to_string(),
            summary: "update marker lines 1-3 -> 11-13".to_string(),
        }
    }

    fn decide(answers: &str) -> (Decision, String) {
        let mut output = Vec::new();
        let decision = PromptDecider::new(answers.as_bytes(), &mut output).decide(DOC, &proposal());
        (decision, String::from_utf8(output).unwrap())
    }

    #[test]
    fn shows_diff_and_accepts_yes() {
        let (decision, output) = decide("y\n");
        assert_eq!(decision, Decision::Accept);
        assert!(output.contains("CODE_LOCATION_MISMATCH  doc.md:1"));
        assert!(output.contains("-<!-- CODE_REF: src/a.ts#add:1-3 -->"));
        assert!(output.contains("+<!-- CODE_REF: src/a.ts#add:11-13 -->"));
    }

    #[test]
    fn reprompts_on_unknown_answers() {
        let (decision, output) = decide("maybe\nn\n");
        assert_eq!(decision, Decision::Reject);
        assert!(output.contains("Please answer y, n, or q."));
    }

    #[test]
    fn quit_and_end_of_input_abort() {
        assert_eq!(decide("q\n").0, Decision::Abort);
        assert_eq!(decide("").0, Decision::Abort);
    }

    #[test]
    fn diff_has_headers() {
        let diff = render_diff(Path::new("doc.md"), "a\nb\n", "a\nc\n");
        assert!(diff.starts_with("--- a/doc.md\n+++ b/doc.md\n"));
        assert!(diff.contains("-b\n+c\n"));
    }
}
