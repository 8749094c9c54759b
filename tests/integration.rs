use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Copy a fixture project into a fresh temp dir so tests can modify it.
fn project(fixture: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(fixture);
    for entry in walkdir::WalkDir::new(&source) {
        let entry = entry.unwrap();
        let dest = dir.path().join(entry.path().strip_prefix(&source).unwrap());
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest).unwrap();
        } else {
            std::fs::copy(entry.path(), &dest).unwrap();
        }
    }
    dir
}

fn coderef(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_coderef"))
        .current_dir(dir.path())
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn read(dir: &TempDir, path: &str) -> String {
    std::fs::read_to_string(dir.path().join(path)).unwrap()
}

/// Shift every declaration down one line and change the body of `add`.
fn drift_source(dir: &TempDir) {
    let source = read(dir, "src/a.ts");
    let drifted = format!("// header\n{}", source.replace("return x + y;", "return y + x;"));
    std::fs::write(dir.path().join("src/a.ts"), drifted).unwrap();
}

#[test]
fn check_passes_on_synced_docs() {
    let dir = project("basic");
    let check = coderef(&dir, &["check"]);
    assert_eq!(check.status.code(), Some(0), "stderr: {}", stderr(&check));
    assert!(stdout(&check).contains("All 3 references valid in 1 documents"), "{}", stdout(&check));
}

#[test]
fn check_reports_drift_with_exit_code_one() {
    let dir = project("basic");
    drift_source(&dir);

    let check = coderef(&dir, &["check"]);
    assert_eq!(check.status.code(), Some(1));
    let out = stdout(&check);
    assert!(out.contains("CODE_LOCATION_MISMATCH  docs/guide.md:5  src/a.ts#greet:3-8"), "{out}");
    assert!(out.contains("CODE_CONTENT_MISMATCH  docs/guide.md:17  src/a.ts:10-12"), "{out}");
    assert!(!out.contains("ghost"), "example markers must not be checked: {out}");
}

#[test]
fn fix_yes_restores_agreement() {
    let dir = project("basic");
    drift_source(&dir);

    let fix = coderef(&dir, &["fix", "--yes"]);
    assert_eq!(fix.status.code(), Some(0), "stderr: {}", stderr(&fix));
    assert!(stderr(&fix).contains("## Fixed"));

    let guide = read(&dir, "docs/guide.md");
    assert!(guide.contains("<!-- CODE_REF: src/a.ts#greet:4-9 -->"));
    assert!(guide.contains("<!-- CODE_REF: src/a.ts#User#getName -->"));

    let check = coderef(&dir, &["check"]);
    assert_eq!(check.status.code(), Some(0), "{}", stdout(&check));

    let again = coderef(&dir, &["fix", "--yes"]);
    assert_eq!(again.status.code(), Some(0));
    assert_eq!(read(&dir, "docs/guide.md"), guide);
}

#[test]
fn dry_run_prints_diff_and_writes_nothing() {
    let dir = project("basic");
    drift_source(&dir);
    let before = read(&dir, "docs/guide.md");

    let fix = coderef(&dir, &["fix", "--dry-run"]);
    assert_eq!(fix.status.code(), Some(1));
    let out = stdout(&fix);
    assert!(out.contains("--- a/docs/guide.md"), "{out}");
    assert!(out.contains("+<!-- CODE_REF: src/a.ts#greet:4-9 -->"), "{out}");
    assert!(stderr(&fix).contains("## Would fix"));
    assert_eq!(read(&dir, "docs/guide.md"), before);
}

#[test]
fn interactive_fix_without_answers_changes_nothing() {
    let dir = project("basic");
    drift_source(&dir);
    let before = read(&dir, "docs/guide.md");

    let fix = coderef(&dir, &["fix"]);
    assert_eq!(fix.status.code(), Some(1));
    assert!(stderr(&fix).contains("Apply this fix?"));
    assert_eq!(read(&dir, "docs/guide.md"), before);
}

#[test]
fn json_report_lists_every_reference() {
    let dir = project("basic");
    drift_source(&dir);

    let check = coderef(&dir, &["check", "--format", "json"]);
    assert_eq!(check.status.code(), Some(1));
    let results: serde_json::Value = serde_json::from_slice(&check.stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 3);

    let statuses: Vec<&str> = results.iter().map(|r| r["status"].as_str().unwrap()).collect();
    assert_eq!(statuses, ["mismatch", "mismatch", "valid"]);
    assert_eq!(results[0]["kind"], "CODE_LOCATION_MISMATCH");
    assert_eq!(results[0]["fixable"], true);
    assert_eq!(results[0]["resolved"]["lines"]["start"], 4);
    assert_eq!(results[1]["line"], 17);
}

#[test]
fn unfixable_references_are_left_for_a_human() {
    let dir = project("basic");
    let broken = "\
<!-- CODE_REF: src/a.ts#ghost -->
```ts
```

<!-- CODE_REF: src/missing.ts#add -->
```ts
```

<!-- CODE_REF: src/a.ts#greet -->
The greet function is above.

<!-- CODE_REF: src/a.ts -->
";
    std::fs::write(dir.path().join("docs/broken.md"), broken).unwrap();

    let check = coderef(&dir, &["check", "docs/broken.md"]);
    assert_eq!(check.status.code(), Some(1));
    let out = stdout(&check);
    for kind in ["SYMBOL_NOT_FOUND", "FILE_NOT_FOUND", "CODE_BLOCK_MISSING", "MALFORMED_REFERENCE"] {
        assert!(out.contains(kind), "missing {kind}: {out}");
    }

    let fix = coderef(&dir, &["fix", "--yes", "docs/broken.md"]);
    assert_eq!(fix.status.code(), Some(1));
    assert!(stderr(&fix).contains("## Needs manual attention"));
    assert_eq!(read(&dir, "docs/broken.md"), broken);
}

#[test]
fn unreadable_document_exits_with_two() {
    let dir = project("basic");
    std::fs::write(dir.path().join("docs/binary.md"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

    let check = coderef(&dir, &["check"]);
    assert_eq!(check.status.code(), Some(2));
    assert!(stderr(&check).contains("Document Unreadable"));
    assert!(stdout(&check).contains("All 3 references valid"));
}

#[test]
fn config_excludes_drafts() {
    let dir = project("basic");
    std::fs::create_dir_all(dir.path().join("docs/drafts")).unwrap();
    std::fs::write(dir.path().join("docs/drafts/wip.md"), "<!-- CODE_REF: src/a.ts#ghost -->\n").unwrap();
    assert_eq!(coderef(&dir, &["check"]).status.code(), Some(1));

    std::fs::write(dir.path().join(".coderef.toml"), "exclude = [\"docs/drafts/\"]\n").unwrap();
    assert_eq!(coderef(&dir, &["check"]).status.code(), Some(0));
}

#[test]
fn malformed_config_is_a_runtime_error() {
    let dir = project("basic");
    std::fs::write(dir.path().join(".coderef.toml"), "[compare]\ntrailing_whitespace = 1\n").unwrap();
    let check = coderef(&dir, &["check"]);
    assert_eq!(check.status.code(), Some(3));
    assert!(stderr(&check).contains("Invalid TOML"));
}

#[test]
fn resolve_lists_symbols_and_prints_markers() {
    let dir = project("basic");

    let list = coderef(&dir, &["resolve", "src/a.ts"]);
    assert!(list.status.success());
    let names = stdout(&list);
    assert!(names.contains("src/a.ts#User#getName\n"));
    assert!(names.contains("src/a.ts#add\n"));

    let one = coderef(&dir, &["resolve", "src/a.ts", "add"]);
    assert!(one.status.success());
    assert_eq!(
        stdout(&one),
        "<!-- CODE_REF: src/a.ts#add:10-12 -->\n```ts\nexport function add(x: number, y: number): number {\n  return x + y;\n}\n```\n"
    );

    let missing = coderef(&dir, &["resolve", "src/a.ts", "ghost"]);
    assert!(!missing.status.success());
    assert!(stderr(&missing).contains("Symbol Not Found"));
}

#[test]
fn readme_examples_are_not_live_markers() {
    let dir = project("basic");
    let readme = Path::new(env!("CARGO_MANIFEST_DIR")).join("README.md");
    let check = coderef(&dir, &["check", readme.to_str().unwrap()]);
    assert_eq!(check.status.code(), Some(0), "{}", stdout(&check));
    assert!(stdout(&check).contains("All 0 references valid in 1 documents"), "{}", stdout(&check));
}
