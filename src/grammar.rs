/// Tree-sitter grammar resolution by file extension.
use std::path::Path;

use tree_sitter::Language;

/// Extensions of the TypeScript/JavaScript family that symbols can be resolved in.
pub const SOURCE_EXTENSIONS: &[&str] = &["cjs", "cts", "js", "jsx", "mjs", "mts", "ts", "tsx"];

/// Map a file extension to its tree-sitter language.
/// Returns `None` for files outside the TypeScript/JavaScript family.
pub fn language_for_path(path: &Path) -> Option<Language> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        "cts" | "mts" | "ts" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        // Plain JavaScript commonly carries JSX, which only the TSX grammar accepts.
        "cjs" | "js" | "jsx" | "mjs" | "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_source_extension_has_a_grammar() {
        for ext in SOURCE_EXTENSIONS {
            let path = format!("src/file.{ext}");
            assert!(language_for_path(Path::new(&path)).is_some(), "no grammar for .{ext}");
        }
    }

    #[test]
    fn prose_and_unknown_files_have_no_grammar() {
        assert!(language_for_path(Path::new("README.md")).is_none());
        assert!(language_for_path(Path::new("Makefile")).is_none());
        assert!(language_for_path(Path::new("lib.rs")).is_none());
    }
}
