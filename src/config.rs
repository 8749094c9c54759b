use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

/// Name of the optional project config file at the root.
pub const CONFIG_FILE: &str = ".coderef.toml";

/// How quoted code is compared with the resolved source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhitespacePolicy {
    /// Trailing spaces and tabs at the end of each line are ignored.
    Ignore,
    /// Byte-for-byte, apart from one trailing newline.
    #[default]
    Strict,
}

/// Project configuration loaded from `.coderef.toml`.
/// Include/exclude patterns are path prefixes applied to markdown documents.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Path prefixes never scanned.
    exclude: Vec<String>,
    /// Path prefixes to scan; empty means everything.
    include: Vec<String>,
    /// Comparison policy for quoted code.
    pub trailing_whitespace: WhitespacePolicy,
}

/// `[compare]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompareTomlConfig {
    /// Comparison policy for quoted code.
    #[serde(default)]
    trailing_whitespace: WhitespacePolicy,
}

/// Raw TOML structure for `.coderef.toml`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CoderefTomlConfig {
    /// `[compare]` settings.
    #[serde(default)]
    compare: CompareTomlConfig,
    /// Path prefixes never scanned.
    #[serde(default)]
    exclude: Vec<String>,
    /// Path prefixes to scan.
    #[serde(default)]
    include: Vec<String>,
}

impl Config {
    /// Load config from `.coderef.toml` in the given root directory.
    /// Returns a default that scans everything if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; a config the
    /// user wrote is never silently replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
        };
        Self::parse(&content)
    }

    /// Parse config text.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: CoderefTomlConfig = toml::from_str(content)?;
        Ok(Self {
            exclude: raw.exclude,
            include: raw.include,
            trailing_whitespace: raw.compare.trailing_whitespace,
        })
    }

    /// Check whether a markdown file path should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        !self.exclude.iter().any(|p| relative_path.starts_with(p.as_str()))
    }
}
