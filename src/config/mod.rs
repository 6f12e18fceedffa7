//! Configuration loading and management.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::filter::FilterSpec;
use crate::render::badge::{Badge, BadgeStyle, BadgeThreshold};

/// Main configuration structure. One instance is passed by reference
/// into the report session; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory artifacts are written under.
    pub output_dir: PathBuf,
    /// Title used by the document renderers.
    pub title: String,
    /// Filtering rules (stack frames, coverage paths, outcome set).
    pub filter: FilterSpec,
    /// Structured-data renderer configuration.
    pub json: JsonConfig,
    /// Summary document renderer configuration.
    pub summary: SummaryConfig,
    /// Detailed document renderer configuration.
    pub detailed: DetailedConfig,
    /// Badge style and color thresholds.
    pub badge: BadgeConfig,
    /// Named template overrides (template name -> source text).
    pub templates: TemplateConfig,
    /// Source link generation for test cases.
    pub git_links: GitLinkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
            title: "Test Report".to_string(),
            filter: FilterSpec::default(),
            json: JsonConfig::default(),
            summary: SummaryConfig::default(),
            detailed: DetailedConfig::default(),
            badge: BadgeConfig::default(),
            templates: TemplateConfig::default(),
            git_links: GitLinkConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit TOML file path.
    ///
    /// Errors if the file does not exist or fails to parse. Unset keys
    /// fall back to their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(crate::core::Error::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a directory, looking for `verdict.toml`
    /// or `.verdict/verdict.toml`. Missing files are silently skipped
    /// (defaults are used).
    pub fn load_default(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        for candidate in [dir.join("verdict.toml"), dir.join(".verdict/verdict.toml")] {
            if candidate.exists() {
                return Self::from_file(candidate);
            }
        }
        Ok(Self::default())
    }
}

/// Structured-data (JSON) renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonConfig {
    pub enabled: bool,
    /// One combined artifact across runs instead of one per run.
    pub aggregate: bool,
    pub include_stdout: bool,
    pub include_stderr: bool,
    /// Include per-class coverage nodes.
    pub include_classes: bool,
    /// Include per-method coverage nodes.
    pub include_methods: bool,
    /// Include per-line coverage detail (large).
    pub include_lines: bool,
    /// Replace covered/missed pairs with two-decimal percent strings.
    pub simplified_counters: bool,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            aggregate: true,
            include_stdout: true,
            include_stderr: true,
            include_classes: true,
            include_methods: true,
            include_lines: false,
            simplified_counters: false,
        }
    }
}

/// Summary markdown renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub enabled: bool,
    /// One table across runs instead of one artifact per run.
    pub aggregate: bool,
    /// Decimal places of displayed coverage percentages.
    pub precision: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            aggregate: true,
            precision: 0,
        }
    }
}

/// Detailed markdown renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailedConfig {
    pub enabled: bool,
    /// One document across runs instead of one per run.
    pub aggregate: bool,
    /// Emit a block per test case; summary-only sections otherwise.
    pub per_test_case: bool,
    pub include_stdout: bool,
    pub include_stderr: bool,
    /// Include captured output even for passed cases.
    pub always_include_output: bool,
    /// Compress common package prefixes in coverage tables.
    pub abbreviate_packages: bool,
}

impl Default for DetailedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            aggregate: false,
            per_test_case: true,
            include_stdout: true,
            include_stderr: true,
            always_include_output: false,
            abbreviate_packages: true,
        }
    }
}

/// Badge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeConfig {
    pub style: BadgeStyle,
    /// Color thresholds, applied at or above the threshold; evaluated
    /// descending.
    pub thresholds: Vec<BadgeThreshold>,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            style: BadgeStyle::default(),
            thresholds: Badge::default_colors(),
        }
    }
}

impl BadgeConfig {
    pub fn badge(&self) -> Badge {
        Badge::new(self.style, self.thresholds.clone())
    }
}

/// Template overrides by name; an override shadows the built-in
/// template of the same name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub overrides: BTreeMap<String, String>,
}

/// Source-link generation. Links render only when both repository and
/// commit are known.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitLinkConfig {
    /// Repository slug, e.g. `acme/widgets`.
    pub repository: Option<String>,
    /// Commit SHA the report was produced from.
    pub commit: Option<String>,
    /// URL template with `{repository}`, `{commit}` and `{file}`
    /// placeholders.
    pub url_template: String,
}

impl Default for GitLinkConfig {
    fn default() -> Self {
        Self {
            repository: None,
            commit: None,
            url_template: "https://github.com/{repository}/blob/{commit}/{file}".to_string(),
        }
    }
}

impl GitLinkConfig {
    /// Resolve the link for a source file, if enough context is set.
    pub fn link_for(&self, file: &str) -> Option<String> {
        let repository = self.repository.as_deref()?;
        let commit = self.commit.as_deref()?;
        Some(
            self.url_template
                .replace("{repository}", repository)
                .replace("{commit}", commit)
                .replace("{file}", file),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output_dir, PathBuf::from("reports"));
        assert!(config.json.enabled);
        assert!(config.json.aggregate);
        assert!(!config.json.include_lines);
        assert!(config.summary.aggregate);
        assert_eq!(config.summary.precision, 0);
        assert!(!config.detailed.aggregate);
        assert_eq!(config.badge.thresholds.len(), 3);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            output_dir = "build/reports"

            [summary]
            precision = 1

            [detailed]
            enabled = false

            [badge]
            style = "flat-square"

            [filter.stack]
            includes = ["com.acme.**"]
            excludes = ["com.acme.internal.**"]
            "#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("build/reports"));
        assert_eq!(config.summary.precision, 1);
        assert!(!config.detailed.enabled);
        assert!(config.json.enabled);
        assert_eq!(config.badge.style, BadgeStyle::FlatSquare);
        assert_eq!(config.filter.stack.includes, vec!["com.acme.**"]);
    }

    #[test]
    fn test_from_file_missing_is_config_error() {
        let err = Config::from_file("/nonexistent/verdict.toml").unwrap_err();
        assert!(matches!(err, crate::core::Error::Config(_)));
    }

    #[test]
    fn test_load_default_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_default(dir.path()).unwrap();
        assert_eq!(config.title, "Test Report");
    }

    #[test]
    fn test_load_default_reads_dotdir_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".verdict")).unwrap();
        std::fs::write(
            dir.path().join(".verdict/verdict.toml"),
            "title = \"Widgets CI\"\n",
        )
        .unwrap();
        let config = Config::load_default(dir.path()).unwrap();
        assert_eq!(config.title, "Widgets CI");
    }

    #[test]
    fn test_git_link_resolution() {
        let links = GitLinkConfig {
            repository: Some("acme/widgets".to_string()),
            commit: Some("abc123".to_string()),
            ..GitLinkConfig::default()
        };
        assert_eq!(
            links.link_for("src/test/java/FooTest.java").unwrap(),
            "https://github.com/acme/widgets/blob/abc123/src/test/java/FooTest.java"
        );
        assert!(GitLinkConfig::default().link_for("a.java").is_none());
    }
}
