//! Configuration layering and validation.
//!
//! Settings come from three layers, highest precedence first: CLI flags, a
//! `check-syntax.toml` file, and the built-in defaults below. A list given
//! by a higher layer replaces the lower one outright.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "check-syntax.toml";

/// Path fragments excluded from full scans unless overridden.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] =
    &["/vendor/", "/node_modules/", "/core/", "modules/contrib"];

pub const DEFAULT_EXTENSIONS: &[&str] = &["php", "inc", "install", "module"];

pub const DEFAULT_RUN_ON: &[&str] = &["."];

pub const DEFAULT_CHECKER: &str = "php";

/// Syntax-only flag passed to the checker before the file path.
pub const DEFAULT_CHECKER_ARGS: &[&str] = &["-l"];

/// One unvalidated layer of settings, as read from a file or the CLI.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub ignore_patterns: Option<Vec<String>>,
    pub extensions: Option<Vec<String>>,
    pub run_on: Option<Vec<String>>,
    pub checker: Option<String>,
    pub checker_args: Option<Vec<String>>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl RawConfig {
    /// Fill every field this layer leaves unset from `lower`.
    pub fn layer_over(self, lower: RawConfig) -> RawConfig {
        RawConfig {
            ignore_patterns: self.ignore_patterns.or(lower.ignore_patterns),
            extensions: self.extensions.or(lower.extensions),
            run_on: self.run_on.or(lower.run_on),
            checker: self.checker.or(lower.checker),
            checker_args: self.checker_args.or(lower.checker_args),
            jobs: self.jobs.or(lower.jobs),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
        }
    }
}

/// Validated, immutable run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    ignore_patterns: BTreeSet<String>,
    extensions: Vec<String>,
    run_on: Vec<PathBuf>,
    checker: String,
    checker_args: Vec<String>,
    jobs: usize,
    timeout: Option<Duration>,
}

impl Configuration {
    /// Validate a merged layer, applying defaults for anything still unset.
    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        let ignore_patterns = match raw.ignore_patterns {
            Some(patterns) => patterns,
            None => to_strings(DEFAULT_IGNORE_PATTERNS),
        };
        if ignore_patterns.iter().any(|p| p.is_empty()) {
            return Err(Error::Config(
                "ignore_patterns must not contain empty strings".to_string(),
            ));
        }

        let extensions = raw
            .extensions
            .unwrap_or_else(|| to_strings(DEFAULT_EXTENSIONS));
        if extensions.is_empty() {
            return Err(Error::Config("extensions must not be empty".to_string()));
        }
        let mut normalized = Vec::with_capacity(extensions.len());
        for ext in &extensions {
            let ext = ext.strip_prefix('.').unwrap_or(ext);
            if ext.is_empty() {
                return Err(Error::Config(
                    "extensions must not contain empty entries".to_string(),
                ));
            }
            if !normalized.iter().any(|e: &String| e == ext) {
                normalized.push(ext.to_string());
            }
        }

        let run_on = raw.run_on.unwrap_or_else(|| to_strings(DEFAULT_RUN_ON));
        if run_on.is_empty() {
            return Err(Error::Config("run_on must not be empty".to_string()));
        }
        if run_on.iter().any(|r| r.is_empty()) {
            return Err(Error::Config(
                "run_on must not contain empty paths".to_string(),
            ));
        }

        let checker = raw.checker.unwrap_or_else(|| DEFAULT_CHECKER.to_string());
        if checker.trim().is_empty() {
            return Err(Error::Config("checker must not be empty".to_string()));
        }

        let checker_args = raw
            .checker_args
            .unwrap_or_else(|| to_strings(DEFAULT_CHECKER_ARGS));
        if checker_args.is_empty() {
            return Err(Error::Config(
                "checker_args must not be empty; the checker needs its syntax-only flag"
                    .to_string(),
            ));
        }

        let jobs = raw.jobs.unwrap_or(1);
        if jobs == 0 {
            return Err(Error::Config("jobs must be at least 1".to_string()));
        }

        let timeout = match raw.timeout_secs {
            Some(0) => {
                return Err(Error::Config(
                    "timeout_secs must be at least 1".to_string(),
                ))
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(Self {
            ignore_patterns: ignore_patterns.into_iter().collect(),
            extensions: normalized,
            run_on: run_on.into_iter().map(PathBuf::from).collect(),
            checker,
            checker_args,
            jobs,
            timeout,
        })
    }

    pub fn ignore_patterns(&self) -> &BTreeSet<String> {
        &self.ignore_patterns
    }

    /// File suffixes without a leading dot, matched case-sensitively.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn run_on(&self) -> &[PathBuf] {
        &self.run_on
    }

    pub fn checker(&self) -> &str {
        &self.checker
    }

    pub fn checker_args(&self) -> &[String] {
        &self.checker_args
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extensions: to_strings(DEFAULT_EXTENSIONS),
            run_on: DEFAULT_RUN_ON.iter().map(|r| PathBuf::from(*r)).collect(),
            checker: DEFAULT_CHECKER.to_string(),
            checker_args: to_strings(DEFAULT_CHECKER_ARGS),
            jobs: 1,
            timeout: None,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Walk up from `start` looking for a config file.
///
/// Stops at the first directory holding the file or a `.git` entry.
pub fn discover_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            return None;
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Parse a config file into a raw layer.
pub fn load_file(path: &Path) -> Result<RawConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    toml::from_str(&content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the file layer: the explicit path if given, else a discovered file.
pub fn load_file_layer(explicit: Option<&Path>, start: &Path) -> Result<RawConfig> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return load_file(path);
    }
    match discover_config_file(start) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading discovered config file");
            load_file(&path)
        }
        None => {
            tracing::debug!("no {CONFIG_FILE_NAME} found; using defaults");
            Ok(RawConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawConfig {
        RawConfig::default()
    }

    // --- defaults ---

    #[test]
    fn empty_layer_yields_defaults() {
        let config = Configuration::from_raw(raw()).unwrap();
        assert_eq!(config, Configuration::default());
        assert_eq!(config.extensions(), ["php", "inc", "install", "module"]);
        assert_eq!(config.run_on(), [PathBuf::from(".")]);
        assert!(config.ignore_patterns().contains("modules/contrib"));
        assert_eq!(config.checker(), "php");
        assert_eq!(config.checker_args(), ["-l"]);
        assert_eq!(config.jobs(), 1);
        assert!(config.timeout().is_none());
    }

    // --- validation ---

    #[test]
    fn empty_extensions_rejected() {
        let err = Configuration::from_raw(RawConfig {
            extensions: Some(vec![]),
            ..raw()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn empty_checker_args_rejected() {
        let err = Configuration::from_raw(RawConfig {
            checker_args: Some(vec![]),
            ..raw()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("checker_args"));
    }

    #[test]
    fn empty_run_on_rejected() {
        let err = Configuration::from_raw(RawConfig {
            run_on: Some(vec![]),
            ..raw()
        })
        .unwrap_err();
        assert!(err.to_string().contains("run_on"));
    }

    #[test]
    fn empty_ignore_list_is_allowed() {
        let config = Configuration::from_raw(RawConfig {
            ignore_patterns: Some(vec![]),
            ..raw()
        })
        .unwrap();
        assert!(config.ignore_patterns().is_empty());
    }

    #[test]
    fn empty_ignore_pattern_rejected() {
        assert!(Configuration::from_raw(RawConfig {
            ignore_patterns: Some(vec![String::new()]),
            ..raw()
        })
        .is_err());
    }

    #[test]
    fn zero_jobs_and_zero_timeout_rejected() {
        assert!(Configuration::from_raw(RawConfig {
            jobs: Some(0),
            ..raw()
        })
        .is_err());
        assert!(Configuration::from_raw(RawConfig {
            timeout_secs: Some(0),
            ..raw()
        })
        .is_err());
    }

    #[test]
    fn extensions_strip_leading_dot_and_dedupe() {
        let config = Configuration::from_raw(RawConfig {
            extensions: Some(vec![".php".into(), "php".into(), "inc".into()]),
            ..raw()
        })
        .unwrap();
        assert_eq!(config.extensions(), ["php", "inc"]);
    }

    #[test]
    fn lone_dot_extension_rejected() {
        assert!(Configuration::from_raw(RawConfig {
            extensions: Some(vec![".".into()]),
            ..raw()
        })
        .is_err());
    }

    #[test]
    fn duplicate_ignore_patterns_collapse() {
        let config = Configuration::from_raw(RawConfig {
            ignore_patterns: Some(vec!["bad.php".into(), "bad.php".into()]),
            ..raw()
        })
        .unwrap();
        assert_eq!(config.ignore_patterns().len(), 1);
    }

    // --- layering ---

    #[test]
    fn higher_layer_replaces_lists() {
        let cli = RawConfig {
            extensions: Some(vec!["inc".into()]),
            ..raw()
        };
        let file = RawConfig {
            extensions: Some(vec!["php".into()]),
            checker: Some("php8.2".into()),
            ..raw()
        };
        let config = Configuration::from_raw(cli.layer_over(file)).unwrap();
        assert_eq!(config.extensions(), ["inc"]);
        assert_eq!(config.checker(), "php8.2");
    }

    // --- file loading ---

    #[test]
    fn load_file_parses_all_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"
ignore_patterns = ["/vendor/"]
extensions = ["php"]
run_on = ["web/modules/custom"]
checker = "/usr/bin/php"
checker_args = ["-n", "-l"]
jobs = 4
timeout_secs = 60
"#,
        )
        .unwrap();
        let config = Configuration::from_raw(load_file(&path).unwrap()).unwrap();
        assert_eq!(config.run_on(), [PathBuf::from("web/modules/custom")]);
        assert_eq!(config.checker_args(), ["-n", "-l"]);
        assert_eq!(config.jobs(), 4);
        assert_eq!(config.timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "extensions = \"php\"\n").unwrap();
        assert!(matches!(
            load_file(&path).unwrap_err(),
            Error::ConfigParse { .. }
        ));
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "ignore = [\"x\"]\n").unwrap();
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn discovery_walks_up_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(CONFIG_FILE_NAME), "jobs = 2\n").unwrap();
        let nested = root.join("a/b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(
            discover_config_file(&nested),
            Some(root.join(CONFIG_FILE_NAME))
        );
    }

    #[test]
    fn discovery_stops_at_git_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(CONFIG_FILE_NAME), "jobs = 2\n").unwrap();
        let repo = root.join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();
        assert_eq!(discover_config_file(&repo), None);
    }

    #[test]
    fn explicit_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_file_layer(Some(missing.as_path()), dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
