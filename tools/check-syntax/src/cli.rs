//! Command-line arguments via `clap`.

use crate::config::RawConfig;
use crate::reporter::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "check-syntax",
    version,
    about = "Run an interpreter's syntax-only check over a set of source files",
    long_about = "Check every selected file with `<checker> -l <file>` and report the ones that fail.\n\n\
                  Without FILES, --stdin or --staged, the configured roots are scanned.\n\
                  Configuration precedence: CLI > check-syntax.toml > defaults.",
    after_help = "Examples:\n  check-syntax\n  check-syntax --run-on web/modules/custom --extension php --extension module\n  check-syntax --staged --jobs 4\n  git diff --name-only | check-syntax --stdin"
)]
pub struct Cli {
    /// Explicit files to check, used as given
    #[arg(conflicts_with_all = ["stdin", "staged"])]
    pub files: Vec<PathBuf>,

    /// Read the explicit file list from stdin, one path per line
    #[arg(long, conflicts_with = "staged")]
    pub stdin: bool,

    /// Check the files staged in git
    #[arg(long)]
    pub staged: bool,

    /// Root to scan (repeatable)
    #[arg(long = "run-on", value_name = "PATH")]
    pub run_on: Vec<String>,

    /// File extension to select, without the dot (repeatable)
    #[arg(long = "extension", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Path fragment that excludes a file (repeatable)
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Syntax checker program
    #[arg(long, value_name = "PROGRAM")]
    pub checker: Option<String>,

    /// Number of files checked concurrently
    #[arg(long, short = 'j', value_name = "N")]
    pub jobs: Option<usize>,

    /// Abort the batch after this many seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Config file (default: discovered check-syntax.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// The CLI's configuration layer; empty repeatable lists leave the
    /// lower layers in effect.
    pub fn overrides(&self) -> RawConfig {
        RawConfig {
            ignore_patterns: non_empty(&self.ignore_patterns),
            extensions: non_empty(&self.extensions),
            run_on: non_empty(&self.run_on),
            checker: self.checker.clone(),
            checker_args: None,
            jobs: self.jobs,
            timeout_secs: self.timeout_secs,
        }
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}
