//! The syntax-check task: select files, run the checker on each, aggregate.

use crate::config::Configuration;
use crate::context::FileSelection;
use crate::error::{Error, Result};
use crate::runner::{CommandCall, CommandRunner};
use crate::walker;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

static LINE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bon line (\d+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Skipped,
    Passed,
    Failed,
    Aborted,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Skipped | RunStatus::Passed => 0,
            RunStatus::Failed => 1,
            RunStatus::Aborted => 130,
        }
    }
}

/// Result of one checker invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub path: PathBuf,
    pub succeeded: bool,
    /// Empty when the file passed.
    pub diagnostic: String,
    /// Line reported by the checker, when it names one.
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub status: RunStatus,
    /// Failing diagnostics in selection order, one per line break.
    pub report: String,
    pub files: usize,
    pub outcomes: Vec<CheckOutcome>,
    pub elapsed_ms: u64,
}

impl RunResult {
    fn new(status: RunStatus, files: usize, outcomes: Vec<CheckOutcome>, started: Instant) -> Self {
        let report = outcomes
            .iter()
            .filter(|o| !o.succeeded)
            .map(|o| o.diagnostic.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            status,
            report,
            files,
            outcomes,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }
}

pub struct SyntaxCheckRunner<'a, R: CommandRunner> {
    config: &'a Configuration,
    runner: R,
}

impl<'a, R: CommandRunner> SyntaxCheckRunner<'a, R> {
    pub fn new(config: &'a Configuration, runner: R) -> Self {
        Self { config, runner }
    }

    /// Run the batch over `selection`.
    ///
    /// Syntax failures land in the result; a checker that cannot be started
    /// or an unreadable scan root is returned as an error.
    pub fn run(&self, selection: FileSelection) -> Result<RunResult> {
        let started = Instant::now();
        let files = match selection {
            FileSelection::Explicit(paths) => paths,
            FileSelection::Scan(request) => walker::collect_files(&request)?,
        };

        if files.is_empty() {
            tracing::info!("no files to check; skipping");
            return Ok(RunResult::new(RunStatus::Skipped, 0, Vec::new(), started));
        }

        tracing::info!(
            files = files.len(),
            jobs = self.config.jobs(),
            checker = self.config.checker(),
            "checking syntax"
        );

        let (outcomes, interrupted) = if self.config.jobs() > 1 {
            self.check_parallel(&files)?
        } else {
            self.check_sequential(&files)?
        };

        let status = if interrupted {
            tracing::warn!(completed = outcomes.len(), "run interrupted");
            RunStatus::Aborted
        } else if outcomes.iter().any(|o| !o.succeeded) {
            RunStatus::Failed
        } else {
            RunStatus::Passed
        };
        let result = RunResult::new(status, files.len(), outcomes, started);
        tracing::info!(status = ?result.status, elapsed_ms = result.elapsed_ms, "finished");
        Ok(result)
    }

    /// Invoke the checker on a single file.
    pub fn check_one(&self, path: &Path) -> Result<CheckOutcome> {
        let mut args = self.config.checker_args().to_vec();
        args.push(path.to_string_lossy().into_owned());
        let result = self
            .runner
            .run(&CommandCall::new(self.config.checker(), args))?;

        if result.success() {
            return Ok(CheckOutcome {
                path: path.to_path_buf(),
                succeeded: true,
                diagnostic: String::new(),
                line: None,
            });
        }

        tracing::debug!(path = %path.display(), status = result.status, "syntax check failed");
        Ok(CheckOutcome {
            path: path.to_path_buf(),
            succeeded: false,
            diagnostic: format_diagnostic(path, result.status, &result.output),
            line: line_number(&result.output),
        })
    }

    fn check_sequential(&self, files: &[PathBuf]) -> Result<(Vec<CheckOutcome>, bool)> {
        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            match self.check_one(file) {
                Ok(outcome) => outcomes.push(outcome),
                Err(Error::Interrupted) => return Ok((outcomes, true)),
                Err(err) => return Err(err),
            }
        }
        Ok((outcomes, false))
    }

    /// Checks on a pool of exactly `jobs` threads. The indexed collect keeps
    /// selection order, so the report matches a sequential run.
    fn check_parallel(&self, files: &[PathBuf]) -> Result<(Vec<CheckOutcome>, bool)> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs())
            .build()
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        let collected: Result<Vec<CheckOutcome>> =
            pool.install(|| files.par_iter().map(|file| self.check_one(file)).collect());

        match collected {
            Ok(outcomes) => Ok((outcomes, false)),
            Err(Error::Interrupted) => Ok((Vec::new(), true)),
            Err(err) => Err(err),
        }
    }
}

/// `<path>:` followed by the checker's combined output.
pub fn format_diagnostic(path: &Path, status: i32, output: &str) -> String {
    let output = output.trim_end();
    if output.is_empty() {
        format!("{}: checker exited with status {status}", path.display())
    } else {
        format!("{}:\n{output}", path.display())
    }
}

pub fn line_number(output: &str) -> Option<u32> {
    LINE_NUMBER
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
