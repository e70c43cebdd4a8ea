use crate::task::{RunResult, RunStatus};
use owo_colors::OwoColorize;
use owo_colors::Stream::{Stderr, Stdout};
use serde_json::Value as JsonVal;
use std::io::{self, Write};

const NAME: &str = "check-syntax";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Print the result: summary to stdout, failing diagnostics to stderr.
pub fn print_result(result: &RunResult, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&compose_json(result)?)?;
            writeln!(out, "{json}")
        }
        OutputFormat::Human => {
            write_summary(&mut out, result)?;
            if result.status == RunStatus::Failed {
                let stderr = io::stderr();
                write_report(&mut stderr.lock(), result)?;
            }
            Ok(())
        }
    }
}

/// One status line, plus the failing paths when the run failed.
pub fn write_summary<W: Write>(out: &mut W, result: &RunResult) -> io::Result<()> {
    let elapsed = format!("({:.1}s)", result.elapsed_ms as f64 / 1000.0);
    match result.status {
        RunStatus::Skipped => writeln!(
            out,
            "  {} {:<15} {}",
            "-".if_supports_color(Stdout, |s| s.dimmed()),
            NAME,
            "skipped (no files to check)".if_supports_color(Stdout, |s| s.dimmed()),
        ),
        RunStatus::Passed => writeln!(
            out,
            "  {} {:<15} {} {}",
            "\u{2713}".if_supports_color(Stdout, |s| s.green()),
            NAME,
            format!("{} file(s) clean", result.files).if_supports_color(Stdout, |s| s.green()),
            elapsed.if_supports_color(Stdout, |s| s.dimmed()),
        ),
        RunStatus::Failed => {
            let failed = result.failed().count();
            writeln!(
                out,
                "  {} {:<15} {} {}",
                "\u{2717}".if_supports_color(Stdout, |s| s.red()),
                NAME,
                format!("{failed} of {} file(s) failed", result.files)
                    .if_supports_color(Stdout, |s| s.red()),
                elapsed.if_supports_color(Stdout, |s| s.dimmed()),
            )?;
            for outcome in result.failed() {
                let location = match outcome.line {
                    Some(line) => format!("{}:{line}", outcome.path.display()),
                    None => outcome.path.display().to_string(),
                };
                writeln!(
                    out,
                    "      {}",
                    location.if_supports_color(Stdout, |s| s.dimmed())
                )?;
            }
            Ok(())
        }
        RunStatus::Aborted => writeln!(
            out,
            "  {} {:<15} {}",
            "\u{26a0}".if_supports_color(Stdout, |s| s.yellow()),
            NAME,
            format!(
                "aborted after {} of {} file(s)",
                result.outcomes.len(),
                result.files
            )
            .if_supports_color(Stdout, |s| s.yellow()),
        ),
    }
}

/// The aggregated diagnostics, preceded by a heading.
pub fn write_report<W: Write>(err: &mut W, result: &RunResult) -> io::Result<()> {
    if result.report.is_empty() {
        return Ok(());
    }
    writeln!(
        err,
        "\n{}",
        "Syntax errors:".if_supports_color(Stderr, |s| s.bold())
    )?;
    writeln!(err, "{}", result.report)
}

/// JSON document for `--output json`.
pub fn compose_json(result: &RunResult) -> serde_json::Result<JsonVal> {
    serde_json::to_value(result)
}
