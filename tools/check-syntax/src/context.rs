//! Where the file set comes from.
//!
//! A run either receives an explicit, already-scoped list of paths (command
//! line, stdin, or the git index) or scans the configured roots itself.

use crate::error::{Error, Result};
use crate::walker::ScanRequest;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    /// Checked exactly as given, with no further filtering.
    Explicit(Vec<PathBuf>),
    /// Full traversal of the request's roots.
    Scan(ScanRequest),
}

/// Read an explicit file list, one path per line.
pub fn read_path_list<R: BufRead>(reader: R) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| Error::FileContext(format!("cannot read file list: {e}")))?;
        let line = line.trim();
        if !line.is_empty() {
            paths.push(PathBuf::from(line));
        }
    }
    Ok(paths)
}

/// Keep staged entries that still exist and pass the scan filters.
///
/// Staged names are repository-relative; they are matched in `./<name>` form
/// so patterns anchored with a leading `/` behave as in a scan of `.`.
pub fn scope_staged_files<F>(
    toplevel: &Path,
    names: &[String],
    request: &ScanRequest,
    is_file: F,
) -> Vec<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    let mut selected = Vec::new();
    for name in names {
        let rendered = Path::new(".").join(name);
        if !request.is_selected(&rendered) {
            continue;
        }
        let path = toplevel.join(name);
        if is_file(&path) && !selected.contains(&path) {
            selected.push(path);
        }
    }
    selected
}

/// Files added, copied, modified or renamed in the git index.
pub fn staged_files(request: &ScanRequest) -> Result<Vec<PathBuf>> {
    let toplevel = git(&["rev-parse", "--show-toplevel"])?;
    let toplevel = PathBuf::from(toplevel.trim());
    let names: Vec<String> = git(&["diff", "--cached", "--name-only", "--diff-filter=ACMR"])?
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect();

    let selected = scope_staged_files(&toplevel, &names, request, Path::is_file);
    tracing::debug!(
        staged = names.len(),
        selected = selected.len(),
        "scoped staged files"
    );
    Ok(selected)
}

fn git(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::FileContext(format!("failed to run git: {e}")))?;
    if !output.status.success() {
        return Err(Error::FileContext(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
