use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_MIN: Duration = Duration::from_millis(1);
const POLL_MAX: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCall {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl CommandCall {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current_dir: None,
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        let mut parts = Vec::with_capacity(1 + self.args.len());
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts
    }
}

/// Exit status and combined stdout+stderr of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub status: i32,
    pub output: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Shared cancellation flag with an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel automatically once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

pub trait CommandRunner: Sync {
    /// Run to completion. Spawn failures surface as `Error::CheckerUnavailable`,
    /// cancellation as `Error::Interrupted`.
    fn run(&self, call: &CommandCall) -> Result<CommandResult>;
}

/// Spawns real processes, killing them when the token is cancelled.
#[derive(Debug, Default)]
pub struct RealCommandRunner {
    cancel: CancelToken,
}

impl RealCommandRunner {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }
}

impl CommandRunner for RealCommandRunner {
    fn run(&self, call: &CommandCall) -> Result<CommandResult> {
        if self.cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }

        // Output goes to files rather than pipes so a chatty child never
        // blocks while we poll for exit.
        let mut stdout_log = tempfile::tempfile()?;
        let mut stderr_log = tempfile::tempfile()?;

        let mut process = Command::new(&call.program);
        process
            .args(&call.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_log.try_clone()?))
            .stderr(Stdio::from(stderr_log.try_clone()?));
        if let Some(current_dir) = call.current_dir.as_deref() {
            process.current_dir(current_dir);
        }

        let mut child = process.spawn().map_err(|source| Error::CheckerUnavailable {
            program: call.program.clone(),
            source,
        })?;
        tracing::debug!(pid = child.id(), command = ?call.to_vec(), "spawned");

        let status = wait_or_cancel(&mut child, &self.cancel)?;

        let mut output = read_all(&mut stdout_log)?;
        output.push_str(&read_all(&mut stderr_log)?);
        Ok(CommandResult { status, output })
    }
}

fn wait_or_cancel(child: &mut Child, cancel: &CancelToken) -> Result<i32> {
    let mut pause = POLL_MIN;
    loop {
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Interrupted);
        }

        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code().unwrap_or(1)),
            Ok(None) => {
                thread::sleep(pause);
                pause = (pause * 2).min(POLL_MAX);
            }
            Err(error) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Io(error));
            }
        }
    }
}

fn read_all(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
