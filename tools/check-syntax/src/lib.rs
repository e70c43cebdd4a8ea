pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod reporter;
pub mod runner;
pub mod task;
pub mod walker;

pub use context::FileSelection;
pub use error::{Error, Result};
pub use runner::{CancelToken, CommandCall, CommandResult, CommandRunner, RealCommandRunner};
pub use task::{CheckOutcome, RunResult, RunStatus, SyntaxCheckRunner};
