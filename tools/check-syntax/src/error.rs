use std::io;
use std::path::PathBuf;

/// Errors that stop a syntax-check run before a result can be produced.
///
/// A file failing the syntax check is not an error; it is recorded in the
/// run result instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: cannot parse {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Syntax checker `{program}` could not be started: {source}")]
    CheckerUnavailable {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Scan root does not exist: {}", root.display())]
    MissingRoot { root: PathBuf },

    #[error("Cannot traverse {}: {source}", root.display())]
    Traversal {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("File context error: {0}")]
    FileContext(String),

    #[error("Run interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::CheckerUnavailable { .. } => 3,
            Error::Interrupted => 130,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
