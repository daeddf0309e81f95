use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the compile-execute pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable compiler could be resolved. Fatal at startup.
    #[error("Compiler not found. {configured}")]
    ToolchainNotFound { configured: String },
    /// A requested source file could not be read.
    #[error("File open error, {}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A child process (compiler, substitution command or compiled program)
    /// could not be started.
    #[error("cannot start `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
    #[error("command substitution still pending after {0} expansions")]
    SubstitutionLimit(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
