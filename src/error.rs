//! Error types shared by every stage of a run.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for library operations.
pub type KylieResult<T> = Result<T, KylieError>;

/// Coarse classification of a [`KylieError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Validation,
    Config,
    Io,
    ExternalService,
}

/// Which cardinality bound a command file broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardinalityViolation {
    Missing,
    TooFew { found: usize, min: usize },
    TooMany { found: usize, max: usize },
}

impl fmt::Display for CardinalityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing command"),
            Self::TooFew { found, min } => write!(f, "too few commands ({found} < {min})"),
            Self::TooMany { found, max } => write!(f, "too many commands ({found} > {max})"),
        }
    }
}

#[derive(Error, Debug)]
pub enum KylieError {
    /// Malformed command-file grammar
    #[error("syntax error in {origin}{}: {message}", in_command(.command))]
    Syntax {
        origin: String,
        command: Option<String>,
        message: String,
    },

    /// Command count outside the allowed range
    #[error("validation error in {origin}: {violation} `{command}`")]
    Validation {
        origin: String,
        command: String,
        violation: CardinalityViolation,
    },

    /// Missing or unusable run configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// File open/read/write failure
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Binary record framing or layout is wrong
    #[error("corrupt record in {}: {message}", .path.display())]
    CorruptRecord { path: PathBuf, message: String },

    /// Failure reported by the intensity service
    #[error("intensity service error: {0}")]
    Service(String),
}

fn in_command(command: &Option<String>) -> String {
    match command {
        Some(name) => format!(" (command `{name}`)"),
        None => String::new(),
    }
}

impl KylieError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax { .. } => ErrorKind::Syntax,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Config(_) => ErrorKind::Config,
            Self::Io { .. } | Self::CorruptRecord { .. } => ErrorKind::Io,
            Self::Service(_) => ErrorKind::ExternalService,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
