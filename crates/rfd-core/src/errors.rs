/// Core error type for the dispatch layer.
///
/// Adapter crates should map their specific errors into this type so guards
/// can decide per [`ErrorKind`] whether a failure is benign.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("external error: {0}")]
    External(String),
}

/// Discriminant of [`Error`], used to select which failures a guard may swallow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Io,
    Json,
    InvalidCommand,
    External,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
            Error::InvalidCommand(_) => ErrorKind::InvalidCommand,
            Error::External(_) => ErrorKind::External,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
