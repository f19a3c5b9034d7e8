use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Entry not found")]
    NotFound,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl LogError {
    /// True for the "subject is absent" outcome of a query.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LogError::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, LogError>;

impl<T> From<std::sync::PoisonError<T>> for LogError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for LogError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
