use thiserror::Error;

/// Coarse classification of a [`CoreError`], for callers that map failures
/// onto their own surface (status codes, exit codes) without matching text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Server,
    Unavailable,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Bad input. Never retried.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Repository or storage failure, reported opaquely.
    #[error("{0}")]
    Server(String),

    /// The ranking store is down or did not answer within its deadline.
    #[error("{0}")]
    Unavailable(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }

    pub fn server(msg: impl Into<String>) -> Self {
        CoreError::Server(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        CoreError::Unavailable(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Server(_) => ErrorKind::Server,
            CoreError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
