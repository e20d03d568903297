use serde::{Deserialize, Serialize};

/// Stable, machine-readable error kind carried by every error regardless of which
/// layer (store adapter, pipeline, orchestrator) raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidInput,
    Unauthorized,
    NotFound,
    Conflict,
    Backend,
    EmbeddingError,
    ChatError,
    Timeout,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Backend => "BACKEND",
            ErrorKind::EmbeddingError => "EMBEDDING_ERROR",
            ErrorKind::ChatError => "CHAT_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

/// Implemented by every per-layer error enum so callers at any boundary can ask
/// "what does this map to" without matching on variants.
pub trait HasErrorKind: std::error::Error {
    fn error_kind(&self) -> ErrorKind;
}

/// The crate-wide error type returned at API boundaries (the `sdk` facade). Every
/// layer-specific error type converts into this, collapsing onto one taxonomy.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Backend, message)
    }
}

/// HTTP status this kind maps to, per spec.md §7: 4xx for input/validation, 404 for
/// not-found, 409 for conflict, 5xx for backend/timeout. HTTP routing is out of
/// scope for this crate; this leaves that (out-of-scope) layer nothing to decide.
pub fn http_status(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::InvalidInput => 400,
        ErrorKind::Unauthorized => 401,
        ErrorKind::NotFound => 404,
        ErrorKind::Conflict => 409,
        ErrorKind::Backend | ErrorKind::EmbeddingError | ErrorKind::ChatError => 502,
        ErrorKind::Timeout => 504,
        ErrorKind::Cancelled => 499,
    }
}
