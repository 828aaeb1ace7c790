use thiserror::Error;

use crate::session::Status;

/// Everything that can go wrong inside the engine and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// The resolved passage was empty or whitespace only.
    #[error("test text is empty")]
    EmptyText,

    /// The test configuration cannot start a session.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation was attempted from the wrong session status.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: Status, actual: Status },

    /// A payload or user record failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("email already registered")]
    DuplicateEmail,

    /// No result store could be opened.
    #[error("result store unavailable")]
    StoreUnavailable,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
