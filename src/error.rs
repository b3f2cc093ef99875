use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("session lookup collision")]
    SessionLookupCollision,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("forbidden")]
    Forbidden,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid session token format")]
    InvalidTokenFormat,
}

pub type Result<T> = std::result::Result<T, Error>;
