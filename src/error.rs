use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, PayoutError>;

/// Errors surfaced by the payout engine.
///
/// Store faults are wrapped unmodified; the engine never retries internally
/// and never downgrades an error into a silent no-op.
#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("no eligible sessions for mentor {mentor} between {start} and {end}")]
    NoEligibleSessions {
        mentor: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}
