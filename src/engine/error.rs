use thiserror::Error;

use crate::persist::PersistError;

/// Failure the caller may retry as a whole.
#[derive(Debug, Error)]
pub enum TransientFailure {
    #[error("storage unavailable: {0}")]
    Storage(#[from] PersistError),
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// Catalogue, directory, and ledger disagree; expected to self-heal on a later refresh.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
    #[error("blocking worker failed: {0}")]
    Worker(String),
}

/// Outcome taxonomy exposed to callers of the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Token absent from the current flag snapshot.
    #[error("invalid flag")]
    InvalidToken,
    /// The team already has a solve for this task.
    #[error("already solved task")]
    AlreadySolved,
    #[error(transparent)]
    TransientFailure(#[from] TransientFailure),
}

impl EngineError {
    /// Only transient failures are worth resubmitting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFailure(_))
    }
}

impl From<PersistError> for EngineError {
    fn from(value: PersistError) -> Self {
        Self::TransientFailure(TransientFailure::Storage(value))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
