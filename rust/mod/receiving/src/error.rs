use mycoerp_core::ServiceError;
use thiserror::Error;

/// Failure of the batch commit.
///
/// Only step 1 (batch creation) can fail a commit. A failed status update
/// on the delivery order is reported through
/// [`Reconciliation::Stale`](crate::Reconciliation::Stale) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommitError {
    /// The batch could not be encoded for the store.
    #[error("batch encoding failed: {0}")]
    Encode(String),

    /// The inventory store rejected or failed the insert.
    #[error("batch creation failed: {0}")]
    BatchCreate(#[source] ServiceError),
}

impl CommitError {
    /// Stable code, shared with [`ServiceError::error_code`].
    pub fn error_code(&self) -> &'static str {
        match self {
            CommitError::Encode(_) => mycoerp_core::error::error_code::INTERNAL,
            CommitError::BatchCreate(e) => e.error_code(),
        }
    }
}
