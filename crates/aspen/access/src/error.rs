//! Error taxonomy for accessor and wallet calls.

use thiserror::Error;

/// Result alias for access-layer operations.
pub type AccessResult<T> = Result<T, AccessError>;

/// Failures surfaced by the remote collaborators.
///
/// Every failure is local to the call that produced it; nothing here is
/// fatal to the client process.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The node rejected a write before returning a transaction id.
    #[error("transaction submission rejected: {0}")]
    Submission(String),

    /// A read-only script execution failed.
    #[error("script execution failed: {0}")]
    Query(String),

    /// The wallet provider could not service the request.
    #[error("wallet provider error: {0}")]
    Provider(String),

    /// Status subscription for an id the node does not know.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    /// Shared accessor state became unusable.
    #[error("accessor state lock poisoned")]
    LockPoisoned,
}
