//! Orchestration-level errors.

use aspen_access::AccessError;
use aspen_session::SessionError;
use aspen_store::StoreError;
use thiserror::Error;

/// Failures surfaced by orchestrator operations.
///
/// Each failure is local to the operation that produced it; cached profile
/// state and any tracked transaction are left as they were.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The operation requires an authenticated identity.
    #[error("no authenticated identity")]
    NotAuthenticated,

    /// Updating requires a profile record that already exists.
    #[error("no profile exists for the authenticated account")]
    ProfileMissing,

    /// A profile read completed after the identity it was issued for was
    /// replaced; its result was discarded.
    #[error("identity changed while the profile read was in flight")]
    IdentityChanged,

    /// The node rejected the write before returning a transaction id.
    #[error("transaction submission failed: {0}")]
    Submission(#[source] AccessError),

    #[error("session operation failed: {0}")]
    Session(#[source] SessionError),

    #[error("profile read failed: {0}")]
    Store(#[source] StoreError),
}
