//! Abstract contracts for the remote collaborators.

use crate::error::AccessResult;
use crate::model::{ScriptValue, TxStatusUpdate};
use aspen_types::{AuthService, Identity, TxId};
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

/// The external identity/wallet service.
///
/// Authentication outcomes are observed only through the subscription
/// stream; `authenticate` returning `Ok` means the handshake was started,
/// not that it succeeded. A session that never materializes leaves the
/// stream unchanged — there is no explicit auth-error channel.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Subscribe to identity updates. Delivers at least the current value,
    /// then every subsequent update in emission order, without coalescing.
    async fn subscribe(&self) -> mpsc::Receiver<Option<Identity>>;

    /// Begin authentication against the chosen service.
    async fn authenticate(&self, service: &AuthService) -> AccessResult<()>;

    /// Request termination of the current session. The stream resolves to
    /// `None` once the provider has let go of the session.
    async fn unauthenticate(&self) -> AccessResult<()>;
}

/// Read-only script execution against the ledger.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Execute a read script. `None` means the script resolved to no value
    /// (e.g. no record exists for the queried key). Side-effect-free on the
    /// ledger.
    async fn query(
        &self,
        script: &str,
        args: Vec<ScriptValue>,
    ) -> AccessResult<Option<serde_json::Value>>;
}

/// Write-transaction submission.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Submit a write transaction scoped to the authenticated account.
    /// Returns as soon as the node hands back an id; settlement is tracked
    /// separately through [`TransactionStatusSource`].
    async fn mutate(
        &self,
        script: &str,
        args: Vec<ScriptValue>,
        compute_limit: u64,
    ) -> AccessResult<TxId>;
}

/// Asynchronous status pushes for a submitted transaction.
#[async_trait]
pub trait TransactionStatusSource: Send + Sync {
    /// Subscribe to status pushes for one transaction. The channel yields
    /// zero or more updates and closes after a terminal status (or never,
    /// if the network stalls — callers own that liveness gap).
    async fn subscribe_status(&self, id: &TxId) -> AccessResult<mpsc::Receiver<TxStatusUpdate>>;
}

/// Discovery of available wallet/login methods.
pub trait WalletDiscovery: Send + Sync {
    /// Subscribe to the service list. The receiver observes the current
    /// list immediately and any later announcements.
    fn subscribe(&self) -> watch::Receiver<Vec<AuthService>>;
}
