//! Aspen Session - the currently authenticated identity and its stream.
//!
//! The session owns a snapshot of the live identity (or none) and fans every
//! wallet-provider emission out to subscribers in order, starting with the
//! current value. It never coalesces: if the provider emits the same value
//! twice, subscribers see it twice, so downstream code must be robust to
//! duplicates.
//!
//! Logging in only starts the handshake; the result is observed through the
//! stream. A handshake that silently dies leaves the stream unchanged —
//! there is no explicit auth-error channel, and the session does not invent
//! one.

#![deny(unsafe_code)]

use aspen_access::{AccessError, WalletProvider};
use aspen_types::{AuthService, Identity};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Channel capacity for the session's identity fan-out.
const SESSION_CHANNEL_CAPACITY: usize = 64;

/// Session-level errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication request failed: {0}")]
    Authenticate(#[source] AccessError),

    #[error("logout request failed: {0}")]
    Unauthenticate(#[source] AccessError),
}

/// The identity session.
///
/// Holds the latest identity emitted by the wallet provider and rebroadcasts
/// every emission. Dropping the session detaches it from the provider.
pub struct IdentitySession {
    provider: Arc<dyn WalletProvider>,
    shared: Arc<SessionShared>,
    forwarder: JoinHandle<()>,
}

struct SessionShared {
    current: RwLock<Option<Identity>>,
    events: broadcast::Sender<Option<Identity>>,
}

impl IdentitySession {
    /// Attach to a wallet provider and start forwarding its identity stream.
    pub async fn attach(provider: Arc<dyn WalletProvider>) -> Self {
        let (events, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        let shared = Arc::new(SessionShared {
            current: RwLock::new(None),
            events,
        });

        let mut stream = provider.subscribe().await;
        let task_shared = Arc::clone(&shared);
        let forwarder = tokio::spawn(async move {
            while let Some(identity) = stream.recv().await {
                match task_shared.current.write() {
                    Ok(mut guard) => *guard = identity.clone(),
                    Err(_) => {
                        warn!("session snapshot lock poisoned, dropping update");
                        continue;
                    }
                }
                match &identity {
                    Some(id) => debug!(account = %id.address, authenticated = id.authenticated, "identity update"),
                    None => debug!("identity cleared"),
                }
                // No subscribers is fine.
                let _ = task_shared.events.send(identity);
            }
            debug!("wallet provider stream closed");
        });

        Self {
            provider,
            shared,
            forwarder,
        }
    }

    /// Subscribe to the identity stream.
    ///
    /// The receiver observes the current value first, then every update in
    /// provider emission order.
    pub async fn subscribe(&self) -> mpsc::Receiver<Option<Identity>> {
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let mut events = self.shared.events.subscribe();
        let current = self.current();

        let _ = tx.send(current).await;
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(identity) => {
                        if tx.send(identity).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lagged = n, "identity subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        rx
    }

    /// Snapshot of the live identity.
    pub fn current(&self) -> Option<Identity> {
        self.shared.current.read().ok().and_then(|guard| guard.clone())
    }

    /// Whether an authenticated identity is live right now.
    pub fn authenticated(&self) -> bool {
        self.current().map(|id| id.authenticated).unwrap_or(false)
    }

    /// Begin authentication against the chosen service.
    ///
    /// Returns once the request is dispatched. Completion — or silence — is
    /// observed via [`IdentitySession::subscribe`].
    pub async fn log_in(&self, service: &AuthService) -> Result<(), SessionError> {
        self.provider
            .authenticate(service)
            .await
            .map_err(SessionError::Authenticate)
    }

    /// Request termination of the session.
    ///
    /// On completion the stream resolves to `None`. Clearing profile state
    /// scoped to the outgoing identity is the orchestrator's job, not ours.
    pub async fn log_out(&self) -> Result<(), SessionError> {
        self.provider
            .unauthenticate()
            .await
            .map_err(SessionError::Unauthenticate)
    }
}

impl Drop for IdentitySession {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}
