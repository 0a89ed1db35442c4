//! In-process wallet provider and static discovery for tests/dev.

use crate::error::{AccessError, AccessResult};
use crate::traits::{WalletDiscovery, WalletProvider};
use aspen_types::{Address, AuthService, Identity};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

/// Account used by the developer wallet unless one is provided.
const DEV_ACCOUNT: &str = "0xf8d6e0586b0a20c8";

/// Channel capacity for identity fan-out.
const IDENTITY_CHANNEL_CAPACITY: usize = 64;

/// Shared slot naming the account that signs write submissions.
///
/// The wallet writes it on login/logout; the in-memory accessor reads it to
/// scope writes, the way a real node resolves the transaction's signer.
#[derive(Clone, Default)]
pub struct SignerSlot {
    current: Arc<RwLock<Option<Address>>>,
}

impl SignerSlot {
    pub fn set(&self, address: Option<Address>) {
        if let Ok(mut guard) = self.current.write() {
            *guard = address;
        }
    }

    pub fn get(&self) -> Option<Address> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }
}

/// Developer wallet that fulfils authentication immediately.
///
/// Mirrors the local dev-wallet service a developer build registers instead
/// of a real discovery flow.
#[derive(Clone)]
pub struct DevWallet {
    inner: Arc<DevWalletInner>,
}

struct DevWalletInner {
    address: Address,
    signer: SignerSlot,
    current: RwLock<Option<Identity>>,
    events: broadcast::Sender<Option<Identity>>,
}

impl DevWallet {
    pub fn new(signer: SignerSlot) -> Self {
        Self::with_address(signer, Address::new(DEV_ACCOUNT))
    }

    pub fn with_address(signer: SignerSlot, address: Address) -> Self {
        let (events, _) = broadcast::channel(IDENTITY_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(DevWalletInner {
                address,
                signer,
                current: RwLock::new(None),
                events,
            }),
        }
    }

    /// The discoverable descriptor for this wallet.
    pub fn service() -> AuthService {
        AuthService {
            uid: "authn#dev".to_string(),
            display_name: "Aspen Dev Wallet".to_string(),
            icon: "http://localhost:8701/icon.svg".to_string(),
            endpoint: "http://localhost:8701/authn".to_string(),
            website: String::new(),
        }
    }

    fn emit(&self, identity: Option<Identity>) -> AccessResult<()> {
        {
            let mut current = self
                .inner
                .current
                .write()
                .map_err(|_| AccessError::Provider("wallet state lock poisoned".to_string()))?;
            *current = identity.clone();
        }
        self.inner
            .signer
            .set(identity.as_ref().map(|i| i.address.clone()));
        // No subscribers is fine.
        let _ = self.inner.events.send(identity);
        Ok(())
    }
}

#[async_trait]
impl WalletProvider for DevWallet {
    async fn subscribe(&self) -> mpsc::Receiver<Option<Identity>> {
        let (tx, rx) = mpsc::channel(IDENTITY_CHANNEL_CAPACITY);
        let mut events = self.inner.events.subscribe();
        let current = self
            .inner
            .current
            .read()
            .ok()
            .and_then(|guard| guard.clone());

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

    async fn authenticate(&self, service: &AuthService) -> AccessResult<()> {
        let identity = Identity {
            address: self.inner.address.clone(),
            authenticated: true,
            services: vec![service.clone()],
        };
        info!(account = %identity.address, service = %service.uid, "dev wallet authenticated");
        self.emit(Some(identity))
    }

    async fn unauthenticate(&self) -> AccessResult<()> {
        debug!("dev wallet session terminated");
        self.emit(None)
    }
}

/// Wallet discovery serving a fixed service list.
pub struct StaticDiscovery {
    services: watch::Sender<Vec<AuthService>>,
}

impl StaticDiscovery {
    pub fn new(services: Vec<AuthService>) -> Self {
        let (tx, _) = watch::channel(services);
        Self { services: tx }
    }

    /// Replace the announced list for existing and future subscribers.
    pub fn announce(&self, services: Vec<AuthService>) {
        let _ = self.services.send(services);
    }
}

impl WalletDiscovery for StaticDiscovery {
    fn subscribe(&self) -> watch::Receiver<Vec<AuthService>> {
        self.services.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn subscribe_sees_current_then_login_then_logout() {
        let signer = SignerSlot::default();
        let wallet = DevWallet::new(signer.clone());
        let mut rx = wallet.subscribe().await;

        let initial = rx.recv().await.unwrap();
        assert!(initial.is_none());

        wallet.authenticate(&DevWallet::service()).await.unwrap();
        let identity = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(identity.authenticated);
        assert_eq!(signer.get(), Some(identity.address.clone()));
        assert_eq!(identity.services.len(), 1);

        wallet.unauthenticate().await.unwrap();
        let cleared = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.is_none());
        assert!(signer.get().is_none());
    }

    #[tokio::test]
    async fn late_subscriber_sees_the_live_session() {
        let wallet = DevWallet::new(SignerSlot::default());
        wallet.authenticate(&DevWallet::service()).await.unwrap();

        let mut rx = wallet.subscribe().await;
        let current = rx.recv().await.unwrap();
        assert!(current.is_some());
    }

    #[tokio::test]
    async fn discovery_delivers_current_list_and_announcements() {
        let discovery = StaticDiscovery::new(vec![DevWallet::service()]);
        let mut rx = discovery.subscribe();
        assert_eq!(rx.borrow().len(), 1);

        discovery.announce(vec![]);
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_empty());
    }
}
