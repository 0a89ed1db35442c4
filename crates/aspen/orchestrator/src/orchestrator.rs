//! The profile orchestration hub.

use crate::error::OrchestratorError;
use crate::scripts::{CREATE_PROFILE_SCRIPT, UPDATE_PROFILE_SCRIPT};
use aspen_access::{
    AccessConfig, ScriptValue, TransactionStatusSource, TransactionSubmitter,
};
use aspen_session::IdentitySession;
use aspen_store::ProfileStore;
use aspen_tracker::{TransactionTracker, TxEvent};
use aspen_types::{AuthService, Identity, Profile, ProfileDraft, TxId, TxStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tracing::{debug, info, warn};

/// Coordination hub for session, profile, and write-transaction state.
///
/// Owns the single cached profile and the single tracked transaction; all
/// mutation of either flows through here. Constructed with [`start`], which
/// also wires the automatic profile load on authentication.
///
/// [`start`]: ProfileOrchestrator::start
pub struct ProfileOrchestrator {
    session: Arc<IdentitySession>,
    store: Arc<ProfileStore>,
    submitter: Arc<dyn TransactionSubmitter>,
    statuses: Arc<dyn TransactionStatusSource>,
    compute_limit: u64,
    observed: ObservedState,
    inner: Mutex<OrchestratorInner>,
    /// Bumped on every submission; events from older submissions are stale.
    generation: AtomicU64,
    /// Handle to ourselves for the tasks we spawn; weak so that dropping
    /// the last external handle shuts them down.
    weak_self: Weak<ProfileOrchestrator>,
}

struct ObservedState {
    profile: watch::Sender<Option<Profile>>,
    profile_exists: watch::Sender<bool>,
    tx_status: watch::Sender<TxStatus>,
    tx_in_progress: watch::Sender<bool>,
    tx_id: watch::Sender<Option<TxId>>,
}

struct OrchestratorInner {
    /// Address the automatic profile load already ran for.
    auto_loaded_for: Option<aspen_types::Address>,
}

impl ProfileOrchestrator {
    /// Build the orchestrator and start watching the identity stream.
    pub async fn start(
        session: Arc<IdentitySession>,
        store: Arc<ProfileStore>,
        submitter: Arc<dyn TransactionSubmitter>,
        statuses: Arc<dyn TransactionStatusSource>,
        config: &AccessConfig,
    ) -> Arc<Self> {
        let identity_stream = session.subscribe().await;
        let orchestrator = Arc::new_cyclic(|weak| Self {
            session,
            store,
            submitter,
            statuses,
            compute_limit: config.default_compute_limit,
            observed: ObservedState {
                profile: watch::channel(None).0,
                profile_exists: watch::channel(false).0,
                tx_status: watch::channel(TxStatus::None).0,
                tx_in_progress: watch::channel(false).0,
                tx_id: watch::channel(None).0,
            },
            inner: Mutex::new(OrchestratorInner {
                auto_loaded_for: None,
            }),
            generation: AtomicU64::new(0),
            weak_self: weak.clone(),
        });

        // The stream delivers the current value first, so a session that
        // was already live is picked up immediately.
        tokio::spawn(identity_watcher(
            Arc::downgrade(&orchestrator),
            identity_stream,
        ));

        orchestrator
    }

    // ── observable state ────────────────────────────────────────────

    /// Snapshot of the authenticated identity.
    pub fn current_user(&self) -> Option<Identity> {
        self.session.current()
    }

    /// Every identity update, in emission order, current value first.
    pub async fn subscribe_identity(&self) -> mpsc::Receiver<Option<Identity>> {
        self.session.subscribe().await
    }

    /// The cached profile record, or `None` while absent.
    pub fn user_profile(&self) -> watch::Receiver<Option<Profile>> {
        self.observed.profile.subscribe()
    }

    /// Whether a profile record exists for the authenticated account.
    pub fn profile_exists(&self) -> watch::Receiver<bool> {
        self.observed.profile_exists.subscribe()
    }

    /// Status of the tracked transaction (`TxStatus::None` when idle).
    pub fn transaction_status(&self) -> watch::Receiver<TxStatus> {
        self.observed.tx_status.subscribe()
    }

    /// Whether a submission is currently being composed or settled.
    pub fn transaction_in_progress(&self) -> watch::Receiver<bool> {
        self.observed.tx_in_progress.subscribe()
    }

    /// Id of the tracked transaction, once the node handed one back.
    pub fn transaction_id(&self) -> watch::Receiver<Option<TxId>> {
        self.observed.tx_id.subscribe()
    }

    // ── commands ────────────────────────────────────────────────────

    /// Begin authentication against the chosen service.
    pub async fn log_in(&self, service: &AuthService) -> Result<(), OrchestratorError> {
        self.session
            .log_in(service)
            .await
            .map_err(OrchestratorError::Session)
    }

    /// Terminate the session and drop everything scoped to it.
    pub async fn log_out(&self) -> Result<(), OrchestratorError> {
        self.session
            .log_out()
            .await
            .map_err(OrchestratorError::Session)?;
        self.clear_profile_scope().await;
        Ok(())
    }

    /// Read the profile for the authenticated account and publish the
    /// result — unless the identity changed while the read was in flight,
    /// in which case the result is discarded.
    pub async fn load_profile(&self) -> Result<Option<Profile>, OrchestratorError> {
        let identity = self
            .session
            .current()
            .filter(|id| id.authenticated)
            .ok_or(OrchestratorError::NotAuthenticated)?;
        let address = identity.address;

        let profile = self
            .store
            .read(&address)
            .await
            .map_err(OrchestratorError::Store)?;

        let still_current = self
            .session
            .current()
            .map(|id| id.address == address)
            .unwrap_or(false);
        if !still_current {
            debug!(account = %address, "discarding profile read for a replaced identity");
            return Err(OrchestratorError::IdentityChanged);
        }

        self.observed.profile.send_replace(profile.clone());
        self.observed.profile_exists.send_replace(profile.is_some());
        Ok(profile)
    }

    /// Submit the profile-creation transaction and track it to settlement.
    ///
    /// The on-ledger logic is idempotent: creating a profile that already
    /// exists is a no-op there, not an error here. On sealing, the profile
    /// is reloaded.
    pub async fn create_profile(&self) -> Result<TxId, OrchestratorError> {
        self.require_authenticated()?;
        self.begin_submission();

        let id = match self
            .submitter
            .mutate(CREATE_PROFILE_SCRIPT, vec![], self.compute_limit)
            .await
        {
            Ok(id) => id,
            Err(error) => {
                self.observed.tx_in_progress.send_replace(false);
                return Err(OrchestratorError::Submission(error));
            }
        };

        info!(tx_id = %id, "profile creation submitted");
        self.track(id.clone()).await?;
        Ok(id)
    }

    /// Submit a full-profile update and track it to settlement.
    ///
    /// Requires an existing profile: the write targets a capability that
    /// must already be linked, and submitting it otherwise is undefined on
    /// the ledger side.
    pub async fn update_profile(&self, draft: ProfileDraft) -> Result<TxId, OrchestratorError> {
        self.require_authenticated()?;
        if !*self.observed.profile_exists.borrow() {
            return Err(OrchestratorError::ProfileMissing);
        }
        self.begin_submission();

        let args = vec![
            ScriptValue::String(draft.name),
            ScriptValue::String(draft.color),
            ScriptValue::String(draft.info),
        ];
        let id = match self
            .submitter
            .mutate(UPDATE_PROFILE_SCRIPT, args, self.compute_limit)
            .await
        {
            Ok(id) => id,
            Err(error) => {
                self.observed.tx_in_progress.send_replace(false);
                return Err(OrchestratorError::Submission(error));
            }
        };

        info!(tx_id = %id, "profile update submitted");
        self.track(id.clone()).await?;
        Ok(id)
    }

    // ── internals ───────────────────────────────────────────────────

    fn require_authenticated(&self) -> Result<Identity, OrchestratorError> {
        self.session
            .current()
            .filter(|id| id.authenticated)
            .ok_or(OrchestratorError::NotAuthenticated)
    }

    fn begin_submission(&self) {
        self.observed.tx_in_progress.send_replace(true);
        self.observed.tx_status.send_replace(TxStatus::None);
        self.observed.tx_id.send_replace(None);
    }

    /// Track a freshly submitted transaction until it settles.
    ///
    /// A new submission supersedes the previous one for the observable
    /// state: the old tracker keeps running independently, but its events
    /// stop reaching the watch channels.
    async fn track(&self, id: TxId) -> Result<(), OrchestratorError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut updates = match self.statuses.subscribe_status(&id).await {
            Ok(updates) => updates,
            Err(error) => {
                self.observed.tx_in_progress.send_replace(false);
                return Err(OrchestratorError::Submission(error));
            }
        };

        self.observed.tx_id.send_replace(Some(id.clone()));
        self.observed.tx_status.send_replace(TxStatus::Unknown);

        let mut tracker = TransactionTracker::new(id);
        let events = tracker.subscribe();

        // Pump: feed network pushes into the tracker until the channel
        // closes. The tracker enforces id matching and monotonicity.
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                tracker.apply(&update.id, update.status, update.error_message);
            }
        });

        // Listener: the single consumer of the tracker's typed events.
        tokio::spawn(tracker_listener(
            self.weak_self.clone(),
            events,
            generation,
        ));

        Ok(())
    }

    async fn on_tx_event(&self, generation: u64, event: TxEvent) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("ignoring event from a superseded submission");
            return;
        }
        match event {
            TxEvent::Status { status, .. } => {
                self.observed.tx_status.send_replace(status);
            }
            TxEvent::Sealed { id } => {
                info!(tx_id = %id, "transaction sealed, reloading profile");
                self.observed.tx_in_progress.send_replace(false);
                if let Err(error) = self.load_profile().await {
                    warn!(%error, "post-seal profile reload failed");
                }
            }
            TxEvent::Expired { id, error_message } => {
                // No automatic resubmission; the terminal status stays
                // visible for the caller to react to.
                warn!(tx_id = %id, error = ?error_message, "transaction expired");
                self.observed.tx_in_progress.send_replace(false);
            }
        }
    }

    async fn on_identity_update(&self, update: Option<Identity>) {
        match update {
            Some(identity) if identity.authenticated => {
                let address = identity.address.clone();
                let (load, switched) = {
                    let mut inner = self.inner.lock().await;
                    if inner.auto_loaded_for.as_ref() == Some(&address) {
                        (false, false)
                    } else {
                        let switched = inner.auto_loaded_for.is_some();
                        inner.auto_loaded_for = Some(address.clone());
                        (true, switched)
                    }
                };

                if switched {
                    debug!(account = %address, "identity switched, dropping previous profile scope");
                    self.reset_profile_observables();
                }
                if load {
                    info!(account = %address, "identity authenticated, loading profile");
                    if let Err(error) = self.load_profile().await {
                        warn!(%error, "automatic profile load failed");
                        let mut inner = self.inner.lock().await;
                        if inner.auto_loaded_for.as_ref() == Some(&address) {
                            inner.auto_loaded_for = None;
                        }
                    }
                }
            }
            _ => self.clear_profile_scope().await,
        }
    }

    async fn clear_profile_scope(&self) {
        self.inner.lock().await.auto_loaded_for = None;
        self.reset_profile_observables();
    }

    fn reset_profile_observables(&self) {
        self.store.clear();
        self.observed.profile.send_replace(None);
        self.observed.profile_exists.send_replace(false);
    }
}

async fn identity_watcher(
    orchestrator: Weak<ProfileOrchestrator>,
    mut stream: mpsc::Receiver<Option<Identity>>,
) {
    while let Some(update) = stream.recv().await {
        let Some(orchestrator) = orchestrator.upgrade() else {
            break;
        };
        orchestrator.on_identity_update(update).await;
    }
}

async fn tracker_listener(
    orchestrator: Weak<ProfileOrchestrator>,
    mut events: broadcast::Receiver<TxEvent>,
    generation: u64,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(lagged = n, "tracker listener lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(orchestrator) = orchestrator.upgrade() else {
            break;
        };
        orchestrator.on_tx_event(generation, event).await;
    }
}
