//! In-memory reference implementation of the accessor-node contracts.
//!
//! This adapter is deterministic and test-friendly. It holds the profile
//! table that a real ledger would, carries script source verbatim without
//! interpreting it, and dispatches writes structurally on their argument
//! shape: `[]` creates a profile, `[name, color, info]` updates one, and a
//! single-address query reads one. Each submitted transaction is walked
//! through `Pending -> Finalized -> Executed -> Sealed` on its status
//! channel once a subscriber attaches.

use crate::error::{AccessError, AccessResult};
use crate::model::{ScriptValue, TxStatusUpdate};
use crate::traits::{ScriptExecutor, TransactionStatusSource, TransactionSubmitter};
use crate::wallet::SignerSlot;
use aspen_types::{Address, Profile, ProfileDraft, TxId, TxStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Failure knobs for exercising error paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessorBehavior {
    /// Reject every `mutate` before allocating an id.
    pub reject_submissions: bool,
    /// Fail every `query`.
    pub fail_queries: bool,
    /// Expire submitted transactions instead of sealing them.
    pub expire_transactions: bool,
}

/// In-memory accessor node.
#[derive(Clone)]
pub struct InMemoryAccessor {
    inner: Arc<AccessorInner>,
}

struct AccessorInner {
    profiles: RwLock<HashMap<Address, Profile>>,
    pending: RwLock<HashMap<TxId, SubmittedTx>>,
    behavior: RwLock<AccessorBehavior>,
    signer: SignerSlot,
    step_delay: Duration,
}

struct SubmittedTx {
    owner: Address,
    op: WriteOp,
}

enum WriteOp {
    CreateProfile,
    UpdateProfile(ProfileDraft),
}

impl InMemoryAccessor {
    /// Create an accessor that resolves the submitting account through the
    /// given signer slot (shared with the wallet implementation).
    pub fn new(signer: SignerSlot) -> Self {
        Self::with_step_delay(signer, Duration::from_millis(2))
    }

    pub fn with_step_delay(signer: SignerSlot, step_delay: Duration) -> Self {
        Self {
            inner: Arc::new(AccessorInner {
                profiles: RwLock::new(HashMap::new()),
                pending: RwLock::new(HashMap::new()),
                behavior: RwLock::new(AccessorBehavior::default()),
                signer,
                step_delay,
            }),
        }
    }

    /// Replace the failure knobs.
    pub fn set_behavior(&self, behavior: AccessorBehavior) -> AccessResult<()> {
        *self
            .inner
            .behavior
            .write()
            .map_err(|_| AccessError::LockPoisoned)? = behavior;
        Ok(())
    }

    /// Pre-populate the profile table.
    pub fn seed_profile(&self, profile: Profile) -> AccessResult<()> {
        self.inner
            .profiles
            .write()
            .map_err(|_| AccessError::LockPoisoned)?
            .insert(profile.owner.clone(), profile);
        Ok(())
    }

    /// Inspect the profile table directly.
    pub fn profile(&self, address: &Address) -> AccessResult<Option<Profile>> {
        Ok(self
            .inner
            .profiles
            .read()
            .map_err(|_| AccessError::LockPoisoned)?
            .get(address)
            .cloned())
    }

    fn behavior(&self) -> AccessorBehavior {
        self.inner
            .behavior
            .read()
            .map(|guard| *guard)
            .unwrap_or_default()
    }
}

impl AccessorInner {
    /// Apply a settled write to the profile table.
    fn execute(&self, owner: &Address, op: &WriteOp) {
        let mut profiles = match self.profiles.write() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("profile table lock poisoned, dropping write");
                return;
            }
        };
        match op {
            // Creating a profile that already exists is a no-op on the
            // ledger side, not an error.
            WriteOp::CreateProfile => {
                profiles.entry(owner.clone()).or_insert_with(|| Profile {
                    owner: owner.clone(),
                    name: "Anon".to_string(),
                    color: "#ffffff".to_string(),
                    info: String::new(),
                });
            }
            WriteOp::UpdateProfile(draft) => {
                // The orchestrator gates updates on profile existence; a
                // missing record is left untouched here.
                if let Some(profile) = profiles.get_mut(owner) {
                    profile.name = draft.name.clone();
                    profile.color = draft.color.clone();
                    profile.info = draft.info.clone();
                }
            }
        }
    }
}

#[async_trait]
impl ScriptExecutor for InMemoryAccessor {
    async fn query(
        &self,
        _script: &str,
        args: Vec<ScriptValue>,
    ) -> AccessResult<Option<serde_json::Value>> {
        if self.behavior().fail_queries {
            return Err(AccessError::Query("injected query failure".to_string()));
        }

        match args.as_slice() {
            [ScriptValue::Address(address)] => {
                let profiles = self
                    .inner
                    .profiles
                    .read()
                    .map_err(|_| AccessError::LockPoisoned)?;
                match profiles.get(address) {
                    Some(profile) => {
                        let value = serde_json::to_value(profile)
                            .map_err(|e| AccessError::Query(e.to_string()))?;
                        Ok(Some(value))
                    }
                    None => Ok(None),
                }
            }
            other => Err(AccessError::Query(format!(
                "unsupported read argument shape ({} args)",
                other.len()
            ))),
        }
    }
}

#[async_trait]
impl TransactionSubmitter for InMemoryAccessor {
    async fn mutate(
        &self,
        _script: &str,
        args: Vec<ScriptValue>,
        compute_limit: u64,
    ) -> AccessResult<TxId> {
        if self.behavior().reject_submissions {
            return Err(AccessError::Submission(
                "injected submission failure".to_string(),
            ));
        }

        let owner = self
            .inner
            .signer
            .get()
            .ok_or_else(|| AccessError::Submission("no authenticated account".to_string()))?;

        let op = match args.as_slice() {
            [] => WriteOp::CreateProfile,
            [ScriptValue::String(name), ScriptValue::String(color), ScriptValue::String(info)] => {
                WriteOp::UpdateProfile(ProfileDraft {
                    name: name.clone(),
                    color: color.clone(),
                    info: info.clone(),
                })
            }
            other => {
                return Err(AccessError::Submission(format!(
                    "unsupported write argument shape ({} args)",
                    other.len()
                )))
            }
        };

        let id = TxId::new(Uuid::new_v4().to_string());
        debug!(tx_id = %id, account = %owner, compute_limit, "accepted write submission");

        self.inner
            .pending
            .write()
            .map_err(|_| AccessError::LockPoisoned)?
            .insert(id.clone(), SubmittedTx { owner, op });

        Ok(id)
    }
}

#[async_trait]
impl TransactionStatusSource for InMemoryAccessor {
    async fn subscribe_status(&self, id: &TxId) -> AccessResult<mpsc::Receiver<TxStatusUpdate>> {
        let submitted = self
            .inner
            .pending
            .write()
            .map_err(|_| AccessError::LockPoisoned)?
            .remove(id)
            .ok_or_else(|| AccessError::UnknownTransaction(id.0.clone()))?;

        let (tx, rx) = mpsc::channel(8);
        let inner = Arc::clone(&self.inner);
        let expire = self.behavior().expire_transactions;
        let id = id.clone();

        tokio::spawn(async move {
            let step = inner.step_delay;
            let push = |status: TxStatus| TxStatusUpdate::new(id.clone(), status);

            tokio::time::sleep(step).await;
            if tx.send(push(TxStatus::Pending)).await.is_err() {
                return;
            }

            if expire {
                tokio::time::sleep(step).await;
                let update =
                    push(TxStatus::Expired).with_error("transaction reached expiry window");
                let _ = tx.send(update).await;
                return;
            }

            tokio::time::sleep(step).await;
            if tx.send(push(TxStatus::Finalized)).await.is_err() {
                return;
            }

            tokio::time::sleep(step).await;
            inner.execute(&submitted.owner, &submitted.op);
            if tx.send(push(TxStatus::Executed)).await.is_err() {
                return;
            }

            tokio::time::sleep(step).await;
            let _ = tx.send(push(TxStatus::Sealed)).await;
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn signed_in(address: &str) -> SignerSlot {
        let signer = SignerSlot::default();
        signer.set(Some(Address::new(address)));
        signer
    }

    async fn drain(mut rx: mpsc::Receiver<TxStatusUpdate>) -> Vec<TxStatus> {
        let mut statuses = Vec::new();
        while let Ok(Some(update)) = timeout(Duration::from_secs(1), rx.recv()).await {
            statuses.push(update.status);
        }
        statuses
    }

    #[tokio::test]
    async fn create_walks_to_sealed_and_materializes_profile() {
        let accessor = InMemoryAccessor::new(signed_in("0x01"));
        let id = accessor.mutate("create", vec![], 50).await.unwrap();

        let rx = accessor.subscribe_status(&id).await.unwrap();
        let statuses = drain(rx).await;
        assert_eq!(
            statuses,
            vec![
                TxStatus::Pending,
                TxStatus::Finalized,
                TxStatus::Executed,
                TxStatus::Sealed
            ]
        );

        let profile = accessor.profile(&Address::new("0x01")).unwrap().unwrap();
        assert_eq!(profile.name, "Anon");
    }

    #[tokio::test]
    async fn create_is_idempotent_on_the_ledger_side() {
        let accessor = InMemoryAccessor::new(signed_in("0x01"));
        accessor
            .seed_profile(Profile {
                owner: Address::new("0x01"),
                name: "Kept".to_string(),
                color: "#123456".to_string(),
                info: "existing".to_string(),
            })
            .unwrap();

        let id = accessor.mutate("create", vec![], 50).await.unwrap();
        let statuses = drain(accessor.subscribe_status(&id).await.unwrap()).await;
        assert_eq!(statuses.last(), Some(&TxStatus::Sealed));

        let profile = accessor.profile(&Address::new("0x01")).unwrap().unwrap();
        assert_eq!(profile.name, "Kept");
    }

    #[tokio::test]
    async fn update_rewrites_all_three_fields() {
        let accessor = InMemoryAccessor::new(signed_in("0x01"));
        let create = accessor.mutate("create", vec![], 50).await.unwrap();
        drain(accessor.subscribe_status(&create).await.unwrap()).await;

        let args = vec![
            ScriptValue::String("A".to_string()),
            ScriptValue::String("#fff".to_string()),
            ScriptValue::String("x".to_string()),
        ];
        let update = accessor.mutate("update", args, 50).await.unwrap();
        drain(accessor.subscribe_status(&update).await.unwrap()).await;

        let profile = accessor.profile(&Address::new("0x01")).unwrap().unwrap();
        assert_eq!(profile.name, "A");
        assert_eq!(profile.color, "#fff");
        assert_eq!(profile.info, "x");
    }

    #[tokio::test]
    async fn expired_transactions_never_execute() {
        let accessor = InMemoryAccessor::new(signed_in("0x01"));
        accessor
            .set_behavior(AccessorBehavior {
                expire_transactions: true,
                ..Default::default()
            })
            .unwrap();

        let id = accessor.mutate("create", vec![], 50).await.unwrap();
        let mut rx = accessor.subscribe_status(&id).await.unwrap();

        let mut last = None;
        while let Ok(Some(update)) = timeout(Duration::from_secs(1), rx.recv()).await {
            last = Some(update);
        }
        let last = last.unwrap();
        assert_eq!(last.status, TxStatus::Expired);
        assert!(last.error_message.is_some());

        assert!(accessor.profile(&Address::new("0x01")).unwrap().is_none());
    }

    #[tokio::test]
    async fn submission_requires_an_authenticated_account() {
        let accessor = InMemoryAccessor::new(SignerSlot::default());
        let result = accessor.mutate("create", vec![], 50).await;
        assert!(matches!(result, Err(AccessError::Submission(_))));
    }

    #[tokio::test]
    async fn query_reads_back_absent_and_present() {
        let accessor = InMemoryAccessor::new(signed_in("0x01"));
        let args = vec![ScriptValue::Address(Address::new("0x01"))];

        let absent = accessor.query("read", args.clone()).await.unwrap();
        assert!(absent.is_none());

        let id = accessor.mutate("create", vec![], 50).await.unwrap();
        drain(accessor.subscribe_status(&id).await.unwrap()).await;

        let present = accessor.query("read", args).await.unwrap().unwrap();
        let profile: Profile = serde_json::from_value(present).unwrap();
        assert_eq!(profile.owner, Address::new("0x01"));
    }

    #[tokio::test]
    async fn status_subscription_is_single_use() {
        let accessor = InMemoryAccessor::new(signed_in("0x01"));
        let id = accessor.mutate("create", vec![], 50).await.unwrap();

        accessor.subscribe_status(&id).await.unwrap();
        let second = accessor.subscribe_status(&id).await;
        assert!(matches!(second, Err(AccessError::UnknownTransaction(_))));
    }
}
