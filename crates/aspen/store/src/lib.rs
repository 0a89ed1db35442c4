//! Aspen Store - the last-read profile record for one account.
//!
//! The store issues the read script against the accessor node and caches the
//! result. The cache is scoped to the address that produced it: a consumer
//! asking about any other address sees nothing and must read fresh. The
//! store itself never mutates ledger state, and a failed read leaves the
//! cache exactly as it was.

#![deny(unsafe_code)]

use aspen_access::{AccessError, ScriptExecutor, ScriptValue};
use aspen_types::{Address, Profile};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

/// Read script returning the profile record for an address, or nothing.
pub const READ_PROFILE_SCRIPT: &str = r#"
import Profile from 0xProfile

pub fun main(address: Address): Profile.ReadOnly? {
    return Profile.read(address)
}
"#;

/// Store-level errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile read failed: {0}")]
    Read(#[source] AccessError),

    #[error("profile record malformed: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("profile cache lock poisoned")]
    LockPoisoned,
}

struct CacheEntry {
    for_address: Address,
    profile: Option<Profile>,
}

/// Cached profile reads against the accessor node.
pub struct ProfileStore {
    executor: Arc<dyn ScriptExecutor>,
    cached: RwLock<Option<CacheEntry>>,
}

impl ProfileStore {
    pub fn new(executor: Arc<dyn ScriptExecutor>) -> Self {
        Self {
            executor,
            cached: RwLock::new(None),
        }
    }

    /// Read the profile record for `address` and replace the cache with the
    /// result. `Ok(None)` means no record exists for that account.
    pub async fn read(&self, address: &Address) -> Result<Option<Profile>, StoreError> {
        let value = self
            .executor
            .query(
                READ_PROFILE_SCRIPT,
                vec![ScriptValue::Address(address.clone())],
            )
            .await
            .map_err(StoreError::Read)?;

        let profile = match value {
            Some(value) => {
                Some(serde_json::from_value::<Profile>(value).map_err(StoreError::Decode)?)
            }
            None => None,
        };

        debug!(account = %address, exists = profile.is_some(), "profile read");
        *self.cached.write().map_err(|_| StoreError::LockPoisoned)? = Some(CacheEntry {
            for_address: address.clone(),
            profile: profile.clone(),
        });
        Ok(profile)
    }

    /// The cached result, but only if it was read for `address`.
    ///
    /// The outer `None` means the cache holds nothing for that account; the
    /// inner value is the record-or-absent the last read returned.
    pub fn cached_for(&self, address: &Address) -> Option<Option<Profile>> {
        let guard = self.cached.read().ok()?;
        guard
            .as_ref()
            .filter(|entry| &entry.for_address == address)
            .map(|entry| entry.profile.clone())
    }

    /// Drop the cache entry, whoever it belonged to.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.cached.write() {
            *guard = None;
        }
    }
}
