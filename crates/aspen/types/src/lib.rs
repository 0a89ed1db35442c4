//! Aspen Types - shared data model for the ledger profile client.
//!
//! Everything here is plain data: the identity of the account currently
//! holding the session, the ledger-resident profile record, and the lifecycle
//! status of a submitted write transaction. Behavior lives in the session,
//! tracker, store, and orchestrator crates.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque account identifier on the ledger.
///
/// The client never inspects the address beyond equality; it is the sole key
/// used to resolve a profile and to scope write transactions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle for a submitted write transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A discoverable wallet/login method offered to the user.
///
/// Sourced from discovery and read-only from the client's perspective.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthService {
    pub uid: String,
    pub display_name: String,
    pub icon: String,
    pub endpoint: String,
    pub website: String,
}

/// The currently authenticated account.
///
/// Exactly one identity is live at a time; the wallet provider emits `None`
/// when no session exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub address: Address,
    pub authenticated: bool,
    /// Services the wallet granted to this session, in wallet order.
    pub services: Vec<AuthService>,
}

/// The ledger-resident user record, keyed by account.
///
/// Mutated only by accepting the result of a read; local edits travel as a
/// [`ProfileDraft`] until submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub owner: Address,
    pub name: String,
    pub color: String,
    pub info: String,
}

/// A pending local edit to a profile, not yet submitted to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub name: String,
    pub color: String,
    pub info: String,
}

/// Lifecycle status of a tracked transaction.
///
/// The ordering is the settlement order reported by the accessor node. A
/// status push may only move a transaction forward in this ordering, except
/// for `Expired`, which is reachable from any non-terminal state. `Sealed`
/// and `Expired` are terminal.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i8)]
pub enum TxStatus {
    /// No active transaction.
    None = -1,
    /// Submitted, not yet seen by the network.
    Unknown = 0,
    /// Awaiting finalization.
    Pending = 1,
    /// Finalized, awaiting execution.
    Finalized = 2,
    /// Executed, awaiting sealing.
    Executed = 3,
    /// Sealed. The result has been committed to the ledger.
    Sealed = 4,
    /// Expired without settling.
    Expired = 5,
}

impl TxStatus {
    /// Numeric wire code as reported by the accessor node.
    pub fn code(self) -> i8 {
        self as i8
    }

    /// Decode a wire code.
    pub fn from_code(code: i8) -> Result<Self, InvalidStatusCode> {
        match code {
            -1 => Ok(Self::None),
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Pending),
            2 => Ok(Self::Finalized),
            3 => Ok(Self::Executed),
            4 => Ok(Self::Sealed),
            5 => Ok(Self::Expired),
            other => Err(InvalidStatusCode(other)),
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sealed | Self::Expired)
    }

    /// Whether this status denotes settled success.
    pub fn is_sealed(self) -> bool {
        matches!(self, Self::Sealed)
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Unknown => "unknown",
            Self::Pending => "pending",
            Self::Finalized => "finalized",
            Self::Executed => "executed",
            Self::Sealed => "sealed",
            Self::Expired => "expired",
        };
        write!(f, "{name}")
    }
}

/// A status code outside the `-1..=5` range the accessor node defines.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown transaction status code: {0}")]
pub struct InvalidStatusCode(pub i8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ordering_matches_settlement_order() {
        assert!(TxStatus::None < TxStatus::Unknown);
        assert!(TxStatus::Unknown < TxStatus::Pending);
        assert!(TxStatus::Pending < TxStatus::Finalized);
        assert!(TxStatus::Finalized < TxStatus::Executed);
        assert!(TxStatus::Executed < TxStatus::Sealed);
        assert!(TxStatus::Sealed < TxStatus::Expired);
    }

    #[test]
    fn status_codes_round_trip() {
        for code in -1..=5 {
            let status = TxStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(TxStatus::from_code(6), Err(InvalidStatusCode(6)));
        assert_eq!(TxStatus::from_code(-2), Err(InvalidStatusCode(-2)));
    }

    #[test]
    fn only_sealed_and_expired_are_terminal() {
        assert!(TxStatus::Sealed.is_terminal());
        assert!(TxStatus::Expired.is_terminal());
        for status in [
            TxStatus::None,
            TxStatus::Unknown,
            TxStatus::Pending,
            TxStatus::Finalized,
            TxStatus::Executed,
        ] {
            assert!(!status.is_terminal(), "{status} must not be terminal");
        }
    }

    #[test]
    fn profile_survives_json_round_trip() {
        let profile = Profile {
            owner: Address::new("0xf8d6e0586b0a20c8"),
            name: "Anon".to_string(),
            color: "#ffffff".to_string(),
            info: "hello".to_string(),
        };
        let json = serde_json::to_value(&profile).unwrap();
        let back: Profile = serde_json::from_value(json).unwrap();
        assert_eq!(back, profile);
    }
}
