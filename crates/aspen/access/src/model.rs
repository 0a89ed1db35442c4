//! Wire-level values exchanged with the accessor node.

use aspen_types::{Address, TxId, TxStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed argument passed to a read script or write transaction.
///
/// The script source itself is opaque to the client; the argument shape is
/// part of each script's contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScriptValue {
    Address(Address),
    String(String),
}

/// One status push for a submitted transaction.
///
/// The transport is assumed to deliver pushes for one transaction in
/// non-decreasing order, but consumers must defend against violations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatusUpdate {
    pub id: TxId,
    pub status: TxStatus,
    /// Populated on terminal failure pushes when the node reports a cause.
    pub error_message: Option<String>,
    pub at: DateTime<Utc>,
}

impl TxStatusUpdate {
    pub fn new(id: TxId, status: TxStatus) -> Self {
        Self {
            id,
            status,
            error_message: None,
            at: Utc::now(),
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}
