//! Aspen Access - contracts for the remote services the client talks to.
//!
//! The client core never speaks a wire protocol directly; it holds trait
//! handles for the accessor node (read scripts, write transactions, status
//! streams), the wallet provider (authentication), and wallet discovery.
//! This crate defines those contracts plus deterministic in-memory
//! implementations used by tests and the demo binary.

#![deny(unsafe_code)]

mod config;
mod error;
mod memory;
mod model;
mod traits;
mod wallet;

pub use config::AccessConfig;
pub use error::{AccessError, AccessResult};
pub use memory::{AccessorBehavior, InMemoryAccessor};
pub use model::{ScriptValue, TxStatusUpdate};
pub use traits::{
    ScriptExecutor, TransactionStatusSource, TransactionSubmitter, WalletDiscovery, WalletProvider,
};
pub use wallet::{DevWallet, SignerSlot, StaticDiscovery};
