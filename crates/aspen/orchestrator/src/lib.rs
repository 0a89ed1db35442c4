//! Aspen Orchestrator - coordination hub for session, profile, and writes.
//!
//! The orchestrator owns the cached profile and the currently tracked
//! transaction, decides when a profile read is (re)issued, gates profile
//! writes on session and existence state, and wires "transaction sealed" to
//! "reload profile". UI layers talk to it through commands (log in, log
//! out, create, update) and observe it through watch channels; nothing else
//! mutates the state it owns.

#![deny(unsafe_code)]

mod error;
mod orchestrator;
mod scripts;

pub use error::OrchestratorError;
pub use orchestrator::ProfileOrchestrator;
pub use scripts::{CREATE_PROFILE_SCRIPT, UPDATE_PROFILE_SCRIPT};
