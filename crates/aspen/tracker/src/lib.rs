//! Aspen Tracker - lifecycle of one submitted write transaction.
//!
//! A tracker is a passive state recorder: it is created at submission time
//! with status `Unknown` and fed status pushes from the network until it
//! settles as `Sealed` or `Expired`. It never retries and never times out;
//! if the push channel goes silent the transaction stays pending and the
//! caller owns that liveness gap.
//!
//! Transition rules:
//!
//! - a push whose id does not match the tracked transaction is ignored
//!   (stale callbacks from a superseded submission),
//! - once settled, every further push is ignored,
//! - otherwise a push is applied iff it does not move the status backward;
//!   `Expired` is the exception and is reachable from any non-terminal
//!   state.
//!
//! Entering `Sealed` or `Expired` emits the matching [`TxEvent`] exactly
//! once per tracker, no matter how the pushes arrive.

#![deny(unsafe_code)]

use aspen_types::{TxId, TxStatus};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

/// Channel capacity for tracker events.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Typed events emitted while a transaction settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxEvent {
    /// The tracked status moved forward.
    Status { id: TxId, status: TxStatus },
    /// The transaction sealed. Fired at most once per tracker.
    Sealed { id: TxId },
    /// The transaction expired. Fired at most once per tracker.
    Expired {
        id: TxId,
        error_message: Option<String>,
    },
}

/// What a push did to the tracker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Applied(TxStatus),
    Ignored(IgnoreReason),
}

/// Why a push was not applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Push for a transaction this tracker does not track.
    StaleId,
    /// The tracker already settled.
    Terminal,
    /// The push would move the status backward.
    Regression,
    /// The push repeats the current status.
    Duplicate,
}

/// One accepted transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    /// Previous status (`None` for the initial entry).
    pub from: Option<TxStatus>,
    pub to: TxStatus,
    pub at: DateTime<Utc>,
}

/// Tracker for a single submitted transaction.
///
/// Trackers are never reused: a new submission always gets a new tracker,
/// and a settled tracker keeps its id and terminal status forever.
pub struct TransactionTracker {
    id: TxId,
    status: TxStatus,
    error_message: Option<String>,
    history: Vec<StatusChange>,
    events: broadcast::Sender<TxEvent>,
}

impl TransactionTracker {
    /// Start tracking a freshly submitted transaction.
    pub fn new(id: TxId) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            id,
            status: TxStatus::Unknown,
            error_message: None,
            history: vec![StatusChange {
                from: None,
                to: TxStatus::Unknown,
                at: Utc::now(),
            }],
            events,
        }
    }

    pub fn id(&self) -> &TxId {
        &self.id
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Error message delivered with a push, if the node reported one.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Accepted transitions in application order.
    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    /// Whether the transaction reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }

    /// Subscribe to this tracker's events.
    pub fn subscribe(&self) -> broadcast::Receiver<TxEvent> {
        self.events.subscribe()
    }

    /// Feed one status push into the tracker.
    pub fn apply(
        &mut self,
        id: &TxId,
        new: TxStatus,
        error_message: Option<String>,
    ) -> PushOutcome {
        if id != &self.id {
            debug!(pushed = %id, tracked = %self.id, "ignoring push for stale transaction id");
            return PushOutcome::Ignored(IgnoreReason::StaleId);
        }
        if self.status.is_terminal() {
            return PushOutcome::Ignored(IgnoreReason::Terminal);
        }
        if new == self.status {
            return PushOutcome::Ignored(IgnoreReason::Duplicate);
        }
        if new < self.status && new != TxStatus::Expired {
            debug!(tx_id = %self.id, current = %self.status, pushed = %new, "ignoring out-of-order status push");
            return PushOutcome::Ignored(IgnoreReason::Regression);
        }

        let from = self.status;
        self.status = new;
        self.history.push(StatusChange {
            from: Some(from),
            to: new,
            at: Utc::now(),
        });
        if let Some(message) = error_message {
            self.error_message = Some(message);
        }
        debug!(tx_id = %self.id, from = %from, to = %new, "transaction status advanced");

        // No subscribers is fine.
        let _ = self.events.send(TxEvent::Status {
            id: self.id.clone(),
            status: new,
        });
        match new {
            TxStatus::Sealed => {
                let _ = self.events.send(TxEvent::Sealed {
                    id: self.id.clone(),
                });
            }
            TxStatus::Expired => {
                let _ = self.events.send(TxEvent::Expired {
                    id: self.id.clone(),
                    error_message: self.error_message.clone(),
                });
            }
            _ => {}
        }

        PushOutcome::Applied(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tx(id: &str) -> TxId {
        TxId::new(id)
    }

    fn drain(rx: &mut broadcast::Receiver<TxEvent>) -> Vec<TxEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn statuses_only_move_forward() {
        let id = tx("a");
        let mut tracker = TransactionTracker::new(id.clone());

        assert_eq!(
            tracker.apply(&id, TxStatus::Pending, None),
            PushOutcome::Applied(TxStatus::Pending)
        );
        assert_eq!(
            tracker.apply(&id, TxStatus::Unknown, None),
            PushOutcome::Ignored(IgnoreReason::Regression)
        );
        assert_eq!(
            tracker.apply(&id, TxStatus::Executed, None),
            PushOutcome::Applied(TxStatus::Executed)
        );
        assert_eq!(
            tracker.apply(&id, TxStatus::Finalized, None),
            PushOutcome::Ignored(IgnoreReason::Regression)
        );
        assert_eq!(tracker.status(), TxStatus::Executed);
    }

    #[test]
    fn sealing_twice_fires_one_sealed_event() {
        let id = tx("a");
        let mut tracker = TransactionTracker::new(id.clone());
        let mut rx = tracker.subscribe();

        tracker.apply(&id, TxStatus::Sealed, None);
        assert_eq!(
            tracker.apply(&id, TxStatus::Sealed, None),
            PushOutcome::Ignored(IgnoreReason::Terminal)
        );

        let sealed = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, TxEvent::Sealed { .. }))
            .count();
        assert_eq!(sealed, 1);
    }

    #[test]
    fn pushes_for_another_id_are_ignored() {
        let id = tx("b");
        let mut tracker = TransactionTracker::new(id.clone());
        tracker.apply(&id, TxStatus::Pending, None);

        assert_eq!(
            tracker.apply(&tx("a"), TxStatus::Sealed, None),
            PushOutcome::Ignored(IgnoreReason::StaleId)
        );
        assert_eq!(tracker.status(), TxStatus::Pending);
    }

    #[test]
    fn expired_is_reachable_from_any_non_terminal_state() {
        for start in [TxStatus::Pending, TxStatus::Finalized, TxStatus::Executed] {
            let id = tx("a");
            let mut tracker = TransactionTracker::new(id.clone());
            tracker.apply(&id, start, None);
            assert_eq!(
                tracker.apply(&id, TxStatus::Expired, Some("gave up".to_string())),
                PushOutcome::Applied(TxStatus::Expired)
            );
            assert_eq!(tracker.error_message(), Some("gave up"));
        }
    }

    #[test]
    fn a_sealed_transaction_cannot_expire() {
        let id = tx("a");
        let mut tracker = TransactionTracker::new(id.clone());
        tracker.apply(&id, TxStatus::Sealed, None);

        assert_eq!(
            tracker.apply(&id, TxStatus::Expired, None),
            PushOutcome::Ignored(IgnoreReason::Terminal)
        );
        assert_eq!(tracker.status(), TxStatus::Sealed);
    }

    #[test]
    fn expiry_fires_once_and_absorbs_everything_after() {
        let id = tx("a");
        let mut tracker = TransactionTracker::new(id.clone());
        let mut rx = tracker.subscribe();

        tracker.apply(&id, TxStatus::Expired, None);
        tracker.apply(&id, TxStatus::Expired, None);
        tracker.apply(&id, TxStatus::Sealed, None);
        assert_eq!(tracker.status(), TxStatus::Expired);

        let expired = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, TxEvent::Expired { .. }))
            .count();
        assert_eq!(expired, 1);
    }

    #[test]
    fn history_records_each_accepted_transition() {
        let id = tx("a");
        let mut tracker = TransactionTracker::new(id.clone());
        tracker.apply(&id, TxStatus::Pending, None);
        tracker.apply(&id, TxStatus::Pending, None);
        tracker.apply(&id, TxStatus::Sealed, None);

        let transitions: Vec<_> = tracker
            .history()
            .iter()
            .map(|change| (change.from, change.to))
            .collect();
        assert_eq!(
            transitions,
            vec![
                (None, TxStatus::Unknown),
                (Some(TxStatus::Unknown), TxStatus::Pending),
                (Some(TxStatus::Pending), TxStatus::Sealed),
            ]
        );
    }

    fn status_strategy() -> impl Strategy<Value = TxStatus> {
        (-1i8..=5).prop_map(|code| TxStatus::from_code(code).unwrap())
    }

    proptest! {
        #[test]
        fn property_observed_statuses_never_regress(pushes in proptest::collection::vec(status_strategy(), 0..32)) {
            let id = tx("prop");
            let mut tracker = TransactionTracker::new(id.clone());
            let mut observed = vec![tracker.status()];

            for push in pushes {
                let before = tracker.status();
                if before.is_terminal() {
                    prop_assert_eq!(
                        tracker.apply(&id, push, None),
                        PushOutcome::Ignored(IgnoreReason::Terminal)
                    );
                }
                let _ = tracker.apply(&id, push, None);
                observed.push(tracker.status());
            }

            for pair in observed.windows(2) {
                let step_ok = pair[1] >= pair[0] || pair[1] == TxStatus::Expired;
                prop_assert!(step_ok, "status regressed from {} to {}", pair[0], pair[1]);
            }
            for pair in observed.windows(2) {
                if pair[0].is_terminal() {
                    prop_assert_eq!(pair[0], pair[1]);
                }
            }
        }
    }
}
