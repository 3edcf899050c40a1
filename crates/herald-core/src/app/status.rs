//! Status - 配送結果の集計と worker の状態

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Outcome totals of queued deliveries. `publish_force` is not counted; its
/// caller already gets the outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCounts {
    /// Broker answered 200.
    pub delivered: u64,
    /// Broker answered with any other status.
    pub rejected: u64,
    /// The call never produced a response (transport error or panic).
    pub faulted: u64,
}

impl DeliveryCounts {
    pub fn attempts(&self) -> u64 {
        self.delivered + self.rejected + self.faulted
    }
}

#[derive(Debug, Default)]
pub(crate) struct DeliveryCounters {
    delivered: AtomicU64,
    rejected: AtomicU64,
    faulted: AtomicU64,
}

impl DeliveryCounters {
    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_faulted(&self) {
        self.faulted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DeliveryCounts {
        DeliveryCounts {
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
        }
    }
}

/// Worker lifecycle. One way only: Running -> Terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Running,
    Terminated,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Terminated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub label: String,
    pub state: WorkerState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_records() {
        let counters = DeliveryCounters::default();
        counters.record_delivered();
        counters.record_delivered();
        counters.record_rejected();
        counters.record_faulted();

        let counts = counters.snapshot();
        assert_eq!(
            counts,
            DeliveryCounts {
                delivered: 2,
                rejected: 1,
                faulted: 1
            }
        );
        assert_eq!(counts.attempts(), 4);
    }

    #[test]
    fn only_terminated_is_terminal() {
        assert!(WorkerState::Terminated.is_terminal());
        assert!(!WorkerState::Running.is_terminal());
    }
}
