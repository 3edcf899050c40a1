//! Queue entry: pending work or a stop sentinel.

use crate::domain::Envelope;

/// One item of the message queue.
///
/// Stop is its own variant so an envelope with an empty payload can never be
/// mistaken for a shutdown signal.
#[derive(Debug, Clone)]
pub enum QueueEntry {
    /// Envelope waiting for a worker.
    Envelope(Envelope),

    /// Tells exactly one worker to exit its loop.
    Stop,
}

impl QueueEntry {
    pub fn is_stop(&self) -> bool {
        matches!(self, QueueEntry::Stop)
    }
}
