//! In-memory FIFO message queue.
//!
//! # 実装詳細
//! - `VecDeque` を std `Mutex` で保護（ロック中に await しない）
//! - `Notify` で待機中の worker / producer を起こす

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::QueueEntry;
use crate::domain::{Envelope, HeraldError, OverflowPolicy, QueueCapacity};

struct QueueState {
    entries: VecDeque<QueueEntry>,

    /// Envelopes in `entries` (stop sentinels excluded).
    envelopes: usize,

    /// Set together with the stop sentinels; no envelope is accepted after.
    closed: bool,
}

/// Why `push_envelope` refused an envelope.
enum Refused {
    Full(Envelope),
    Closed,
}

/// Multi-producer / multi-consumer FIFO of queue entries.
///
/// Unbounded by default. `get` is the only place a worker waits for work.
pub struct MessageQueue {
    state: Mutex<QueueState>,
    /// Signalled when an entry is pushed.
    available: Notify,
    /// Signalled when an envelope is popped (bounded queues only).
    space: Notify,
    capacity: QueueCapacity,
}

impl MessageQueue {
    pub fn new(capacity: QueueCapacity) -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                envelopes: 0,
                closed: false,
            }),
            available: Notify::new(),
            space: Notify::new(),
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(QueueCapacity::Unbounded)
    }

    /// Append an envelope.
    ///
    /// Completes immediately unless the queue is bounded, full, and its
    /// overflow policy is `Block`; then it waits for a worker to free a slot.
    /// Fails with `HeraldError::Closed` once `close_with_stops` has run,
    /// including for producers already waiting for a slot.
    pub async fn put(&self, mut envelope: Envelope) -> Result<(), HeraldError> {
        let block = matches!(
            self.capacity,
            QueueCapacity::Bounded {
                overflow: OverflowPolicy::Block,
                ..
            }
        );

        loop {
            // check の前に作っておけば notify_one を取りこぼさない
            let space = self.space.notified();

            match self.push_envelope(envelope) {
                Ok(()) => return Ok(()),
                Err(Refused::Closed) => return Err(HeraldError::Closed),
                Err(Refused::Full(rejected)) if block => {
                    envelope = rejected;
                    space.await;
                }
                Err(Refused::Full(_)) => return Err(self.full_error()),
            }
        }
    }

    /// Close the queue and append `count` stop sentinels behind whatever is
    /// already queued. Sentinels are never blocked by the capacity limit.
    ///
    /// Returns `false` without touching the queue if it was already closed.
    pub fn close_with_stops(&self, count: usize) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            state
                .entries
                .extend(std::iter::repeat_with(|| QueueEntry::Stop).take(count));
        }
        self.available.notify_one();
        // Block 待ちの producer を起こして Closed を返させる
        self.space.notify_waiters();
        true
    }

    /// Remove and return the oldest entry, waiting while the queue is empty.
    pub async fn get(&self) -> QueueEntry {
        loop {
            let notified = self.available.notified();
            if let Some(entry) = self.pop() {
                return entry;
            }
            notified.await;
        }
    }

    /// Number of envelopes waiting (stop sentinels not counted).
    pub fn len(&self) -> usize {
        self.lock().envelopes
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_envelope(&self, envelope: Envelope) -> Result<(), Refused> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(Refused::Closed);
            }
            if let QueueCapacity::Bounded { max, .. } = self.capacity
                && state.envelopes >= max
            {
                return Err(Refused::Full(envelope));
            }
            state.entries.push_back(QueueEntry::Envelope(envelope));
            state.envelopes += 1;
        }
        self.available.notify_one();
        Ok(())
    }

    fn pop(&self) -> Option<QueueEntry> {
        let (entry, more) = {
            let mut state = self.lock();
            let entry = state.entries.pop_front()?;
            if matches!(entry, QueueEntry::Envelope(_)) {
                state.envelopes -= 1;
            }
            (entry, !state.entries.is_empty())
        };

        if matches!(entry, QueueEntry::Envelope(_))
            && matches!(self.capacity, QueueCapacity::Bounded { .. })
        {
            self.space.notify_one();
        }
        // 残りがあれば次の worker を起こす
        if more {
            self.available.notify_one();
        }
        Some(entry)
    }

    fn full_error(&self) -> HeraldError {
        let capacity = match self.capacity {
            QueueCapacity::Bounded { max, .. } => max,
            QueueCapacity::Unbounded => usize::MAX,
        };
        HeraldError::QueueFull { capacity }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn envelope(n: u64) -> Envelope {
        Envelope::build(json!({ "n": n }), ["t"]).unwrap()
    }

    fn payload_n(entry: QueueEntry) -> u64 {
        match entry {
            QueueEntry::Envelope(env) => env.data()[0].payload["n"].as_u64().unwrap(),
            QueueEntry::Stop => panic!("expected an envelope"),
        }
    }

    #[tokio::test]
    async fn fifo_order() {
        let queue = MessageQueue::unbounded();
        for n in 0..5 {
            queue.put(envelope(n)).await.unwrap();
        }
        assert_eq!(queue.len(), 5);

        for n in 0..5 {
            assert_eq!(payload_n(queue.get().await), n);
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn close_puts_stops_behind_queued_envelopes() {
        let queue = MessageQueue::unbounded();
        queue.put(envelope(1)).await.unwrap();
        queue.put(envelope(2)).await.unwrap();
        assert!(queue.close_with_stops(2));

        assert_eq!(queue.len(), 2);
        assert_eq!(payload_n(queue.get().await), 1);
        assert_eq!(payload_n(queue.get().await), 2);
        assert!(queue.get().await.is_stop());
        assert!(queue.get().await.is_stop());
    }

    #[tokio::test]
    async fn put_after_close_is_rejected() {
        let queue = MessageQueue::unbounded();
        assert!(queue.close_with_stops(1));

        let err = queue.put(envelope(1)).await.unwrap_err();
        assert!(matches!(err, HeraldError::Closed));
        assert!(queue.is_empty());

        // 2 回目の close は何も積まない
        assert!(!queue.close_with_stops(1));
        assert!(queue.get().await.is_stop());
    }

    #[tokio::test]
    async fn get_waits_for_put() {
        let queue = Arc::new(MessageQueue::unbounded());

        let getter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.get().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!getter.is_finished());

        queue.put(envelope(7)).await.unwrap();
        let entry = tokio::time::timeout(Duration::from_secs(1), getter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload_n(entry), 7);
    }

    #[tokio::test]
    async fn many_consumers_each_get_one() {
        let queue = Arc::new(MessageQueue::unbounded());
        let mut getters = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            getters.push(tokio::spawn(async move { queue.get().await }));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        for n in 0..4 {
            queue.put(envelope(n)).await.unwrap();
        }

        let mut seen = Vec::new();
        for g in getters {
            let entry = tokio::time::timeout(Duration::from_secs(1), g)
                .await
                .unwrap()
                .unwrap();
            seen.push(payload_n(entry));
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn bounded_fail_fast_rejects_when_full() {
        let queue = MessageQueue::new(QueueCapacity::Bounded {
            max: 2,
            overflow: OverflowPolicy::FailFast,
        });
        queue.put(envelope(1)).await.unwrap();
        queue.put(envelope(2)).await.unwrap();

        let err = queue.put(envelope(3)).await.unwrap_err();
        assert!(matches!(err, HeraldError::QueueFull { capacity: 2 }));

        // stop は上限に数えない
        assert!(queue.close_with_stops(3));
        assert_eq!(queue.len(), 2);
        for n in 1..=2 {
            assert_eq!(payload_n(queue.get().await), n);
        }
        for _ in 0..3 {
            assert!(queue.get().await.is_stop());
        }
    }

    #[tokio::test]
    async fn bounded_block_waits_for_space() {
        let queue = Arc::new(MessageQueue::new(QueueCapacity::Bounded {
            max: 1,
            overflow: OverflowPolicy::Block,
        }));
        queue.put(envelope(1)).await.unwrap();

        let producer = tokio::spawn({
            let queue = queue.clone();
            async move { queue.put(envelope(2)).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!producer.is_finished());

        assert_eq!(payload_n(queue.get().await), 1);
        tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(payload_n(queue.get().await), 2);
    }

    #[tokio::test]
    async fn close_wakes_blocked_producers() {
        let queue = Arc::new(MessageQueue::new(QueueCapacity::Bounded {
            max: 1,
            overflow: OverflowPolicy::Block,
        }));
        queue.put(envelope(1)).await.unwrap();

        let producers: Vec<_> = (2..4)
            .map(|n| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.put(envelope(n)).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(producers.iter().all(|p| !p.is_finished()));

        queue.close_with_stops(1);

        for producer in producers {
            let result = tokio::time::timeout(Duration::from_secs(1), producer)
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(result, Err(HeraldError::Closed)));
        }
        assert_eq!(payload_n(queue.get().await), 1);
        assert!(queue.get().await.is_stop());
        assert!(queue.is_empty());
    }
}
