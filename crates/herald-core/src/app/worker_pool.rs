//! WorkerPool - 固定数の worker の起動と停止
//!
//! Shutdown puts exactly one stop sentinel per worker behind whatever is
//! already queued, so every worker drains its share and then exits. The
//! join waits on the task handles with an optional deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::status::{DeliveryCounters, WorkerState, WorkerStatus};
use super::worker_loop::worker_loop;
use crate::domain::HeraldError;
use crate::ports::DeliveryChannel;
use crate::queue::MessageQueue;

struct Worker {
    label: String,
    terminated: Arc<AtomicBool>,
}

/// Sets the terminated flag however the worker task ends (return, panic, abort).
struct TerminatedOnDrop(Arc<AtomicBool>);

impl Drop for TerminatedOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

pub struct WorkerPool {
    queue: Arc<MessageQueue>,
    workers: Vec<Worker>,
    joins: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `count` workers on `runtime`, all pulling from `queue`.
    pub(crate) fn spawn(
        count: usize,
        queue: Arc<MessageQueue>,
        channel: Arc<dyn DeliveryChannel>,
        counters: Arc<DeliveryCounters>,
        runtime: &Handle,
    ) -> Self {
        let mut workers = Vec::with_capacity(count);
        let mut joins = Vec::with_capacity(count);

        for i in 0..count {
            let label = format!("worker-{i}");
            let terminated = Arc::new(AtomicBool::new(false));

            let guard = TerminatedOnDrop(Arc::clone(&terminated));
            let fut = worker_loop(
                label.clone(),
                Arc::clone(&queue),
                Arc::clone(&channel),
                Arc::clone(&counters),
            );
            joins.push(runtime.spawn(async move {
                let _guard = guard;
                fut.await;
            }));

            workers.push(Worker { label, terminated });
        }

        info!(worker_count = count, "publisher workers spawned");

        Self {
            queue,
            workers,
            joins: Mutex::new(joins),
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn statuses(&self) -> Vec<WorkerStatus> {
        self.workers
            .iter()
            .map(|w| WorkerStatus {
                label: w.label.clone(),
                state: if w.terminated.load(Ordering::Acquire) {
                    WorkerState::Terminated
                } else {
                    WorkerState::Running
                },
            })
            .collect()
    }

    pub fn all_terminated(&self) -> bool {
        self.workers
            .iter()
            .all(|w| w.terminated.load(Ordering::Acquire))
    }

    /// Close the queue and enqueue one stop sentinel per worker. Only the
    /// first call does anything.
    pub fn request_stop(&self) {
        if self.queue.close_with_stops(self.workers.len()) {
            debug!(workers = self.workers.len(), "stop sentinels queued");
        }
    }

    /// Request stop and wait for every worker to finish.
    ///
    /// `timeout = None` waits forever. On expiry the unfinished workers are
    /// left running detached and their labels are returned in the error.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), HeraldError> {
        self.request_stop();

        let joins = std::mem::take(&mut *self.joins.lock().unwrap_or_else(PoisonError::into_inner));
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);

        for (i, mut join) in joins.into_iter().enumerate() {
            let result = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, &mut join).await {
                    Ok(result) => result,
                    // 期限切れ。残りは待たない
                    Err(_) => break,
                },
                None => join.await,
            };

            if let Err(join_error) = result {
                error!(
                    worker = %self.workers[i].label,
                    error = %join_error,
                    "worker task ended abnormally"
                );
            }
        }

        let remaining: Vec<String> = self
            .workers
            .iter()
            .filter(|w| !w.terminated.load(Ordering::Acquire))
            .map(|w| w.label.clone())
            .collect();

        if remaining.is_empty() {
            return Ok(());
        }

        let timeout = timeout.unwrap_or_default();
        warn!(
            timeout = ?timeout,
            remaining = ?remaining,
            "workers did not stop before the shutdown deadline"
        );
        Err(HeraldError::ShutdownTimeout { timeout, remaining })
    }
}

impl Drop for WorkerPool {
    // close されずに drop された場合も worker を止める
    fn drop(&mut self) {
        self.request_stop();
    }
}
