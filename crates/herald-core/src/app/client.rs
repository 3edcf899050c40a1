//! PublisherClient - queue と worker pool を持つ公開 API
//!
//! - `publish`: queue に積むだけ（fire-and-forget）
//! - `publish_force`: queue を通さずその場で送信し、結果を返す
//! - `close`: stop を worker 数だけ積んで、全 worker の終了を待つ

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use super::builder::{BuildError, ClientBuilder};
use super::status::{DeliveryCounters, DeliveryCounts, WorkerStatus};
use super::worker_pool::WorkerPool;
use crate::domain::{Envelope, HeraldError, MessageId, Settings, combine_topics};
use crate::ports::{DeliveryChannel, DeliveryResponse};
use crate::queue::MessageQueue;

/// Message-publishing client.
///
/// Each instance owns its queue, workers and channel; two clients in one
/// process share nothing. Must be created inside a tokio runtime.
pub struct PublisherClient {
    settings: Settings,
    queue: Arc<MessageQueue>,
    channel: Arc<dyn DeliveryChannel>,
    counters: Arc<DeliveryCounters>,
    pool: WorkerPool,
    closed: AtomicBool,
}

impl PublisherClient {
    pub fn builder(broker_url: impl Into<String>, access_token: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(broker_url, access_token)
    }

    /// Build a client with the HTTP channel described by `settings`.
    pub fn new(settings: Settings) -> Result<Self, BuildError> {
        ClientBuilder::from_settings(settings).build()
    }

    pub(crate) fn start(
        settings: Settings,
        channel: Arc<dyn DeliveryChannel>,
        runtime: &Handle,
    ) -> Self {
        let queue = Arc::new(MessageQueue::new(settings.queue_capacity));
        let counters = Arc::new(DeliveryCounters::default());
        let pool = WorkerPool::spawn(
            settings.worker_count,
            Arc::clone(&queue),
            Arc::clone(&channel),
            Arc::clone(&counters),
            runtime,
        );

        Self {
            settings,
            queue,
            channel,
            counters,
            pool,
            closed: AtomicBool::new(false),
        }
    }

    /// Queue `payload` for `topics` followed by `topic`.
    ///
    /// Returns once the message is queued; delivery happens later on a worker
    /// and its outcome is only logged. The returned id is for correlating
    /// those log lines. Once `close()` has begun this returns
    /// `HeraldError::Closed`, also for a call already waiting on a full queue.
    pub async fn publish(
        &self,
        payload: Value,
        topic: Option<&str>,
        topics: &[&str],
    ) -> Result<MessageId, HeraldError> {
        self.ensure_open()?;
        let envelope = Envelope::build(payload, combine_topics(topic, topics))?;
        let id = envelope.id();

        self.queue.put(envelope).await?;
        debug!(message_id = %id, pending = self.queue.len(), "message queued");
        Ok(id)
    }

    /// Send right now from the caller's task, bypassing the queue.
    ///
    /// A non-200 answer is `Ok` with `is_success() == false`. A transport
    /// fault is `Err(HeraldError::Transport(_))`.
    pub async fn publish_force(
        &self,
        payload: Value,
        topic: Option<&str>,
        topics: &[&str],
    ) -> Result<DeliveryResponse, HeraldError> {
        self.ensure_open()?;
        let envelope = Envelope::build(payload, combine_topics(topic, topics))?;

        match self.channel.send(&envelope).await {
            Ok(response) => {
                if !response.is_success() {
                    warn!(
                        message_id = %envelope.id(),
                        status = response.status,
                        "forced publish got incorrect response"
                    );
                }
                Ok(response)
            }
            Err(fault) => {
                error!(message_id = %envelope.id(), error = %fault, "forced publish failed");
                Err(fault.into())
            }
        }
    }

    /// Stop accepting messages, let the workers drain the queue, and wait
    /// for all of them to exit (bounded by `Settings::shutdown_timeout`).
    ///
    /// Only the first call drains; later calls return `Ok(())` at once.
    pub async fn close(&self) -> Result<(), HeraldError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            warn!("close called on an already closed publisher client");
            return Ok(());
        }

        info!(
            workers = self.pool.len(),
            pending = self.queue.len(),
            "closing publisher client"
        );
        self.pool.shutdown(self.settings.shutdown_timeout).await?;

        let counts = self.counts();
        info!(
            delivered = counts.delivered,
            rejected = counts.rejected,
            faulted = counts.faulted,
            "publisher client closed"
        );
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Envelopes queued and not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn counts(&self) -> DeliveryCounts {
        self.counters.snapshot()
    }

    pub fn worker_statuses(&self) -> Vec<WorkerStatus> {
        self.pool.statuses()
    }

    fn ensure_open(&self) -> Result<(), HeraldError> {
        if self.is_closed() {
            return Err(HeraldError::Closed);
        }
        Ok(())
    }
}
