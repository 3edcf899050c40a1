//! Settings - クライアント構築時に固定される設定

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Path appended to the broker base address for every publish request.
pub const PUBLISH_PATH: &str = "/api/v1/publisher/publish_message/";

/// What a bounded queue does with a publish when it is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the publish with `HeraldError::QueueFull`.
    #[default]
    FailFast,
    /// Suspend the producer until a worker frees a slot.
    Block,
}

/// Queue depth limit. Stop sentinels are never counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QueueCapacity {
    #[default]
    Unbounded,
    Bounded { max: usize, overflow: OverflowPolicy },
}

/// Client settings. Immutable once the client is built.
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Broker base address, e.g. `https://broker.example.com`.
    pub broker_url: String,

    /// Sent as the `token` header on every request.
    pub access_token: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default)]
    pub queue_capacity: QueueCapacity,

    /// Upper bound for one network call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// How long `close()` waits for the workers. `None` waits forever.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: Option<Duration>,

    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_verify_tls() -> bool {
    true
}

impl Settings {
    pub fn new(broker_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            access_token: access_token.into(),
            worker_count: default_worker_count(),
            queue_capacity: QueueCapacity::default(),
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            verify_tls: default_verify_tls(),
        }
    }

    /// Full publish endpoint. A trailing `/` on the base address is dropped.
    pub fn publish_url(&self) -> String {
        format!("{}{}", self.broker_url.trim_end_matches('/'), PUBLISH_PATH)
    }
}

// token はログに出さない
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("broker_url", &self.broker_url)
            .field("access_token", &"<redacted>")
            .field("worker_count", &self.worker_count)
            .field("queue_capacity", &self.queue_capacity)
            .field("request_timeout", &self.request_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}
