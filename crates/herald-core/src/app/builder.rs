//! ClientBuilder - PublisherClient の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に設定を検証し、不正なら BuildError を返す
//! - worker は build() の中で起動するので tokio runtime が必要

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use super::client::PublisherClient;
use crate::domain::{QueueCapacity, Settings, TransportError};
use crate::impls::HttpDeliveryChannel;
use crate::ports::DeliveryChannel;

/// ClientBuilder は PublisherClient を構築
///
/// # 使用例
/// ```ignore
/// let client = PublisherClient::builder("https://broker.example.com", token)
///     .worker_count(8)
///     .build()?;
/// ```
pub struct ClientBuilder {
    settings: Settings,
    channel: Option<Arc<dyn DeliveryChannel>>,
}

/// BuildError はクライアント構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("worker_count must be at least 1")]
    InvalidWorkerCount,

    #[error("broker_url must not be empty")]
    MissingBrokerUrl,

    #[error("bounded queue capacity must be at least 1")]
    InvalidQueueCapacity,

    #[error("failed to set up delivery channel: {0}")]
    Channel(#[source] TransportError),

    #[error("publisher client must be built inside a tokio runtime")]
    NoRuntime,
}

impl ClientBuilder {
    pub fn new(broker_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::from_settings(Settings::new(broker_url, access_token))
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self {
            settings,
            channel: None,
        }
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.settings.worker_count = count;
        self
    }

    pub fn queue_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.settings.queue_capacity = capacity;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.settings.request_timeout = timeout;
        self
    }

    /// `None` makes `close()` wait for the workers without a deadline.
    pub fn shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.shutdown_timeout = timeout;
        self
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.settings.verify_tls = verify;
        self
    }

    /// Use this channel instead of the HTTP one built from the settings.
    pub fn channel(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Validate the settings, open the channel and spawn the workers.
    pub fn build(self) -> Result<PublisherClient, BuildError> {
        validate(&self.settings)?;
        let runtime = Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let channel: Arc<dyn DeliveryChannel> = match self.channel {
            Some(channel) => channel,
            None => Arc::new(HttpDeliveryChannel::new(&self.settings).map_err(BuildError::Channel)?),
        };

        Ok(PublisherClient::start(self.settings, channel, &runtime))
    }
}

fn validate(settings: &Settings) -> Result<(), BuildError> {
    if settings.worker_count == 0 {
        return Err(BuildError::InvalidWorkerCount);
    }
    if settings.broker_url.trim().is_empty() {
        return Err(BuildError::MissingBrokerUrl);
    }
    if let QueueCapacity::Bounded { max: 0, .. } = settings.queue_capacity {
        return Err(BuildError::InvalidQueueCapacity);
    }
    Ok(())
}
