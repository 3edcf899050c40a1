//! DeliveryChannel port - broker への 1 回の送信
//!
//! The queue workers and `publish_force` share one channel instance, so
//! implementations must be safe for concurrent use (`Send + Sync`, no
//! exclusive borrow during `send`).

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Envelope, TransportError};

/// The only status the broker uses for an accepted publish.
pub const SUCCESS_STATUS: u16 = 200;

/// Status and decoded body of one publish request.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResponse {
    pub status: u16,
    /// JSON body; `Value::Null` when a failure response had no JSON body.
    pub body: Value,
}

impl DeliveryResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }
}

/// DeliveryChannel は envelope を 1 回だけ送信する
///
/// No retries here; callers decide what a failure means.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> Result<DeliveryResponse, TransportError>;
}
