//! RecordingChannel - 開発・テスト用の DeliveryChannel
//!
//! Records every envelope it is asked to send and answers from a script.
//! Scripted outcomes are consumed in call order; once the script is empty
//! every call gets the fallback response.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::{Envelope, TransportError};
use crate::ports::{DeliveryChannel, DeliveryResponse};

#[derive(Debug, Clone)]
enum Scripted {
    Respond(DeliveryResponse),
    Fault(TransportError),
    Panic(String),
}

#[derive(Debug)]
pub struct RecordingChannel {
    sent: Mutex<Vec<Envelope>>,
    script: Mutex<VecDeque<Scripted>>,
    fallback: DeliveryResponse,
    delay: Option<Duration>,
}

impl RecordingChannel {
    /// Answers `200 {"ok": true}` unless scripted otherwise.
    pub fn new() -> Self {
        Self::with_fallback(DeliveryResponse::new(200, json!({"ok": true})))
    }

    pub fn with_fallback(fallback: DeliveryResponse) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
        }
    }

    /// Sleep this long inside every `send` (simulates a slow broker).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_response(&self, status: u16, body: Value) {
        self.push(Scripted::Respond(DeliveryResponse::new(status, body)));
    }

    pub fn push_fault(&self, fault: TransportError) {
        self.push(Scripted::Fault(fault));
    }

    /// The next `send` panics with `message`.
    pub fn push_panic(&self, message: impl Into<String>) {
        self.push(Scripted::Panic(message.into()));
    }

    /// Every envelope passed to `send`, in call order (faults included).
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn push(&self, outcome: Scripted) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    fn next_outcome(&self) -> Scripted {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Scripted::Respond(self.fallback.clone()))
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&self, envelope: &Envelope) -> Result<DeliveryResponse, TransportError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope.clone());
        // ロックを外してから await する
        let outcome = self.next_outcome();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            Scripted::Respond(resp) => Ok(resp),
            Scripted::Fault(fault) => Err(fault),
            Scripted::Panic(message) => panic!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_script_then_fallback() {
        let channel = RecordingChannel::new();
        channel.push_response(500, json!({}));
        channel.push_fault(TransportError::Timeout);

        let env = Envelope::build(json!({"n": 1}), ["t"]).unwrap();

        let first = channel.send(&env).await.unwrap();
        assert_eq!(first.status, 500);

        let second = channel.send(&env).await.unwrap_err();
        assert_eq!(second, TransportError::Timeout);

        let third = channel.send(&env).await.unwrap();
        assert_eq!(third, DeliveryResponse::new(200, json!({"ok": true})));

        assert_eq!(channel.attempts(), 3);
        assert_eq!(channel.sent()[0].id(), env.id());
    }
}
