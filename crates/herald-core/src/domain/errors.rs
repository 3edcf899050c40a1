//! Errors - エラー型と分類
//!
//! Queued deliveries never surface errors to the caller; they are logged by
//! the worker. Everything here is what the caller can observe directly.

use std::time::Duration;

use thiserror::Error;

/// ErrorKind は呼び出し側から見たエラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input to an envelope build (no topics, blank topic, bad payload).
    Precondition,
    /// A bounded queue refused the message.
    Capacity,
    /// The network call itself failed (connect, timeout, undecodable body).
    Transport,
    /// The client is shutting down or did not shut down in time.
    Lifecycle,
}

/// Failure of one network call through a delivery channel.
///
/// A non-200 status is not a `TransportError`; it comes back as a regular
/// response with `is_success() == false`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("undecodable response body (status {status}): {message}")]
    Decode { status: u16, message: String },

    #[error("delivery panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("at least one topic is required")]
    NoTopics,

    #[error("topic at position {index} is blank")]
    InvalidTopic { index: usize },

    #[error("payload must be a JSON object, got {found}")]
    InvalidPayload { found: &'static str },

    #[error("message queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("publisher client is closed")]
    Closed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("shutdown timed out after {timeout:?}, workers still running: {remaining:?}")]
    ShutdownTimeout {
        timeout: Duration,
        remaining: Vec<String>,
    },
}

impl HeraldError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeraldError::NoTopics
            | HeraldError::InvalidTopic { .. }
            | HeraldError::InvalidPayload { .. } => ErrorKind::Precondition,
            HeraldError::QueueFull { .. } => ErrorKind::Capacity,
            HeraldError::Transport(_) => ErrorKind::Transport,
            HeraldError::Closed | HeraldError::ShutdownTimeout { .. } => ErrorKind::Lifecycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::no_topics(HeraldError::NoTopics, ErrorKind::Precondition)]
    #[case::blank_topic(HeraldError::InvalidTopic { index: 1 }, ErrorKind::Precondition)]
    #[case::payload(HeraldError::InvalidPayload { found: "array" }, ErrorKind::Precondition)]
    #[case::full(HeraldError::QueueFull { capacity: 3 }, ErrorKind::Capacity)]
    #[case::transport(HeraldError::Transport(TransportError::Timeout), ErrorKind::Transport)]
    #[case::closed(HeraldError::Closed, ErrorKind::Lifecycle)]
    fn kind_classifies_errors(#[case] err: HeraldError, #[case] expected: ErrorKind) {
        assert_eq!(err.kind(), expected);
    }

    #[test]
    fn transport_error_message_passes_through() {
        let err: HeraldError = TransportError::Connect("refused".into()).into();
        assert_eq!(err.to_string(), "connection failed: refused");
    }
}
