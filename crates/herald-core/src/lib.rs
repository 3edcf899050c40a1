//! herald-core
//!
//! Buffered message publishing to an HTTP broker gateway.
//!
//! `publish` drops the message into an in-process queue and returns; a fixed
//! pool of tokio workers delivers queued messages over HTTP. `publish_force`
//! skips the queue and returns the broker's answer. `close` drains the queue
//! and waits for the workers.
//!
//! # モジュール構成
//! - **domain**: envelope, ids, settings, errors
//! - **ports**: DeliveryChannel
//! - **impls**: HttpDeliveryChannel, RecordingChannel
//! - **queue**: QueueEntry, MessageQueue
//! - **app**: ClientBuilder, PublisherClient, WorkerPool

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;

pub use app::{BuildError, ClientBuilder, DeliveryCounts, PublisherClient, WorkerState, WorkerStatus};
pub use domain::{
    Envelope, ErrorKind, HeraldError, MessageId, OverflowPolicy, QueueCapacity, Settings,
    TransportError,
};
pub use ports::{DeliveryChannel, DeliveryResponse};
