//! Ports - 外部システムへのインターフェース
//!
//! The broker is reached only through `DeliveryChannel`. The HTTP
//! implementation lives in `impls`; tests swap in `RecordingChannel`.

pub mod delivery_channel;

pub use self::delivery_channel::{DeliveryChannel, DeliveryResponse, SUCCESS_STATUS};
pub use crate::domain::TransportError;
