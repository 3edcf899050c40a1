//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HttpDeliveryChannel**: broker への HTTP POST（本番用）
//! - **RecordingChannel**: 送信内容を記録するだけの開発・テスト用

pub mod http_channel;
pub mod recording;

pub use self::http_channel::HttpDeliveryChannel;
pub use self::recording::RecordingChannel;
