//! App - アプリケーション層
//!
//! domain / ports / queue を組み合わせて公開 API を作る。
//!
//! # 主要コンポーネント
//! - **ClientBuilder**: 設定の検証と起動
//! - **PublisherClient**: publish / publish_force / close
//! - **WorkerPool**: worker の起動と drain 付き停止
//! - **worker_loop**: get → send → log のループ
//! - **Status**: 配送結果の集計と worker の状態

pub mod builder;
pub mod client;
pub mod status;
pub mod worker_loop;
pub mod worker_pool;

pub use self::builder::{BuildError, ClientBuilder};
pub use self::client::PublisherClient;
pub use self::status::{DeliveryCounts, WorkerState, WorkerStatus};
pub use self::worker_pool::WorkerPool;
