//! Domain model (envelope, ids, settings, errors).

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod settings;

pub use self::envelope::{Envelope, TopicMessage, combine_topics};
pub use self::errors::{ErrorKind, HeraldError, TransportError};
pub use self::ids::MessageId;
pub use self::settings::{OverflowPolicy, QueueCapacity, Settings, DEFAULT_WORKER_COUNT, PUBLISH_PATH};
