//! Queue module: entries and the in-memory FIFO between producers and workers.
//!
//! The queue is purely in-memory; anything still queued when the process
//! dies is lost.

mod entry;
mod memory;

pub use entry::QueueEntry;
pub use memory::MessageQueue;
