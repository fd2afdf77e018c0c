//! Coordination of external callers around the single shared connection:
//! journaling, busy-retry with backoff and FIFO write serialization.
//!
//! Graph algorithms never suspend; the only waits are queue admission and
//! retry backoff.

mod journal;
mod retry;
mod write_queue;

pub use retry::{backoff_delay, with_retry};
pub use write_queue::WriteQueue;
