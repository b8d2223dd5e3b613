//! Time value objects

mod duration;

pub use duration::{Duration, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TASK_TIMEOUT_SECS};
