//! Priority job queue
//!
//! `QueueManager` schedules jobs onto the worker pool by priority, retries
//! transient failures after a fixed delay and publishes lifecycle events.

mod config;
mod error;
mod events;
mod item;
mod manager;
mod stats;

pub use config::{QueueConfig, DEFAULT_POLL_INTERVAL};
pub use error::{JobError, QueueError};
pub use events::QueueEvent;
pub use item::{
    AddOptions, JobCallbacks, JobCompleteCallback, JobErrorCallback, JobProgressCallback,
    QueueItem,
};
pub use manager::QueueManager;
pub use stats::{QueueStats, ROLLING_WINDOW};
