//! Batch domain module

mod file_status;
mod progress;

pub use file_status::{BatchFileStatus, FileStatus};
pub use progress::{BatchProgress, BatchStatistics};
