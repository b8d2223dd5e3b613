//! Queue scheduling configuration

use std::time::Duration;

use crate::domain::config::AppConfig;

/// Safety-net poll interval of the dispatch loop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Scheduling parameters, immutable once the queue is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_concurrent_jobs: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub poll_interval: Duration,
}

impl QueueConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_jobs: config.max_concurrent_jobs_or_default(),
            max_retries: config.max_retries_or_default(),
            retry_delay: config.retry_delay_or_default().as_std(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::empty())
    }
}
