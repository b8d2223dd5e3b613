//! Queue statistics

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

/// Number of completed durations kept for the rolling average
pub const ROLLING_WINDOW: usize = 100;

/// Snapshot returned by `QueueManager::get_stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Mean over the most recent completed jobs
    pub average_processing_time: Duration,
    /// `pending x average_processing_time`
    pub estimated_time_remaining: Duration,
}

impl QueueStats {
    /// Total items ever added
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed + self.cancelled
    }
}

/// Bounded window of recent processing times
#[derive(Debug, Clone)]
pub(crate) struct DurationWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl DurationWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }
}

impl Default for DurationWindow {
    fn default() -> Self {
        Self::new(ROLLING_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_averages_zero() {
        assert_eq!(DurationWindow::default().average(), Duration::ZERO);
    }

    #[test]
    fn window_drops_oldest() {
        let mut window = DurationWindow::new(2);
        window.push(Duration::from_secs(10));
        window.push(Duration::from_secs(2));
        window.push(Duration::from_secs(4));
        assert_eq!(window.average(), Duration::from_secs(3));
    }

    #[test]
    fn total_sums_every_status() {
        let stats = QueueStats {
            pending: 1,
            processing: 2,
            completed: 3,
            failed: 4,
            cancelled: 5,
            ..Default::default()
        };
        assert_eq!(stats.total(), 15);
    }
}
