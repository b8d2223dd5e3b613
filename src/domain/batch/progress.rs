//! Batch progress snapshots

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{BatchFileStatus, FileStatus};

/// Read-only snapshot of a batch, recomputed on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    pub current_file_index: usize,
    /// 0..=100
    pub overall_progress: f64,
    pub current_file: Option<String>,
    pub estimated_time_remaining: Option<Duration>,
}

impl BatchProgress {
    /// Derive a snapshot from per-file statuses.
    ///
    /// The ETA extrapolates elapsed time over the finished fraction and is
    /// independent of the queue's rolling-average estimate.
    pub fn compute(statuses: &[BatchFileStatus], elapsed: Duration) -> Self {
        let total_files = statuses.len();
        let completed_files = count(statuses, FileStatus::Completed);
        let failed_files = count(statuses, FileStatus::Error);
        let current_file_index = completed_files + failed_files;

        let overall_progress = if total_files == 0 {
            0.0
        } else {
            current_file_index as f64 / total_files as f64 * 100.0
        };

        let current_file = statuses
            .iter()
            .find(|s| s.status == FileStatus::Processing)
            .map(|s| s.file.name().to_string());

        let estimated_time_remaining = if overall_progress >= 100.0 {
            Some(Duration::ZERO)
        } else if overall_progress > 0.0 {
            Some(elapsed.mul_f64((100.0 - overall_progress) / overall_progress))
        } else {
            None
        };

        Self {
            total_files,
            completed_files,
            failed_files,
            current_file_index,
            overall_progress,
            current_file,
            estimated_time_remaining,
        }
    }

    /// Every file has reached a terminal status
    pub fn is_complete(&self) -> bool {
        self.total_files > 0 && self.current_file_index == self.total_files
    }
}

fn count(statuses: &[BatchFileStatus], status: FileStatus) -> usize {
    statuses.iter().filter(|s| s.status == status).count()
}

/// Summary figures reported when a batch resolves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    pub total_processing_time: Duration,
    pub average_processing_time: Duration,
}

impl BatchStatistics {
    pub fn from_statuses(statuses: &[BatchFileStatus]) -> Self {
        let times: Vec<Duration> = statuses
            .iter()
            .filter_map(|s| s.result.as_ref().map(|r| r.processing_time))
            .collect();
        let total_processing_time: Duration = times.iter().sum();
        let average_processing_time = if times.is_empty() {
            Duration::ZERO
        } else {
            total_processing_time / times.len() as u32
        };

        Self {
            total_files: statuses.len(),
            completed_files: count(statuses, FileStatus::Completed),
            failed_files: count(statuses, FileStatus::Error),
            total_processing_time,
            average_processing_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::{AudioFile, AudioFormat};
    use crate::domain::job::{JobResult, ModelSize, Transcript, TranscriptMetadata};
    use chrono::Utc;

    fn status(name: &str, status: FileStatus) -> BatchFileStatus {
        let mut s = BatchFileStatus::pending(AudioFile::new(name, 1, AudioFormat::Wav));
        s.status = status;
        s
    }

    fn result(secs: u64) -> JobResult {
        JobResult {
            transcript: Transcript {
                text: "x".to_string(),
                metadata: TranscriptMetadata {
                    language: "en".to_string(),
                    model_size: ModelSize::Base,
                    timestamp: Utc::now(),
                    chunks: 1,
                },
                confidence: None,
            },
            processing_time: Duration::from_secs(secs),
            attempts: 1,
        }
    }

    #[test]
    fn empty_batch_has_no_progress() {
        let progress = BatchProgress::compute(&[], Duration::from_secs(3));
        assert_eq!(progress.overall_progress, 0.0);
        assert!(progress.estimated_time_remaining.is_none());
        assert!(!progress.is_complete());
    }

    #[test]
    fn progress_counts_terminal_files() {
        let statuses = vec![
            status("a.wav", FileStatus::Completed),
            status("b.wav", FileStatus::Error),
            status("c.wav", FileStatus::Processing),
            status("d.wav", FileStatus::Pending),
        ];
        let progress = BatchProgress::compute(&statuses, Duration::from_secs(10));
        assert_eq!(progress.total_files, 4);
        assert_eq!(progress.completed_files, 1);
        assert_eq!(progress.failed_files, 1);
        assert_eq!(progress.current_file_index, 2);
        assert_eq!(progress.overall_progress, 50.0);
        assert_eq!(progress.current_file.as_deref(), Some("c.wav"));
    }

    #[test]
    fn eta_extrapolates_elapsed_time() {
        let statuses = vec![
            status("a.wav", FileStatus::Completed),
            status("b.wav", FileStatus::Pending),
            status("c.wav", FileStatus::Pending),
            status("d.wav", FileStatus::Pending),
        ];
        // 25% done after 10s -> 30s remaining
        let progress = BatchProgress::compute(&statuses, Duration::from_secs(10));
        assert_eq!(progress.estimated_time_remaining, Some(Duration::from_secs(30)));
    }

    #[test]
    fn finished_batch_is_complete() {
        let statuses = vec![
            status("a.wav", FileStatus::Completed),
            status("b.wav", FileStatus::Error),
        ];
        let progress = BatchProgress::compute(&statuses, Duration::from_secs(1));
        assert!(progress.is_complete());
        assert_eq!(progress.overall_progress, 100.0);
        assert_eq!(progress.estimated_time_remaining, Some(Duration::ZERO));
        assert!(progress.current_file.is_none());
    }

    #[test]
    fn statistics_average_completed_runs() {
        let mut a = status("a.wav", FileStatus::Pending);
        a.mark_completed(result(2));
        let mut b = status("b.wav", FileStatus::Pending);
        b.mark_completed(result(4));
        let mut c = status("c.wav", FileStatus::Pending);
        c.mark_error("boom");

        let stats = BatchStatistics::from_statuses(&[a, b, c]);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.completed_files, 2);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.total_processing_time, Duration::from_secs(6));
        assert_eq!(stats.average_processing_time, Duration::from_secs(3));
    }
}
