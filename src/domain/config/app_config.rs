//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobSettings, ModelSize, AUTO_LANGUAGE};
use crate::domain::time::Duration;

use super::EngineKind;

/// Default external engine command
pub const DEFAULT_ENGINE_COMMAND: &str = "speech-to-text";

pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_CHUNK_SIZE_MB: u64 = 5;
pub const DEFAULT_MAX_CONCURRENT_CHUNKS: usize = 3;
pub const DEFAULT_MEMORY_THRESHOLD: u8 = 80;
pub const DEFAULT_LARGE_FILE_THRESHOLD_MB: u64 = 100;
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 2048;

const MB: u64 = 1024 * 1024;

/// Scheduling section (`[queue]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSection {
    pub max_concurrent_jobs: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<String>,
    pub task_timeout: Option<String>,
}

/// Large-file streaming section (`[chunking]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size_mb: Option<u64>,
    pub max_concurrent_chunks: Option<usize>,
    pub memory_threshold: Option<u8>,
    pub large_file_threshold_mb: Option<u64>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub engine: Option<String>,
    pub engine_command: Option<String>,
    pub language: Option<String>,
    pub model_size: Option<String>,
    pub output_dir: Option<String>,
    pub max_file_size_mb: Option<u64>,
    pub queue: Option<QueueSection>,
    pub chunking: Option<ChunkingConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            api_key: None,
            engine: Some(EngineKind::default().to_string()),
            engine_command: Some(DEFAULT_ENGINE_COMMAND.to_string()),
            language: Some(AUTO_LANGUAGE.to_string()),
            model_size: Some(ModelSize::default().to_string()),
            output_dir: None,
            max_file_size_mb: Some(DEFAULT_MAX_FILE_SIZE_MB),
            queue: Some(QueueSection {
                max_concurrent_jobs: Some(DEFAULT_MAX_CONCURRENT_JOBS),
                max_retries: Some(DEFAULT_MAX_RETRIES),
                retry_delay: Some(Duration::default_retry_delay().to_string()),
                task_timeout: Some(Duration::default_task_timeout().to_string()),
            }),
            chunking: Some(ChunkingConfig {
                chunk_size_mb: Some(DEFAULT_CHUNK_SIZE_MB),
                max_concurrent_chunks: Some(DEFAULT_MAX_CONCURRENT_CHUNKS),
                memory_threshold: Some(DEFAULT_MEMORY_THRESHOLD),
                large_file_threshold_mb: Some(DEFAULT_LARGE_FILE_THRESHOLD_MB),
            }),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            api_key: other.api_key.or(self.api_key),
            engine: other.engine.or(self.engine),
            engine_command: other.engine_command.or(self.engine_command),
            language: other.language.or(self.language),
            model_size: other.model_size.or(self.model_size),
            output_dir: other.output_dir.or(self.output_dir),
            max_file_size_mb: other.max_file_size_mb.or(self.max_file_size_mb),
            queue: Self::merge_queue(self.queue, other.queue),
            chunking: Self::merge_chunking(self.chunking, other.chunking),
        }
    }

    fn merge_queue(base: Option<QueueSection>, other: Option<QueueSection>) -> Option<QueueSection> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(QueueSection {
                max_concurrent_jobs: o.max_concurrent_jobs.or(b.max_concurrent_jobs),
                max_retries: o.max_retries.or(b.max_retries),
                retry_delay: o.retry_delay.or(b.retry_delay),
                task_timeout: o.task_timeout.or(b.task_timeout),
            }),
        }
    }

    fn merge_chunking(
        base: Option<ChunkingConfig>,
        other: Option<ChunkingConfig>,
    ) -> Option<ChunkingConfig> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(ChunkingConfig {
                chunk_size_mb: o.chunk_size_mb.or(b.chunk_size_mb),
                max_concurrent_chunks: o.max_concurrent_chunks.or(b.max_concurrent_chunks),
                memory_threshold: o.memory_threshold.or(b.memory_threshold),
                large_file_threshold_mb: o.large_file_threshold_mb.or(b.large_file_threshold_mb),
            }),
        }
    }

    /// Get engine as parsed EngineKind, or default if not set/invalid
    pub fn engine_or_default(&self) -> EngineKind {
        self.engine
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn engine_command_or_default(&self) -> &str {
        self.engine_command
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_ENGINE_COMMAND)
    }

    /// Get model size as parsed ModelSize, or default if not set/invalid
    pub fn model_size_or_default(&self) -> ModelSize {
        self.model_size
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Build the per-job settings snapshot
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            language: self
                .language
                .clone()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| AUTO_LANGUAGE.to_string()),
            model_size: self.model_size_or_default(),
            output_dir: self.output_dir.as_ref().map(PathBuf::from),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.unwrap_or(DEFAULT_MAX_FILE_SIZE_MB).saturating_mul(MB)
    }

    pub fn max_concurrent_jobs_or_default(&self) -> usize {
        self.queue
            .as_ref()
            .and_then(|q| q.max_concurrent_jobs)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_JOBS)
    }

    pub fn max_retries_or_default(&self) -> u32 {
        self.queue
            .as_ref()
            .and_then(|q| q.max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES)
    }

    /// Get retry delay as parsed Duration, or default if not set/invalid
    pub fn retry_delay_or_default(&self) -> Duration {
        self.queue
            .as_ref()
            .and_then(|q| q.retry_delay.as_ref())
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_retry_delay)
    }

    /// Get task timeout as parsed Duration, or default if not set/invalid
    pub fn task_timeout_or_default(&self) -> Duration {
        self.queue
            .as_ref()
            .and_then(|q| q.task_timeout.as_ref())
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_task_timeout)
    }

    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunking
            .as_ref()
            .and_then(|c| c.chunk_size_mb)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CHUNK_SIZE_MB)
            .saturating_mul(MB)
    }

    pub fn max_concurrent_chunks_or_default(&self) -> usize {
        self.chunking
            .as_ref()
            .and_then(|c| c.max_concurrent_chunks)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_CHUNKS)
    }

    /// Memory usage percent above which chunk processing cools down
    pub fn memory_threshold_or_default(&self) -> u8 {
        self.chunking
            .as_ref()
            .and_then(|c| c.memory_threshold)
            .filter(|p| (1..=100).contains(p))
            .unwrap_or(DEFAULT_MEMORY_THRESHOLD)
    }

    pub fn large_file_threshold_bytes(&self) -> u64 {
        self.chunking
            .as_ref()
            .and_then(|c| c.large_file_threshold_mb)
            .unwrap_or(DEFAULT_LARGE_FILE_THRESHOLD_MB)
            .saturating_mul(MB)
    }
}
