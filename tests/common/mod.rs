//! Shared fixtures for the library integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use batch_scribe::application::ports::{
    AudioInput, EngineError, NoPressure, ProgressSink, TranscriptionEngine,
};
use batch_scribe::application::{
    ChunkConfig, ChunkReader, PoolConfig, QueueConfig, QueueItem, QueueManager, TaskExecutor,
    WorkerPool,
};
use batch_scribe::domain::job::{JobId, JobSettings, Transcript, TranscriptMetadata};

/// Engine whose behaviour is driven by the input file name.
///
/// - names containing `corrupt` fail with a non-retryable format error
/// - the first `fail_first` calls per file fail with a transient error
/// - chunk inputs transcribe to `chunk<index>`
pub struct ScriptedEngine {
    pub fail_first: usize,
    pub delay: Duration,
    calls: Mutex<HashMap<String, usize>>,
    active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(fail_first: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fail_first,
            delay,
            calls: Mutex::new(HashMap::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.ends_with(name))
            .map(|(_, n)| *n)
            .sum()
    }
}

#[async_trait]
impl TranscriptionEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn transcribe(
        &self,
        input: &AudioInput,
        settings: &JobSettings,
        _on_progress: Option<ProgressSink>,
    ) -> Result<Transcript, EngineError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let text = match input {
            AudioInput::Chunk { index, .. } => format!("chunk{index}"),
            AudioInput::File(file) => {
                let key = file.path().display().to_string();
                if key.contains("corrupt") {
                    return Err(EngineError::UnsupportedFormat("corrupt stream".into()));
                }
                let attempt = {
                    let mut calls = self.calls.lock().unwrap();
                    let n = calls.entry(key).or_insert(0);
                    *n += 1;
                    *n
                };
                if attempt <= self.fail_first {
                    return Err(EngineError::EngineUnavailable("model not loaded".into()));
                }
                file.name().to_string()
            }
        };

        Ok(Transcript {
            text,
            metadata: TranscriptMetadata {
                language: settings.language.clone(),
                model_size: settings.model_size,
                timestamp: Utc::now(),
                chunks: 1,
            },
            confidence: None,
        })
    }
}

fn pool(
    engine: Arc<dyn TranscriptionEngine>,
    max_jobs: usize,
    task_timeout: Duration,
    large_file_threshold: u64,
    chunk_size: u64,
) -> WorkerPool {
    let chunks = ChunkReader::new(
        ChunkConfig {
            chunk_size,
            max_concurrent_chunks: 2,
            memory_threshold: 80.0,
            cooldown: Duration::from_millis(1),
        },
        Arc::new(NoPressure),
    );
    WorkerPool::new(
        TaskExecutor::new(engine, chunks, large_file_threshold),
        PoolConfig {
            max_workers: max_jobs,
            task_timeout,
            large_file_threshold,
        },
    )
}

/// Queue over a pool of `max_jobs` workers with short test timings
pub fn build_queue(
    engine: Arc<dyn TranscriptionEngine>,
    max_jobs: usize,
    max_retries: u32,
    large_file_threshold: u64,
    chunk_size: u64,
) -> QueueManager {
    let pool = pool(engine, max_jobs, Duration::from_secs(5), large_file_threshold, chunk_size);
    QueueManager::new(
        QueueConfig {
            max_concurrent_jobs: max_jobs,
            max_retries,
            retry_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(20),
        },
        Arc::new(pool),
    )
}

/// Single-worker queue with explicit retry delay and watchdog timeout
pub fn timed_queue(
    engine: Arc<dyn TranscriptionEngine>,
    max_retries: u32,
    retry_delay: Duration,
    task_timeout: Duration,
) -> QueueManager {
    let pool = pool(engine, 1, task_timeout, u64::MAX, 5 * 1024 * 1024);
    QueueManager::new(
        QueueConfig {
            max_concurrent_jobs: 1,
            max_retries,
            retry_delay,
            poll_interval: Duration::from_millis(20),
        },
        Arc::new(pool),
    )
}

pub fn simple_queue(engine: Arc<dyn TranscriptionEngine>, max_jobs: usize, max_retries: u32) -> QueueManager {
    build_queue(engine, max_jobs, max_retries, u64::MAX, 5 * 1024 * 1024)
}

/// Create files with the given names and sizes under `dir`
pub fn write_files(dir: &Path, files: &[(&str, usize)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, len)| {
            let path = dir.join(name);
            std::fs::write(&path, vec![7u8; *len]).unwrap();
            path
        })
        .collect()
}

/// Poll until the job reaches a terminal status
pub async fn wait_terminal(queue: &QueueManager, id: JobId) -> QueueItem {
    for _ in 0..500 {
        if let Some(item) = queue.get_item(id) {
            if item.status().is_terminal() {
                return item;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not reach a terminal status");
}
