//! Memory-aware chunk reader
//!
//! Splits a file into bounded slices and processes them in small waves so
//! that at most `max_concurrent_chunks` buffers are alive at once. System
//! memory usage is sampled between waves; above the threshold the reader
//! cools down before reading more.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use futures::stream::{self, Stream};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::config::AppConfig;

use super::ports::{EngineError, MemoryProbe};

/// Pause taken when memory usage is above the threshold
pub const DEFAULT_PRESSURE_COOLDOWN: Duration = Duration::from_millis(100);

/// Chunk reader errors
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("Failed to read chunk: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chunk processing was cancelled")]
    Cancelled,

    #[error(transparent)]
    Processing(#[from] EngineError),
}

/// Progress callback, called with a percentage after each wave
pub type ChunkProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// One bounded slice of a file. Dropped as soon as its consumer is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Vec<u8>,
    pub index: usize,
    /// Byte offset of the first byte
    pub position: u64,
    pub size: usize,
    pub is_last: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkConfig {
    pub chunk_size: u64,
    pub max_concurrent_chunks: usize,
    /// Memory usage percent that triggers a cooldown
    pub memory_threshold: f64,
    pub cooldown: Duration,
}

impl ChunkConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            chunk_size: config.chunk_size_bytes(),
            max_concurrent_chunks: config.max_concurrent_chunks_or_default(),
            memory_threshold: f64::from(config.memory_threshold_or_default()),
            cooldown: DEFAULT_PRESSURE_COOLDOWN,
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::empty())
    }
}

/// Reads files in bounded chunks under a memory ceiling
#[derive(Clone)]
pub struct ChunkReader {
    config: ChunkConfig,
    probe: Arc<dyn MemoryProbe>,
}

impl ChunkReader {
    pub fn new(config: ChunkConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        Self { config, probe }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// `ceil(size / chunk_size)`
    pub fn total_chunks(&self, size: u64) -> usize {
        let chunk_size = self.config.chunk_size.max(1);
        usize::try_from(size.div_ceil(chunk_size)).unwrap_or(usize::MAX)
    }

    /// Sequential waves `process_in_chunks` needs for a file of `size` bytes
    pub fn total_waves(&self, size: u64) -> usize {
        self.total_chunks(size)
            .div_ceil(self.config.max_concurrent_chunks.max(1))
    }

    /// Whether memory usage is currently above the threshold
    pub fn under_pressure(&self) -> bool {
        self.probe.usage_percent() > self.config.memory_threshold
    }

    async fn relieve_pressure(&self) {
        if !self.under_pressure() {
            return;
        }
        warn!(
            threshold = self.config.memory_threshold,
            "memory pressure, cooling down"
        );
        tokio::time::sleep(self.config.cooldown).await;
        tokio::task::yield_now().await;
    }

    /// Process a file chunk by chunk, in order.
    ///
    /// Chunks are handed to `processor` in waves of up to
    /// `max_concurrent_chunks`; results come back in chunk order.
    /// `on_progress` receives `processed / total * 100` after each wave.
    /// The token is checked before every wave.
    pub async fn process_in_chunks<F, Fut, T>(
        &self,
        path: &Path,
        processor: F,
        on_progress: Option<ChunkProgressCallback>,
        token: &CancellationToken,
    ) -> Result<Vec<T>, ChunkError>
    where
        F: Fn(Chunk) -> Fut,
        Fut: Future<Output = Result<T, ChunkError>>,
    {
        let mut file = File::open(path).await?;
        let size = file.metadata().await?.len();
        let total = self.total_chunks(size);
        let wave_size = self.config.max_concurrent_chunks.max(1);

        debug!(path = %path.display(), size, total, "processing in chunks");

        if total == 0 {
            if let Some(cb) = &on_progress {
                cb(100.0);
            }
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(total);
        let mut position = 0u64;
        let mut index = 0usize;

        while index < total {
            if token.is_cancelled() {
                return Err(ChunkError::Cancelled);
            }

            let wave_end = (index + wave_size).min(total);
            let mut wave = Vec::with_capacity(wave_end - index);
            for i in index..wave_end {
                let chunk = read_chunk(&mut file, i, position, size, self.config.chunk_size).await?;
                position += chunk.size as u64;
                wave.push(processor(chunk));
            }

            results.extend(try_join_all(wave).await?);
            index = wave_end;

            if let Some(cb) = &on_progress {
                cb(index as f64 / total as f64 * 100.0);
            }

            self.relieve_pressure().await;
        }

        Ok(results)
    }

    /// Open a lazy, forward-only reader over a file.
    ///
    /// `chunk_size` overrides the configured chunk size for this stream only.
    pub async fn streaming_reader(
        &self,
        path: &Path,
        chunk_size: Option<u64>,
    ) -> Result<ChunkStream, ChunkError> {
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(ChunkStream {
            file,
            reader: self.clone(),
            chunk_size: chunk_size.unwrap_or(self.config.chunk_size),
            position: 0,
            size,
            index: 0,
        })
    }
}

async fn read_chunk(
    file: &mut File,
    index: usize,
    position: u64,
    size: u64,
    chunk_size: u64,
) -> Result<Chunk, ChunkError> {
    let len = chunk_size.max(1).min(size - position);
    let len = usize::try_from(len).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "chunk size exceeds address space")
    })?;
    let mut data = vec![0u8; len];
    file.read_exact(&mut data).await?;
    Ok(Chunk {
        data,
        index,
        position,
        size: len,
        is_last: position + len as u64 >= size,
    })
}

/// Forward-only chunk sequence over one file.
///
/// Finite and not restartable; every element is preceded by a memory
/// pressure check.
pub struct ChunkStream {
    file: File,
    reader: ChunkReader,
    chunk_size: u64,
    position: u64,
    size: u64,
    index: usize,
}

impl ChunkStream {
    /// Total file size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next chunk, or `None` once the file is exhausted
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, ChunkError> {
        if self.position >= self.size {
            return Ok(None);
        }
        self.reader.relieve_pressure().await;

        let chunk = read_chunk(
            &mut self.file,
            self.index,
            self.position,
            self.size,
            self.chunk_size,
        )
        .await?;
        self.position += chunk.size as u64;
        self.index += 1;
        Ok(Some(chunk))
    }

    /// Adapt into a `futures` stream
    pub fn into_stream(self) -> impl Stream<Item = Result<Chunk, ChunkError>> {
        stream::try_unfold(self, |mut reader| async move {
            Ok(reader.next_chunk().await?.map(|chunk| (chunk, reader)))
        })
    }
}
