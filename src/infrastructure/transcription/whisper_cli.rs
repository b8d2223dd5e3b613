//! Speech-to-text CLI adapter
//!
//! Spawns the configured command once per input:
//! `<command> <file> --language <lang> --model-size <size>`.
//! Both output streams are scanned for progress, stdout carries the text.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use super::progress_parser::{parse_progress_line, segment_text};
use crate::application::ports::{
    AudioInput, EngineError, EngineProgress, ProgressSink, TranscriptionEngine,
};
use crate::domain::audio::AudioFormat;
use crate::domain::job::{JobSettings, ProcessingStage, Transcript, TranscriptMetadata};

/// Stderr lines kept for the failure message
const STDERR_TAIL: usize = 5;

/// Chunk bytes spilled to disk for the CLI to read
struct TempChunkFile {
    path: PathBuf,
}

impl TempChunkFile {
    async fn write(data: &[u8], format: AudioFormat) -> Result<Self, EngineError> {
        let path = std::env::temp_dir().join(format!(
            "batch-scribe-{}.{}",
            Uuid::new_v4(),
            format.extension()
        ));
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| EngineError::Internal(format!("Failed to stage chunk: {}", e)))?;
        Ok(Self { path })
    }
}

impl Drop for TempChunkFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Engine backed by an external speech-to-text executable
pub struct WhisperCliEngine {
    command: String,
}

impl WhisperCliEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn build_args(path: &Path, settings: &JobSettings) -> Vec<String> {
        vec![
            path.to_string_lossy().to_string(),
            "--language".to_string(),
            settings.language.clone(),
            "--model-size".to_string(),
            settings.model_size.to_string(),
        ]
    }

    async fn run(
        &self,
        path: &Path,
        settings: &JobSettings,
        on_progress: Option<&ProgressSink>,
    ) -> Result<String, EngineError> {
        let args = Self::build_args(path, settings);
        debug!(command = %self.command, ?args, "spawning transcription command");

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::EngineUnavailable(format!("{} not found in PATH", self.command))
                } else {
                    EngineError::EngineUnavailable(format!(
                        "Failed to start {}: {}",
                        self.command, e
                    ))
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Internal("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Internal("stderr not captured".to_string()))?;

        let (text, stderr_tail) = tokio::join!(
            collect_stdout(stdout, on_progress),
            collect_stderr(stderr, on_progress)
        );
        let text = text?;
        let stderr_tail = stderr_tail?;

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::Internal(format!("Failed to wait for {}: {}", self.command, e)))?;

        if !status.success() {
            let detail = stderr_tail.join("\n");
            warn!(command = %self.command, %status, "transcription command failed");
            if detail.to_lowercase().contains("unsupported format") {
                return Err(EngineError::UnsupportedFormat(detail));
            }
            return Err(EngineError::Internal(if detail.is_empty() {
                format!("{} exited with {}", self.command, status)
            } else {
                format!("{} exited with {}: {}", self.command, status, detail)
            }));
        }

        Ok(text)
    }
}

fn emit(on_progress: Option<&ProgressSink>, line: &str) {
    if let (Some(sink), Some(progress)) = (on_progress, parse_progress_line(line)) {
        sink(progress);
    }
}

/// Read stdout to the end, forwarding progress and keeping the spoken text
async fn collect_stdout<R>(reader: R, on_progress: Option<&ProgressSink>) -> Result<String, EngineError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut text = Vec::new();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| EngineError::Internal(format!("Failed to read output: {}", e)))?
    {
        emit(on_progress, &line);
        if let Some(spoken) = segment_text(&line) {
            if !spoken.is_empty() {
                text.push(spoken.to_string());
            }
        } else if parse_progress_line(&line).is_none() && !line.trim().is_empty() {
            text.push(line.trim().to_string());
        }
    }
    Ok(text.join("\n"))
}

/// Read stderr to the end, forwarding progress and keeping the last few lines
async fn collect_stderr<R>(
    reader: R,
    on_progress: Option<&ProgressSink>,
) -> Result<Vec<String>, EngineError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| EngineError::Internal(format!("Failed to read output: {}", e)))?
    {
        emit(on_progress, &line);
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Ok(tail.into())
}

#[async_trait]
impl TranscriptionEngine for WhisperCliEngine {
    fn name(&self) -> &'static str {
        "whisper-cli"
    }

    async fn transcribe(
        &self,
        input: &AudioInput,
        settings: &JobSettings,
        on_progress: Option<ProgressSink>,
    ) -> Result<Transcript, EngineError> {
        let text = match input {
            AudioInput::File(file) => self.run(file.path(), settings, on_progress.as_ref()).await?,
            AudioInput::Chunk { data, format, .. } => {
                let staged = TempChunkFile::write(data, *format).await?;
                self.run(&staged.path, settings, on_progress.as_ref()).await?
            }
        };

        if let Some(sink) = &on_progress {
            sink(EngineProgress {
                stage: ProcessingStage::Saving,
                percent: Some(100.0),
                message: Some("Transcription complete".to_string()),
                ..Default::default()
            });
        }

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
