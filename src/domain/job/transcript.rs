//! Transcription results

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ModelSize;

/// Metadata the engine reports alongside the text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMetadata {
    pub language: String,
    pub model_size: ModelSize,
    pub timestamp: DateTime<Utc>,
    /// Number of input chunks the text was assembled from (1 for whole files)
    pub chunks: usize,
}

/// Text produced by the engine for one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub metadata: TranscriptMetadata,
    pub confidence: Option<f64>,
}

impl Transcript {
    /// Join per-chunk transcripts in order.
    /// Confidence is the mean over the chunks that reported one.
    pub fn merge(parts: Vec<Transcript>, fallback: TranscriptMetadata) -> Self {
        let confidences: Vec<f64> = parts.iter().filter_map(|p| p.confidence).collect();
        let confidence = if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
        };

        let chunks = parts.len();
        let metadata = parts
            .first()
            .map(|p| TranscriptMetadata {
                chunks,
                ..p.metadata.clone()
            })
            .unwrap_or(TranscriptMetadata { chunks, ..fallback });

        let text = parts
            .into_iter()
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            text,
            metadata,
            confidence,
        }
    }
}

/// Outcome of a completed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub transcript: Transcript,
    /// Wall time of the successful attempt
    pub processing_time: Duration,
    /// Number of attempts, including the successful one
    pub attempts: u32,
}
