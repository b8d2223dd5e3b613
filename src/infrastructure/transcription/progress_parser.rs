//! Progress extraction from speech-to-text CLI output
//!
//! The CLI prints free-form text on both streams. Lines are matched against
//! a fixed list of shapes, first match wins. Anything unrecognised is ignored.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::application::ports::EngineProgress;
use crate::domain::job::ProcessingStage;

/// Audio length assumed when turning a segment timestamp into a percentage
const ASSUMED_AUDIO_SECS: f64 = 300.0;

/// Segment timestamps never push progress past this
const SEGMENT_PROGRESS_CAP: f64 = 90.0;

const LOADING_MODEL_PERCENT: f64 = 10.0;
const TRANSCRIBING_PERCENT: f64 = 25.0;

// [00:00.000 --> 00:30.000]
static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d{2}):(\d{2})\.(\d{3}) --> (\d{2}):(\d{2})\.(\d{3})\]").unwrap()
});

// 96%|█████████▌| 213478/222478 [03:06<00:07, 1146.02frames/s]
static TQDM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)%\|[^|]*\|\s*(\d+)/(\d+)\s*\[").unwrap());

// [1/3] (33.3%) Processing: talk.m4a
static FILE_COUNTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d+)/(\d+)\]\s*\((\d+(?:\.\d+)?)%\)\s*Processing:").unwrap()
});

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)%").unwrap());

/// Interpret one output line, if it carries progress
pub fn parse_progress_line(line: &str) -> Option<EngineProgress> {
    if let Some(caps) = SEGMENT_RE.captures(line) {
        let minutes: u64 = caps[4].parse().ok()?;
        let seconds: u64 = caps[5].parse().ok()?;
        let millis: u64 = caps[6].parse().ok()?;
        let position = Duration::from_millis((minutes * 60 + seconds) * 1000 + millis);
        let percent =
            (position.as_secs_f64() * 100.0 / ASSUMED_AUDIO_SECS).min(SEGMENT_PROGRESS_CAP);
        return Some(EngineProgress {
            stage: ProcessingStage::Transcribing,
            percent: Some(percent),
            elapsed: Some(position),
            remaining: None,
            message: Some(format!(
                "Transcribing: {:.1}% ({}:{:02})",
                percent, minutes, seconds
            )),
        });
    }

    if let Some(caps) = TQDM_RE.captures(line) {
        let percent: f64 = caps[1].parse().ok()?;
        let current: u64 = caps[2].parse().ok()?;
        let total: u64 = caps[3].parse().ok()?;
        return Some(transcribing(
            percent,
            format!("Transcribing: {}% ({}/{})", percent as u8, current, total),
        ));
    }

    if let Some(caps) = FILE_COUNTER_RE.captures(line) {
        let current: u64 = caps[1].parse().ok()?;
        let total: u64 = caps[2].parse().ok()?;
        let percent: f64 = caps[3].parse().ok()?;
        return Some(transcribing(
            percent,
            format!("Processing file: {}% ({}/{})", percent as u8, current, total),
        ));
    }

    if let Some(caps) = PERCENT_RE.captures(line) {
        let percent: f64 = caps[1].parse().ok()?;
        return Some(transcribing(
            percent,
            format!("Transcribing: {}%", percent as u8),
        ));
    }

    if line.contains("Loading Whisper model") {
        return Some(EngineProgress {
            stage: ProcessingStage::LoadingModel,
            percent: Some(LOADING_MODEL_PERCENT),
            message: Some("Loading Whisper model...".to_string()),
            ..Default::default()
        });
    }

    if line.contains("Transcribing") && !line.contains("Loading") {
        return Some(transcribing(
            TRANSCRIBING_PERCENT,
            "Transcribing audio...".to_string(),
        ));
    }

    None
}

/// Spoken text following a segment timestamp, if the line is a segment
pub fn segment_text(line: &str) -> Option<&str> {
    SEGMENT_RE
        .find(line)
        .map(|m| line[m.end()..].trim())
}

fn transcribing(percent: f64, message: String) -> EngineProgress {
    EngineProgress {
        stage: ProcessingStage::Transcribing,
        percent: Some(percent.clamp(0.0, 100.0)),
        message: Some(message),
        ..Default::default()
    }
}
