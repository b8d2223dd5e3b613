//! Transcription engine adapters

mod gemini;
mod progress_parser;
mod whisper_cli;

pub use gemini::GeminiEngine;
pub use progress_parser::{parse_progress_line, segment_text};
pub use whisper_cli::WhisperCliEngine;
