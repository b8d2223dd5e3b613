//! Transcription engine selector

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error when an unknown engine name is configured
#[derive(Debug, Clone, Error)]
#[error("Invalid engine: \"{input}\". Valid engines are: whisper-cli, gemini")]
pub struct InvalidEngineError {
    pub input: String,
}

/// Which transcription engine adapter to run jobs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineKind {
    /// External speech-to-text CLI spawned once per job
    #[default]
    WhisperCli,
    /// Google Gemini HTTP API
    Gemini,
}

impl EngineKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WhisperCli => "whisper-cli",
            Self::Gemini => "gemini",
        }
    }
}

impl FromStr for EngineKind {
    type Err = InvalidEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whisper-cli" | "whisper" | "cli" => Ok(Self::WhisperCli),
            "gemini" => Ok(Self::Gemini),
            _ => Err(InvalidEngineError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
