//! Audio format allow-list

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::ValidationError;

/// Every format accepted for transcription, in display order
pub const SUPPORTED_FORMATS: &[AudioFormat] = &[
    AudioFormat::M4a,
    AudioFormat::Wav,
    AudioFormat::Mp3,
    AudioFormat::Aac,
    AudioFormat::Flac,
    AudioFormat::Ogg,
    AudioFormat::Webm,
];

/// Supported audio container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    M4a,
    Wav,
    Mp3,
    Aac,
    Flac,
    Ogg,
    Webm,
}

impl AudioFormat {
    /// Get the canonical file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::M4a => "m4a",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Webm => "webm",
        }
    }

    /// Get the MIME type string
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::M4a => "audio/mp4",
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mp3",
            Self::Aac => "audio/aac",
            Self::Flac => "audio/flac",
            Self::Ogg => "audio/ogg",
            Self::Webm => "audio/webm",
        }
    }

    /// Comma-separated list of supported extensions, for error messages
    pub fn supported_list() -> String {
        SUPPORTED_FORMATS
            .iter()
            .map(AudioFormat::extension)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for AudioFormat {
    type Err = ValidationError;

    /// Parse a file extension (case-insensitive, leading dot allowed)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ext = s.trim().trim_start_matches('.').to_lowercase();
        SUPPORTED_FORMATS
            .iter()
            .copied()
            .find(|f| f.extension() == ext)
            .ok_or_else(|| ValidationError::UnsupportedFormat {
                extension: ext,
                supported: Self::supported_list(),
            })
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}
