//! Per-job transcription settings

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::InvalidModelSizeError;

/// Language value meaning "let the engine detect it"
pub const AUTO_LANGUAGE: &str = "auto";

/// All available model sizes
pub const ALL_MODEL_SIZES: &[ModelSize] = &[
    ModelSize::Tiny,
    ModelSize::Base,
    ModelSize::Small,
    ModelSize::Medium,
    ModelSize::Large,
];

/// Speech model size requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl FromStr for ModelSize {
    type Err = InvalidModelSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tiny" => Ok(Self::Tiny),
            "base" => Ok(Self::Base),
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            _ => Err(InvalidModelSizeError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings snapshot attached to every job.
/// Validated and defaulted by the caller; treated as immutable here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    pub language: String,
    pub model_size: ModelSize,
    pub output_dir: Option<PathBuf>,
}

impl JobSettings {
    /// True when the engine should detect the spoken language itself
    pub fn auto_language(&self) -> bool {
        self.language.is_empty() || self.language.eq_ignore_ascii_case(AUTO_LANGUAGE)
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            language: AUTO_LANGUAGE.to_string(),
            model_size: ModelSize::default(),
            output_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_sizes() {
        for size in ALL_MODEL_SIZES {
            assert_eq!(size.as_str().parse::<ModelSize>().unwrap(), *size);
        }
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!("LARGE".parse::<ModelSize>().unwrap(), ModelSize::Large);
        assert_eq!("  small ".parse::<ModelSize>().unwrap(), ModelSize::Small);
    }

    #[test]
    fn parse_invalid() {
        assert!("huge".parse::<ModelSize>().is_err());
        assert!("".parse::<ModelSize>().is_err());
    }

    #[test]
    fn default_settings() {
        let settings = JobSettings::default();
        assert_eq!(settings.model_size, ModelSize::Base);
        assert!(settings.auto_language());
        assert!(settings.output_dir.is_none());
    }

    #[test]
    fn explicit_language_is_not_auto() {
        let settings = JobSettings {
            language: "ko".to_string(),
            ..Default::default()
        };
        assert!(!settings.auto_language());
    }
}
