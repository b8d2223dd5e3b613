//! Domain error types

use std::path::PathBuf;

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number><unit> with units ms, s, m, h (e.g., 500ms, 30s, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when an invalid model size is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid model size: \"{input}\". Valid sizes are: tiny, base, small, medium, large")]
pub struct InvalidModelSizeError {
    pub input: String,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}

/// Reason a file was rejected before it could be enqueued
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),

    #[error("No file extension found")]
    MissingExtension,

    #[error("Format '{extension}' is not supported. Supported formats: {supported}")]
    UnsupportedFormat { extension: String, supported: String },

    #[error("File is too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("Failed to inspect file: {0}")]
    Io(String),
}
