//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces:
//! the speech-to-text CLI, the Gemini API, system memory sampling
//! and XDG config storage.

pub mod config;
pub mod memory;
pub mod transcription;

// Re-export adapters
pub use config::XdgConfigStore;
pub use memory::SysinfoMemoryProbe;
pub use transcription::{GeminiEngine, WhisperCliEngine};
