//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod config;
pub mod engine;
pub mod memory;

// Re-export common types
pub use config::ConfigStore;
pub use engine::{AudioInput, EngineError, EngineProgress, ProgressSink, TranscriptionEngine};
pub use memory::{MemoryProbe, NoPressure};
