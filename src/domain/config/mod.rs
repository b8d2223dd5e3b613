//! Configuration domain module

mod app_config;
mod engine_kind;

pub use app_config::{AppConfig, ChunkingConfig, QueueSection};
pub use engine_kind::{EngineKind, InvalidEngineError};
