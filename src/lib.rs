//! BatchScribe - batch audio transcription orchestration
//!
//! This crate schedules transcription jobs for many audio files through a
//! priority queue, runs them on a bounded worker pool against a pluggable
//! speech-to-text engine, and aggregates per-file results into batch
//! progress. Large files are streamed to the engine in memory-aware chunks.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Value objects, entities, and errors
//! - **Application**: Queue, worker pool, batch workflow, chunk reader and port traits
//! - **Infrastructure**: Adapter implementations (speech-to-text CLI, Gemini, sysinfo, XDG config)
//! - **CLI**: Command-line interface, progress output, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
