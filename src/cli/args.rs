//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::domain::config::EngineKind;
use crate::domain::job::ModelSize;

/// BatchScribe - batch audio transcription with a priority job queue
#[derive(Parser, Debug)]
#[command(name = "batch-scribe")]
#[command(version)]
#[command(about = "Transcribe batches of audio files through a priority job queue")]
#[command(long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe files as one batch
    Run(RunArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options for `run`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Audio files, or directories to scan for audio files
    #[arg(required = true, value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Also scan subdirectories of directory inputs
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Queue priority for every file (higher runs first)
    #[arg(short = 'p', long, default_value_t = 0, allow_negative_numbers = true)]
    pub priority: i32,

    /// Maximum jobs running at once
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Automatic retries per file after a transient failure
    #[arg(short = 'r', long, value_name = "N")]
    pub retries: Option<u32>,

    /// Spoken language code, or "auto" to detect
    #[arg(short = 'l', long, value_name = "LANG")]
    pub language: Option<String>,

    /// Speech model size
    #[arg(short = 'm', long, value_name = "SIZE")]
    pub model: Option<ModelArg>,

    /// Write `<name>.txt` transcripts here instead of printing them
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Transcription engine
    #[arg(short = 'e', long)]
    pub engine: Option<EngineArg>,

    /// Per-attempt time limit (e.g., 90s, 5m)
    #[arg(long, value_name = "TIME")]
    pub timeout: Option<String>,
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Model size argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl From<ModelArg> for ModelSize {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Tiny => ModelSize::Tiny,
            ModelArg::Base => ModelSize::Base,
            ModelArg::Small => ModelSize::Small,
            ModelArg::Medium => ModelSize::Medium,
            ModelArg::Large => ModelSize::Large,
        }
    }
}

/// Engine argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    WhisperCli,
    Gemini,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::WhisperCli => EngineKind::WhisperCli,
            EngineArg::Gemini => EngineKind::Gemini,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "api_key",
    "engine",
    "engine_command",
    "language",
    "model_size",
    "output_dir",
    "max_file_size_mb",
    "queue.max_concurrent_jobs",
    "queue.max_retries",
    "queue.retry_delay",
    "queue.task_timeout",
    "chunking.chunk_size_mb",
    "chunking.max_concurrent_chunks",
    "chunking.memory_threshold",
    "chunking.large_file_threshold_mb",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
