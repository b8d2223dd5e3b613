//! Batch runner behind `batch-scribe run`

use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::application::ports::{ConfigStore, MemoryProbe, TranscriptionEngine};
use crate::application::{
    expand_inputs, BatchCallbacks, BatchOptions, BatchWorkflow, ChunkConfig, ChunkReader, InvalidFile,
    PoolConfig, QueueConfig, QueueManager, TaskExecutor, ValidationRules, WorkerPool,
};
use crate::domain::batch::{BatchFileStatus, BatchProgress, FileStatus};
use crate::domain::config::{AppConfig, EngineKind, QueueSection};
use crate::domain::job::ModelSize;
use crate::infrastructure::{GeminiEngine, SysinfoMemoryProbe, WhisperCliEngine, XdgConfigStore};

use super::args::RunArgs;
use super::presenter::{BatchBar, Presenter};
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment variable overriding the engine executable
pub const ENGINE_COMMAND_ENV: &str = "BATCH_SCRIBE_ENGINE_COMMAND";

/// Config layer contributed by the environment
pub fn env_config() -> AppConfig {
    AppConfig {
        api_key: env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty()),
        engine_command: env::var(ENGINE_COMMAND_ENV).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    }
}

/// Config layer contributed by `run` flags
pub fn cli_config(args: &RunArgs) -> AppConfig {
    let queue = QueueSection {
        max_concurrent_jobs: args.concurrency,
        max_retries: args.retries,
        retry_delay: None,
        task_timeout: args.timeout.clone(),
    };
    AppConfig {
        engine: args.engine.map(|e| EngineKind::from(e).to_string()),
        language: args.language.clone(),
        model_size: args.model.map(|m| ModelSize::from(m).to_string()),
        output_dir: args
            .output_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        queue: (queue != QueueSection::default()).then_some(queue),
        ..Default::default()
    }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    load_merged_config_from(&XdgConfigStore::new(), cli_config).await
}

/// Merge: defaults < file < env < cli
pub async fn load_merged_config_from<S: ConfigStore>(store: &S, cli_config: AppConfig) -> AppConfig {
    AppConfig::defaults()
        .merge(store.load_or_empty().await)
        .merge(env_config())
        .merge(cli_config)
}

/// Instantiate the configured engine adapter
pub fn build_engine(config: &AppConfig) -> Result<Arc<dyn TranscriptionEngine>, String> {
    match config.engine_or_default() {
        EngineKind::WhisperCli => Ok(Arc::new(WhisperCliEngine::new(
            config.engine_command_or_default(),
        ))),
        EngineKind::Gemini => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                "Missing API key. Set GEMINI_API_KEY environment variable or run 'batch-scribe config set api_key <key>'".to_string()
            })?;
            Ok(Arc::new(
                GeminiEngine::new(api_key)
                    .with_request_timeout(config.task_timeout_or_default().as_std()),
            ))
        }
    }
}

/// Wire probe → chunk reader → executor → pool → queue → batch workflow
pub fn build_workflow(
    config: &AppConfig,
    engine: Arc<dyn TranscriptionEngine>,
    probe: Arc<dyn MemoryProbe>,
) -> BatchWorkflow {
    let chunks = ChunkReader::new(ChunkConfig::from_app_config(config), probe);
    let executor = TaskExecutor::new(engine, chunks, config.large_file_threshold_bytes());
    let pool = Arc::new(WorkerPool::new(executor, PoolConfig::from_app_config(config)));
    let queue = QueueManager::new(QueueConfig::from_app_config(config), pool);
    BatchWorkflow::new(queue, ValidationRules::from_app_config(config))
}

/// Transcribe `args.files` as one batch; directories are expanded into
/// the audio files they contain
pub async fn run_batch(args: RunArgs, config: AppConfig) -> ExitCode {
    let presenter = Presenter::new();

    let engine = match build_engine(&config) {
        Ok(engine) => engine,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let inputs = expand_inputs(&args.files, args.recursive);
    info!(engine = engine.name(), files = inputs.len(), "starting run");

    let shutdown = ShutdownSignal::new();
    if let Err(e) = shutdown.setup() {
        presenter.error(&format!("Failed to setup signal handler: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }

    let settings = config.job_settings();
    let workflow = build_workflow(&config, engine, Arc::new(SysinfoMemoryProbe::new()));
    workflow.queue().start();

    let bar: Arc<OnceLock<BatchBar>> = Arc::new(OnceLock::new());
    let callbacks = BatchCallbacks {
        on_validation_error: Some(Arc::new(move |invalid: &[InvalidFile]| {
            presenter.rejected(invalid)
        })),
        on_progress: Some({
            let bar = Arc::clone(&bar);
            Arc::new(move |progress: &BatchProgress| {
                if let Some(bar) = bar.get() {
                    bar.update(progress);
                }
            })
        }),
        on_file_status: Some({
            let bar = Arc::clone(&bar);
            Arc::new(move |status: &BatchFileStatus| {
                if let Some(bar) = bar.get() {
                    bar.file_settled(status);
                }
            })
        }),
        on_complete: None,
    };

    let options = BatchOptions {
        priority: args.priority,
        max_retries: None,
    };
    let report = match workflow
        .start_batch(&inputs, settings.clone(), options, callbacks)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            presenter.error(&e.to_string());
            workflow.queue().stop();
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let progress_bar = bar.get_or_init(|| presenter.batch_bar(report.valid.len()));
    if let Some(progress) = workflow.get_batch_progress() {
        progress_bar.update(&progress);
    }

    let token = shutdown.token();
    let statuses = tokio::select! {
        statuses = workflow.wait_for_completion() => statuses.unwrap_or_default(),
        _ = token.cancelled() => {
            if let Err(e) = workflow.cancel_batch() {
                debug!(error = %e, "nothing to cancel");
            }
            presenter.warn("Interrupted, batch cancelled");
            workflow.file_statuses()
        }
    };
    progress_bar.finish();
    workflow.queue().stop();

    let mut write_failed = false;
    let completed: Vec<&BatchFileStatus> = statuses
        .iter()
        .filter(|s| s.status == FileStatus::Completed)
        .collect();
    match &settings.output_dir {
        Some(dir) => {
            for status in &completed {
                if let Err(e) = write_transcript(dir, status).await {
                    presenter.error(&e);
                    write_failed = true;
                }
            }
        }
        None => print_transcripts(&presenter, &completed),
    }

    if let Some(stats) = workflow.statistics() {
        presenter.summary(&stats);
    }

    let any_failed = !report.invalid.is_empty()
        || statuses.iter().any(|s| s.status != FileStatus::Completed);
    if any_failed || write_failed {
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}

fn print_transcripts(presenter: &Presenter, completed: &[&BatchFileStatus]) {
    let headed = completed.len() > 1;
    for (i, status) in completed.iter().enumerate() {
        let Some(result) = &status.result else {
            continue;
        };
        if headed {
            if i > 0 {
                presenter.output("");
            }
            presenter.output(&format!("==> {} <==", status.file.name()));
        }
        presenter.output(&result.transcript.text);
    }
}

/// Write `<dir>/<stem>.txt` for one completed file
async fn write_transcript(dir: &Path, status: &BatchFileStatus) -> Result<(), String> {
    let Some(result) = &status.result else {
        return Ok(());
    };
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    let path = dir.join(format!("{}.txt", status.file.stem()));
    tokio::fs::write(&path, format!("{}\n", result.transcript.text))
        .await
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    debug!(path = %path.display(), "transcript written");
    Ok(())
}
