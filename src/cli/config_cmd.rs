//! Config command handler

use std::str::FromStr;

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, ChunkingConfig, EngineKind, QueueSection};
use crate::domain::error::ConfigError;
use crate::domain::job::ModelSize;
use crate::domain::time::Duration;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;
    store.save(&config).await?;

    presenter.success(&format!("{} = {}", key, value));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    match read_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output("(not set)"),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            &read_value(&config, key).unwrap_or_else(|| "(not set)".to_string()),
        );
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
        })
    }
}

/// Parse `value` for `key` and store it on the config
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "api_key" => config.api_key = Some(value.to_string()),
        "engine" => {
            let engine: EngineKind = parse(key, value)?;
            config.engine = Some(engine.to_string());
        }
        "engine_command" => config.engine_command = Some(non_empty(key, value)?),
        "language" => config.language = Some(non_empty(key, value)?),
        "model_size" => {
            let size: ModelSize = parse(key, value)?;
            config.model_size = Some(size.to_string());
        }
        "output_dir" => config.output_dir = Some(non_empty(key, value)?),
        "max_file_size_mb" => config.max_file_size_mb = Some(positive(key, value)?),
        "queue.max_concurrent_jobs" => {
            queue(config).max_concurrent_jobs = Some(positive(key, value)?)
        }
        "queue.max_retries" => queue(config).max_retries = Some(parse(key, value)?),
        "queue.retry_delay" => {
            let delay: Duration = parse(key, value)?;
            queue(config).retry_delay = Some(delay.to_string());
        }
        "queue.task_timeout" => {
            let timeout: Duration = parse(key, value)?;
            queue(config).task_timeout = Some(timeout.to_string());
        }
        "chunking.chunk_size_mb" => chunking(config).chunk_size_mb = Some(positive(key, value)?),
        "chunking.max_concurrent_chunks" => {
            chunking(config).max_concurrent_chunks = Some(positive(key, value)?)
        }
        "chunking.memory_threshold" => {
            let percent: u8 = parse(key, value)?;
            if percent == 0 || percent > 100 {
                return Err(ConfigError::ValidationError {
                    key: key.to_string(),
                    message: "Value must be a percentage between 1 and 100".to_string(),
                });
            }
            chunking(config).memory_threshold = Some(percent);
        }
        "chunking.large_file_threshold_mb" => {
            chunking(config).large_file_threshold_mb = Some(parse(key, value)?)
        }
        _ => return check_key(key),
    }
    Ok(())
}

/// Display form of a stored value; the API key is masked
fn read_value(config: &AppConfig, key: &str) -> Option<String> {
    let queue = config.queue.as_ref();
    let chunking = config.chunking.as_ref();
    match key {
        "api_key" => config.api_key.as_deref().map(mask_api_key),
        "engine" => config.engine.clone(),
        "engine_command" => config.engine_command.clone(),
        "language" => config.language.clone(),
        "model_size" => config.model_size.clone(),
        "output_dir" => config.output_dir.clone(),
        "max_file_size_mb" => config.max_file_size_mb.map(|v| v.to_string()),
        "queue.max_concurrent_jobs" => queue
            .and_then(|q| q.max_concurrent_jobs)
            .map(|v| v.to_string()),
        "queue.max_retries" => queue.and_then(|q| q.max_retries).map(|v| v.to_string()),
        "queue.retry_delay" => queue.and_then(|q| q.retry_delay.clone()),
        "queue.task_timeout" => queue.and_then(|q| q.task_timeout.clone()),
        "chunking.chunk_size_mb" => chunking.and_then(|c| c.chunk_size_mb).map(|v| v.to_string()),
        "chunking.max_concurrent_chunks" => chunking
            .and_then(|c| c.max_concurrent_chunks)
            .map(|v| v.to_string()),
        "chunking.memory_threshold" => chunking
            .and_then(|c| c.memory_threshold)
            .map(|v| v.to_string()),
        "chunking.large_file_threshold_mb" => chunking
            .and_then(|c| c.large_file_threshold_mb)
            .map(|v| v.to_string()),
        _ => None,
    }
}

fn queue(config: &mut AppConfig) -> &mut QueueSection {
    config.queue.get_or_insert_with(QueueSection::default)
}

fn chunking(config: &mut AppConfig) -> &mut ChunkingConfig {
    config.chunking.get_or_insert_with(ChunkingConfig::default)
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::ValidationError {
            key: key.to_string(),
            message: e.to_string(),
        })
}

fn positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let parsed: T = parse(key, value)?;
    if parsed == T::default() {
        return Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: "Value must be greater than zero".to_string(),
        });
    }
    Ok(parsed)
}

fn non_empty(key: &str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: "Value must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Mask API key for display (show first 4 and last 4 chars)
fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        "*".repeat(key.len())
    } else {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_api_key_long() {
        assert_eq!(mask_api_key("abcdefghijklmnop"), "abcd...mnop");
    }

    #[test]
    fn mask_api_key_short() {
        assert_eq!(mask_api_key("short"), "*****");
    }

    #[test]
    fn set_top_level_values() {
        let mut config = AppConfig::empty();
        apply_value(&mut config, "engine", "Gemini").unwrap();
        apply_value(&mut config, "model_size", "LARGE").unwrap();
        apply_value(&mut config, "language", " en ").unwrap();

        assert_eq!(config.engine.as_deref(), Some("gemini"));
        assert_eq!(config.model_size.as_deref(), Some("large"));
        assert_eq!(config.language.as_deref(), Some("en"));
    }

    #[test]
    fn set_section_values_creates_section() {
        let mut config = AppConfig::empty();
        apply_value(&mut config, "queue.max_retries", "5").unwrap();
        apply_value(&mut config, "queue.retry_delay", "2m30s").unwrap();
        apply_value(&mut config, "chunking.memory_threshold", "90").unwrap();

        let queue = config.queue.as_ref().unwrap();
        assert_eq!(queue.max_retries, Some(5));
        assert_eq!(queue.retry_delay.as_deref(), Some("2m30s"));
        assert_eq!(config.chunking.as_ref().unwrap().memory_threshold, Some(90));
        assert_eq!(read_value(&config, "queue.max_retries").as_deref(), Some("5"));
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = AppConfig::empty();
        assert!(apply_value(&mut config, "engine", "vosk").is_err());
        assert!(apply_value(&mut config, "model_size", "huge").is_err());
        assert!(apply_value(&mut config, "queue.retry_delay", "soon").is_err());
        assert!(apply_value(&mut config, "queue.max_concurrent_jobs", "0").is_err());
        assert!(apply_value(&mut config, "chunking.memory_threshold", "101").is_err());
        assert!(apply_value(&mut config, "chunking.chunk_size_mb", "-1").is_err());
        assert!(apply_value(&mut config, "language", "  ").is_err());
        assert_eq!(config, AppConfig::empty());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = check_key("duration").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn read_masks_api_key() {
        let config = AppConfig {
            api_key: Some("abcdefghijklmnop".to_string()),
            ..Default::default()
        };
        assert_eq!(read_value(&config, "api_key").as_deref(), Some("abcd...mnop"));
        assert_eq!(read_value(&config, "queue.max_retries"), None);
    }
}
