//! Tracing setup: stderr for warnings and up, a daily file for everything the filter lets through.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogConfig;
use crate::storage;

/// Filter directives are read from here first.
pub const LOG_ENV: &str = "STOREFRONT_LOG";

const DEFAULT_DIRECTIVE: &str = "info";
const LOG_FILE_PREFIX: &str = "storefront.log";

/// Install the global subscriber.
///
/// Keep the returned guard alive until exit or buffered file output is lost.
pub fn init(config: &LogConfig) -> Result<WorkerGuard> {
  let directory = log_directory(config)?;
  std::fs::create_dir_all(&directory)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;

  let appender = tracing_appender::rolling::daily(&directory, LOG_FILE_PREFIX);
  let (file_writer, guard) = tracing_appender::non_blocking(appender);

  let file_layer = fmt::layer()
    .with_writer(file_writer)
    .with_ansi(false)
    .with_target(true);
  let stderr_layer = fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(false)
    .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

  tracing_subscriber::registry()
    .with(env_filter(config))
    .with(file_layer)
    .with(stderr_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  tracing::debug!(directory = %directory.display(), "logging initialized");
  Ok(guard)
}

fn env_filter(config: &LogConfig) -> EnvFilter {
  if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
    return filter;
  }
  let directive = config.level.as_deref().unwrap_or(DEFAULT_DIRECTIVE);
  EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn log_directory(config: &LogConfig) -> Result<PathBuf> {
  match &config.directory {
    Some(dir) => Ok(dir.clone()),
    None => Ok(storage::data_dir()?.join("logs")),
  }
}
