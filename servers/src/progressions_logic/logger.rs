use anyhow::{Context, Result};
use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_PREFIX: &str = "server_progressions";

/// Installs console and file logging. Keep the returned guard alive for the
/// whole run, dropping it flushes the file writer.
pub fn setup_logging(log_dir: &Path, log_level: &str) -> Result<WorkerGuard> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    }

    // Clean up old log files, keeping only the most recent one
    cleanup_old_logs(log_dir)?;

    let log_file_name = format!(
        "{}_{}.log",
        LOG_PREFIX,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let file_appender = tracing_appender::rolling::never(log_dir, log_file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .with_context(|| format!("invalid log level '{log_level}'"))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(guard)
}

fn cleanup_old_logs(log_dir: &Path) -> Result<()> {
    let pattern = format!("{}/{}_*.log", log_dir.display(), LOG_PREFIX);
    let mut log_files: Vec<PathBuf> = glob(&pattern)
        .context("invalid log rotation pattern")?
        .filter_map(|entry| entry.ok())
        .collect();

    // Timestamped names sort chronologically; newest first
    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    for old_file in log_files.iter().skip(1) {
        if let Err(e) = fs::remove_file(old_file) {
            eprintln!("Failed to delete old log file {}: {}", old_file.display(), e);
        }
    }

    Ok(())
}
