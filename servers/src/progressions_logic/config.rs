use anyhow::{Context, Result, bail};
use clap::Parser;
use lib_common::core::Schedule;
use lib_common::core::executor::DEFAULT_ERROR_THRESHOLD;
use lib_common::ingestors::fresh_feed::DEFAULT_FEED_URL;
use lib_common::ingestors::snapshot_fetcher::DEFAULT_SITE_URL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "server_progressions.conf";
const DEFAULT_OUTPUT_DIR_NAME: &str = "500px-progressions";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "500px fresh photo engagement progressions crawler", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "PROGRESSIONS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "PROGRESSIONS_OUTPUT_DIR", help = "Root directory of the snapshot store.")]
    pub output_dir: Option<PathBuf>,

    #[clap(long, env = "PROGRESSIONS_FEED_URL", help = "Fresh feed endpoint, one photo per page.")]
    pub feed_url: Option<String>,

    #[clap(long, env = "PROGRESSIONS_SITE_URL", help = "Base URL for photo and user pages.")]
    pub site_url: Option<String>,

    #[clap(long, env = "PROGRESSIONS_WORKERS", help = "Number of concurrent workers.")]
    pub workers: Option<usize>,

    #[clap(long, env = "PROGRESSIONS_STAGGER_MIN_SECS", help = "Lower bound of the random worker start delay.")]
    pub stagger_min_secs: Option<u64>,

    #[clap(long, env = "PROGRESSIONS_STAGGER_MAX_SECS", help = "Upper bound of the random worker start delay.")]
    pub stagger_max_secs: Option<u64>,

    #[clap(long, env = "PROGRESSIONS_POLL_INTERVAL_SECS", help = "Seconds between fresh feed polls while waiting for a new photo.")]
    pub poll_interval_secs: Option<u64>,

    #[clap(long, env = "PROGRESSIONS_ERROR_THRESHOLD", help = "Failed snapshots tolerated per photo before giving up on it.")]
    pub error_threshold: Option<usize>,

    #[clap(long, env = "PROGRESSIONS_SCHEDULE", help = "Snapshot schedule, e.g. 600x72,1800x24,3600x24.")]
    pub schedule: Option<String>,

    #[clap(long, env = "PROGRESSIONS_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "PROGRESSIONS_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,
}

/// Fully resolved and validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub feed_url: String,
    pub site_url: String,
    pub workers: usize,
    pub stagger_min: Duration,
    pub stagger_max: Duration,
    pub poll_interval: Duration,
    pub error_threshold: usize,
    pub schedule: Schedule,
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            output_dir: other.output_dir.or(self.output_dir),
            feed_url: other.feed_url.or(self.feed_url),
            site_url: other.site_url.or(self.site_url),
            workers: other.workers.or(self.workers),
            stagger_min_secs: other.stagger_min_secs.or(self.stagger_min_secs),
            stagger_max_secs: other.stagger_max_secs.or(self.stagger_max_secs),
            poll_interval_secs: other.poll_interval_secs.or(self.poll_interval_secs),
            error_threshold: other.error_threshold.or(self.error_threshold),
            schedule: other.schedule.or(self.schedule),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }

    fn defaults() -> Config {
        Config {
            output_dir: dirs::home_dir().map(|home| home.join(DEFAULT_OUTPUT_DIR_NAME)),
            feed_url: Some(DEFAULT_FEED_URL.to_string()),
            site_url: Some(DEFAULT_SITE_URL.to_string()),
            workers: Some(200),
            stagger_min_secs: Some(10),
            stagger_max_secs: Some(50),
            poll_interval_secs: Some(2),
            error_threshold: Some(DEFAULT_ERROR_THRESHOLD),
            schedule: Some(Schedule::default().to_string()),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            ..Default::default()
        }
    }

    fn into_settings(self) -> Result<Settings> {
        let output_dir = self
            .output_dir
            .context("no output directory configured and no home directory found")?;
        let workers = self.workers.unwrap_or(200);
        if workers == 0 {
            bail!("workers must be at least 1");
        }
        let stagger_min = self.stagger_min_secs.unwrap_or(10);
        let stagger_max = self.stagger_max_secs.unwrap_or(50);
        if stagger_min > stagger_max {
            bail!("stagger window is inverted: min {stagger_min}s > max {stagger_max}s");
        }
        let poll_interval = self.poll_interval_secs.unwrap_or(2);
        if poll_interval == 0 {
            bail!("poll interval must be at least one second");
        }
        let schedule_text = self.schedule.unwrap_or_else(|| Schedule::default().to_string());
        let schedule: Schedule = schedule_text
            .parse()
            .with_context(|| format!("invalid schedule '{schedule_text}'"))?;

        Ok(Settings {
            output_dir,
            feed_url: self.feed_url.unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            site_url: self.site_url.unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
            workers,
            stagger_min: Duration::from_secs(stagger_min),
            stagger_max: Duration::from_secs(stagger_max),
            poll_interval: Duration::from_secs(poll_interval),
            error_threshold: self.error_threshold.unwrap_or(DEFAULT_ERROR_THRESHOLD),
            schedule,
            log_dir: self.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn read_config_file(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = serde_json::from_str::<Config>(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(Some(config))
}

/// Resolves settings from `cli` (which already carries environment values)
/// layered over the config file over the built-in defaults.
pub fn resolve(cli: Config) -> Result<Settings> {
    // 1. Defaults
    let mut current = Config::defaults();

    // 2. Config file, path overridable from CLI/env
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if let Some(file_config) = read_config_file(&config_file_path)? {
        current = current.merge(file_config);
    }

    // 3. Environment variables and CLI arguments
    current.merge(cli).into_settings()
}

pub fn load_config() -> Result<Settings> {
    resolve(Config::parse())
}
