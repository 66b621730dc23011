//! Runtime configuration for the sync core, loaded from an optional JSON file.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the agent looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/sync.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SCORE_SYNC_CONFIG_PATH";

/// Immutable runtime configuration shared across the sync services.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Deadline for one queued submission attempt.
    pub submit_timeout: Duration,
    /// Flat pause between failed queue attempts; deliberately not a backoff.
    pub retry_interval: Duration,
    /// Tick interval of the connectivity poll loop.
    pub poll_interval: Duration,
    /// Stat whose leaderboard carries the per-player decoration attribute.
    pub secondary_stat: String,
    /// Page size used when fetching the decoration leaderboard.
    pub secondary_top_n: usize,
    /// Decoration value applied to rows with no secondary entry.
    pub default_level: i64,
    /// Key-value cell holding the pending submission queue.
    pub queue_key: String,
    /// Prefix of the per-stat best-score cells.
    pub best_score_key_prefix: String,
}

impl SyncConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded sync configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse sync configuration; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "sync configuration not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read sync configuration; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            secondary_stat: "level".into(),
            secondary_top_n: 100,
            default_level: 1,
            queue_key: "score_sync.pending".into(),
            best_score_key_prefix: "score_sync.best.".into(),
        }
    }
}

/// JSON representation of the configuration file; every field is optional so a
/// partial file overrides only what it names.
#[derive(Debug, Deserialize)]
struct RawConfig {
    submit_timeout_secs: Option<u64>,
    retry_interval_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    secondary_stat: Option<String>,
    secondary_top_n: Option<usize>,
    default_level: Option<i64>,
    queue_key: Option<String>,
    best_score_key_prefix: Option<String>,
}

impl From<RawConfig> for SyncConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = SyncConfig::default();
        Self {
            submit_timeout: raw
                .submit_timeout_secs
                .map_or(defaults.submit_timeout, Duration::from_secs),
            retry_interval: raw
                .retry_interval_secs
                .map_or(defaults.retry_interval, Duration::from_secs),
            poll_interval: raw
                .poll_interval_secs
                .map_or(defaults.poll_interval, Duration::from_secs),
            secondary_stat: raw.secondary_stat.unwrap_or(defaults.secondary_stat),
            secondary_top_n: raw.secondary_top_n.unwrap_or(defaults.secondary_top_n),
            default_level: raw.default_level.unwrap_or(defaults.default_level),
            queue_key: raw.queue_key.unwrap_or(defaults.queue_key),
            best_score_key_prefix: raw
                .best_score_key_prefix
                .unwrap_or(defaults.best_score_key_prefix),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
