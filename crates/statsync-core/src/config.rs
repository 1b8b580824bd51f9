use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per entity (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
    /// Upper bound on a single attempt (fetch + upsert) in seconds.
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
            attempt_timeout_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay_secs.max(0.0))
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// Quota budget parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Daily budget ceiling in quota units.
    pub daily_limit: u64,
    /// Estimated quota units consumed per entity (pre-batch gate).
    pub cost_per_entity: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: 10_000,
            cost_per_entity: 1,
        }
    }
}

/// Remote stats API parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL; the entity id is appended as the final path segment.
    pub base_url: String,
    /// API key sent as the `X-Api-Key` header (empty = no header).
    #[serde(default)]
    pub api_key: String,
    /// Connect timeout in seconds for a single request.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com/v1/stats".to_string(),
            api_key: String::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Global configuration loaded from `~/.config/statsync/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsyncConfig {
    /// Entities per batch (one checkpoint flush per batch).
    pub batch_size: usize,
    /// Concurrent workers within a batch.
    pub max_workers: usize,
    /// Minimum spacing between outbound API calls, in milliseconds.
    pub min_request_interval_ms: u64,
    /// Watchdog timeout for a whole batch, in seconds. Workers still running
    /// when it fires are abandoned and recorded as failures.
    pub batch_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional quota budget; if missing, built-in defaults are used.
    #[serde(default)]
    pub quota: Option<QuotaConfig>,
    /// Remote stats API endpoint settings.
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for StatsyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_workers: 3,
            min_request_interval_ms: 500,
            batch_timeout_secs: 120,
            retry: None,
            quota: None,
            api: ApiConfig::default(),
        }
    }
}

impl StatsyncConfig {
    pub fn retry(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn quota(&self) -> QuotaConfig {
        self.quota.clone().unwrap_or_default()
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("statsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<StatsyncConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = StatsyncConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: StatsyncConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = StatsyncConfig::default();
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.max_workers, 3);
        assert_eq!(cfg.min_request_interval_ms, 500);
        assert_eq!(cfg.batch_timeout_secs, 120);
        assert!(cfg.retry.is_none());
        assert!(cfg.quota.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = StatsyncConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: StatsyncConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.batch_size, cfg.batch_size);
        assert_eq!(parsed.max_workers, cfg.max_workers);
        assert_eq!(parsed.min_request_interval_ms, cfg.min_request_interval_ms);
        assert_eq!(parsed.api.base_url, cfg.api.base_url);
    }

    #[test]
    fn config_toml_retry_and_quota_sections() {
        let toml = r#"
            batch_size = 5
            max_workers = 2
            min_request_interval_ms = 250
            batch_timeout_secs = 60

            [retry]
            max_attempts = 4
            base_delay_secs = 0.25
            max_delay_secs = 10
            attempt_timeout_secs = 20

            [quota]
            daily_limit = 5000
            cost_per_entity = 2

            [api]
            base_url = "https://stats.example.net/api"
            api_key = "k-123"
        "#;
        let cfg: StatsyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.batch_size, 5);
        let retry = cfg.retry();
        assert_eq!(retry.max_attempts, 4);
        assert!((retry.base_delay_secs - 0.25).abs() < 1e-9);
        assert_eq!(retry.attempt_timeout(), Duration::from_secs(20));
        let quota = cfg.quota();
        assert_eq!(quota.daily_limit, 5000);
        assert_eq!(quota.cost_per_entity, 2);
        assert_eq!(cfg.api.base_url, "https://stats.example.net/api");
        assert_eq!(cfg.api.api_key, "k-123");
        assert_eq!(cfg.api.connect_timeout_secs, 15);
    }
}
