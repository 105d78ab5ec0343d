//! Configuration loaded from a YAML file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Refresh interval floor in milliseconds. Lower values are clamped.
pub const MIN_REFRESH_MS: u64 = 1500;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which statistics backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsBackend {
    Sqlite,
    Memory,
}

/// How one polling cycle visits the targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    Sequential,
    Concurrent,
}

/// One monitored host as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
}

/// Runtime settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Milliseconds between polling cycles (default: 1500)
    pub refresh_ms: u64,
    /// Statistics backend (default: sqlite)
    pub stats: StatsBackend,
    /// Path to the SQLite database file (default: "results.sqlite")
    pub db_path: String,
    /// Whether a cycle probes targets one by one or all at once
    /// (default: sequential)
    pub polling: PollMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_ms: MIN_REFRESH_MS,
            stats: StatsBackend::Sqlite,
            db_path: "results.sqlite".to_string(),
            polling: PollMode::Sequential,
        }
    }
}

impl Settings {
    /// Time between polling cycles.
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    /// Per-probe timeout, 80% of the refresh interval.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.saturating_mul(80) / 100)
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
}

impl AppConfig {
    /// Load configuration from a YAML file, clamping out-of-range settings
    /// and discarding unusable target entries.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let mut cfg: AppConfig = serde_yaml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.settings.refresh_ms < MIN_REFRESH_MS {
            tracing::warn!(
                "refresh_ms {} below minimum, using {}",
                self.settings.refresh_ms,
                MIN_REFRESH_MS
            );
            self.settings.refresh_ms = MIN_REFRESH_MS;
        }

        let before = self.targets.len();
        self.targets
            .retain(|t| !t.name.trim().is_empty() && !t.host.trim().is_empty());
        if self.targets.len() < before {
            tracing::warn!(
                "skipped {} target(s) with an empty name or host",
                before - self.targets.len()
            );
        }

        if self.targets.is_empty() {
            return Err(ConfigError::Invalid(
                "no usable targets configured".to_string(),
            ));
        }

        Ok(())
    }
}
