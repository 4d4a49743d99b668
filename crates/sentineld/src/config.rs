use std::path::{Path, PathBuf};

use sentinel_core::PipelineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read thresholds file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid thresholds file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the JSON audit ledger.
    pub ledger_path: PathBuf,
    /// Directory for denial frame snapshots, when snapshots are enabled.
    pub snapshot_dir: Option<PathBuf>,
    /// Optional TOML file overriding pipeline thresholds.
    pub thresholds_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `SENTINEL_*` environment variables with
    /// defaults under the XDG data directory.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("sentinel");

        let ledger_path = std::env::var("SENTINEL_LEDGER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("ledger.json"));

        let snapshots_enabled = std::env::var("SENTINEL_SNAPSHOTS_ENABLED")
            .map(|v| v != "0")
            .unwrap_or(true);
        let snapshot_dir = snapshots_enabled.then(|| {
            std::env::var("SENTINEL_SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("snapshots"))
        });

        Self {
            ledger_path,
            snapshot_dir,
            thresholds_path: std::env::var("SENTINEL_THRESHOLDS").ok().map(PathBuf::from),
        }
    }

    /// Pipeline thresholds: the TOML file when configured, defaults
    /// otherwise, with a couple of per-host environment overrides on top.
    pub fn thresholds(&self) -> Result<PipelineConfig, ConfigError> {
        let mut thresholds = load_thresholds(self.thresholds_path.as_deref())?;
        thresholds.snr_threshold = env_f64("SENTINEL_SNR_THRESHOLD", thresholds.snr_threshold);
        thresholds.injection_threshold =
            env_f64("SENTINEL_INJECTION_THRESHOLD", thresholds.injection_threshold);
        Ok(thresholds)
    }
}

/// Parse a thresholds file; `None` means defaults. Unknown or omitted keys
/// fall back to their defaults, so a file can override a single value.
pub fn load_thresholds(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
