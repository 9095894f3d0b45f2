//! Configuration
//!
//! YAML configuration for the sequence-number guard. Every field is
//! optional; accessor methods supply defaults so an empty file (or no file
//! at all) yields a working setup.
//!
//! ## Search Paths
//!
//! `Config::load()` looks in these locations, in order:
//!
//! 1. `/etc/seqnum/seqnumd.yaml`
//! 2. `./seqnumd.yaml`
//!
//! Files are not merged. The last one that exists is used.

mod digest;
mod neighbor;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::identity::DomainId;

pub use digest::{DigestConfig, TimerConfig};
pub use neighbor::NeighborConfig;

/// Config file name searched for in each location.
pub const CONFIG_FILE_NAME: &str = "seqnumd.yaml";

/// System-wide configuration directory.
pub const SYSTEM_CONFIG_DIR: &str = "/etc/seqnum";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// This router's own domain (`local_domain`).
    ///
    /// Packets whose source is this domain are stamped on egress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_domain: Option<DomainId>,

    /// Duplicate-detection store (`digest.*`).
    #[serde(default)]
    pub digest: DigestConfig,

    /// Maintenance timers (`timers.*`).
    #[serde(default)]
    pub timers: TimerConfig,

    /// Neighbor domains pre-populated at startup (`neighbors`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<NeighborConfig>,
}

impl Config {
    /// Default search paths, lowest priority first.
    pub fn search_paths() -> Vec<PathBuf> {
        vec![
            Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE_NAME),
            PathBuf::from(CONFIG_FILE_NAME),
        ]
    }

    /// Load from the default search paths.
    ///
    /// Returns the config along with the path it was loaded from (empty if
    /// no file exists and defaults are used).
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        Self::load_from_paths(&Self::search_paths())
    }

    /// Load from an explicit list of candidate paths.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        match paths.iter().rev().find(|p| p.is_file()) {
            Some(path) => {
                let config = Self::load_file(path)?;
                Ok((config, vec![path.clone()]))
            }
            None => {
                let config = Self::default();
                config.validate()?;
                Ok((config, Vec::new()))
            }
        }
    }

    /// Load and validate a single file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.digest;
        let t = &self.timers;

        if d.hash_count() == 0 {
            return Err(ConfigError::Invalid("digest.hash_count must be > 0".into()));
        }
        if d.filter_size_kb() == 0 {
            return Err(ConfigError::Invalid(
                "digest.filter_size_kb must be > 0".into(),
            ));
        }
        if d.shard_count() < crate::digest::MIN_SHARD_COUNT {
            return Err(ConfigError::Invalid(format!(
                "digest.shard_count must be >= {}",
                crate::digest::MIN_SHARD_COUNT
            )));
        }
        if d.seq_range() < 2 {
            return Err(ConfigError::Invalid("digest.seq_range must be >= 2".into()));
        }
        if d.window_size() >= d.seq_range() / 2 {
            return Err(ConfigError::Invalid(format!(
                "digest.window_size ({}) must be less than half of seq_range ({})",
                d.window_size(),
                d.seq_range()
            )));
        }

        for (name, period) in [
            ("increment_period_ms", t.increment_period()),
            ("rotation_period_ms", t.rotation_period()),
            ("ttl_check_period_ms", t.ttl_check_period()),
            ("stats_log_interval_secs", t.stats_log_interval()),
        ] {
            if period.is_zero() {
                return Err(ConfigError::Invalid(format!("timers.{} must be > 0", name)));
            }
        }

        // Anything inside the sequence window must still be in some shard.
        let window = t.increment_period() * d.window_size();
        let retention = t.rotation_period() * (d.shard_count() as u32 - 1);
        if window > retention {
            return Err(ConfigError::Invalid(format!(
                "replay window {:?} exceeds shard retention {:?}",
                window, retention
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for neighbor in &self.neighbors {
            if !seen.insert(neighbor.domain) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate neighbor {}",
                    neighbor.domain
                )));
            }
            if Some(neighbor.domain) == self.local_domain {
                return Err(ConfigError::Invalid(format!(
                    "neighbor {} is the local domain",
                    neighbor.domain
                )));
            }
        }

        Ok(())
    }

    /// Serialize back to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
