//! Duplicate-detection store and maintenance timer configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::bloom::{DEFAULT_FILTER_SIZE_KB, DEFAULT_HASH_COUNT};
use crate::digest::DEFAULT_SHARD_COUNT;
use crate::seqnum::{DEFAULT_SEQ_RANGE, DEFAULT_WINDOW_SIZE};

/// Default local counter increment period in milliseconds.
const DEFAULT_INCREMENT_PERIOD_MS: u64 = 10;

/// Default clock-skew slack added to neighbor TTLs in milliseconds.
const DEFAULT_SKEW_SLACK_MS: u64 = 1;

/// Default shard rotation period in milliseconds.
const DEFAULT_ROTATION_PERIOD_MS: u64 = 110;

/// Default TTL sweep period in milliseconds.
const DEFAULT_TTL_CHECK_PERIOD_MS: u64 = 5;

/// Default stats log interval in seconds.
const DEFAULT_STATS_LOG_INTERVAL_SECS: u64 = 30;

/// Duplicate-detection store configuration (`digest.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DigestConfig {
    /// Bit budget per shard in KiB (`digest.filter_size_kb`). Default: 16.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_size_kb: Option<usize>,

    /// Hash functions per element (`digest.hash_count`). Default: 7.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_count: Option<u32>,

    /// Number of rotating shards (`digest.shard_count`). Default: 4.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_count: Option<usize>,

    /// Sequence window tolerance in ticks (`digest.window_size`). Default: 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<u32>,

    /// Sequence number modulus (`digest.seq_range`). Default: 100,000,000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq_range: Option<u32>,
}

impl DigestConfig {
    pub fn filter_size_kb(&self) -> usize {
        self.filter_size_kb.unwrap_or(DEFAULT_FILTER_SIZE_KB)
    }

    pub fn hash_count(&self) -> u32 {
        self.hash_count.unwrap_or(DEFAULT_HASH_COUNT)
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count.unwrap_or(DEFAULT_SHARD_COUNT)
    }

    pub fn window_size(&self) -> u32 {
        self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE)
    }

    pub fn seq_range(&self) -> u32 {
        self.seq_range.unwrap_or(DEFAULT_SEQ_RANGE)
    }
}

/// Maintenance timer configuration (`timers.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimerConfig {
    /// Local counter increment period (`timers.increment_period_ms`). Default: 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment_period_ms: Option<u64>,

    /// Clock-skew slack on neighbor TTLs (`timers.skew_slack_ms`). Default: 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skew_slack_ms: Option<u64>,

    /// Shard rotation period (`timers.rotation_period_ms`). Default: 110.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_period_ms: Option<u64>,

    /// Neighbor TTL sweep period (`timers.ttl_check_period_ms`). Default: 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_check_period_ms: Option<u64>,

    /// Daemon stats log interval (`timers.stats_log_interval_secs`). Default: 30.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_log_interval_secs: Option<u64>,
}

impl TimerConfig {
    pub fn increment_period(&self) -> Duration {
        Duration::from_millis(self.increment_period_ms.unwrap_or(DEFAULT_INCREMENT_PERIOD_MS))
    }

    pub fn skew_slack(&self) -> Duration {
        Duration::from_millis(self.skew_slack_ms.unwrap_or(DEFAULT_SKEW_SLACK_MS))
    }

    pub fn rotation_period(&self) -> Duration {
        Duration::from_millis(self.rotation_period_ms.unwrap_or(DEFAULT_ROTATION_PERIOD_MS))
    }

    pub fn ttl_check_period(&self) -> Duration {
        Duration::from_millis(self.ttl_check_period_ms.unwrap_or(DEFAULT_TTL_CHECK_PERIOD_MS))
    }

    pub fn stats_log_interval(&self) -> Duration {
        Duration::from_secs(
            self.stats_log_interval_secs
                .unwrap_or(DEFAULT_STATS_LOG_INTERVAL_SECS),
        )
    }
}
