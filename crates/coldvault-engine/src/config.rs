//! Configuration for the lifecycle engine
//!
//! Defines the aging thresholds, sweep intervals, restore defaults, and the
//! cross-sweep retry policy.

use coldvault_domain::{ProviderKind, RestoreSpeed};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capped exponential backoff for transient failures, applied across sweeps
///
/// A document that fails transiently is retried on a later sweep, never
/// inside the sweep that saw the failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Give up after this many failed attempts
    /// Default: 5
    pub max_attempts: u32,

    /// Backoff after the first failure (in seconds)
    /// Default: 1
    pub base_backoff_secs: u64,

    /// Backoff ceiling (in seconds)
    /// Default: 64
    pub max_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_secs: 1,
            max_backoff_secs: 64,
        }
    }
}

impl RetryPolicy {
    /// Backoff duration after `attempts` failed attempts (1-based)
    ///
    /// `base * 2^(attempts-1)`, clamped to the ceiling; overflow saturates.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1);
        let factor = if exponent >= 63 {
            u64::MAX
        } else {
            1u64 << exponent
        };
        let secs = self
            .base_backoff_secs
            .saturating_mul(factor)
            .min(self.max_backoff_secs);
        Duration::from_secs(secs)
    }
}

/// Configuration for the lifecycle engine
///
/// Controls aging thresholds, sweep cadence, restore defaults, and
/// concurrency limits.
///
/// # Examples
///
/// ```
/// use coldvault_engine::EngineConfig;
///
/// // Default configuration (balanced)
/// let config = EngineConfig::default();
/// assert_eq!(config.archive_after_days, 90);
///
/// // Aggressive archiving
/// let config = EngineConfig::aggressive();
/// assert_eq!(config.archive_after_days, 30);
///
/// // Lenient archiving
/// let config = EngineConfig::lenient();
/// assert_eq!(config.archive_after_days, 180);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Age at which a document moves to the Archive tier (in days)
    /// Default: 90 days
    pub archive_after_days: u64,

    /// Age at which a document moves to the DeepArchive tier (in days)
    /// Default: 365 days
    pub deep_archive_after_days: u64,

    /// How often to run the lifecycle sweep (in hours)
    /// Default: every 24 hours
    pub sweep_interval_hours: u64,

    /// How often to run the restore check (in minutes)
    /// Default: every 15 minutes
    pub restore_poll_interval_minutes: u64,

    /// Restore window length when the caller does not specify one (in days)
    /// Default: 7 days
    pub restore_days: u32,

    /// Restore speed when the caller does not specify one
    /// Default: Standard
    #[serde(default)]
    pub restore_speed: RestoreSpeed,

    /// How many documents a batch sweep processes concurrently
    /// Default: 4
    pub max_in_flight: usize,

    /// Dry-run mode: compute and report eligibility without touching the
    /// backend, the store, or the event sink
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// Backend for uploads that do not name one
    /// Default: Local
    #[serde(default = "default_provider")]
    pub default_provider: ProviderKind,

    /// Cross-sweep retry policy for transient failures
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Local
}

impl Default for EngineConfig {
    /// Create default configuration with balanced archiving policies
    ///
    /// - Archive: 90 days
    /// - DeepArchive: 365 days
    /// - Sweep: daily, restore check: every 15 minutes
    /// - Restore window: 7 days at Standard speed
    fn default() -> Self {
        Self {
            archive_after_days: 90,
            deep_archive_after_days: 365,
            sweep_interval_hours: 24,
            restore_poll_interval_minutes: 15,
            restore_days: 7,
            restore_speed: RestoreSpeed::Standard,
            max_in_flight: 4,
            dry_run: false,
            default_provider: ProviderKind::Local,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Aggressive archiving (shorter thresholds, frequent sweeps)
    ///
    /// Suitable when storage cost dominates and retrieval is rare.
    ///
    /// - Archive: 30 days, DeepArchive: 180 days
    /// - Sweep: every 6 hours, restore check: every 5 minutes
    pub fn aggressive() -> Self {
        Self {
            archive_after_days: 30,
            deep_archive_after_days: 180,
            sweep_interval_hours: 6,
            restore_poll_interval_minutes: 5,
            restore_days: 3,
            restore_speed: RestoreSpeed::Standard,
            max_in_flight: 8,
            dry_run: false,
            default_provider: ProviderKind::Local,
            retry: RetryPolicy::default(),
        }
    }

    /// Lenient archiving (longer thresholds, infrequent sweeps)
    ///
    /// Suitable when documents stay in active use for months.
    ///
    /// - Archive: 180 days, DeepArchive: 730 days
    /// - Sweep: every 48 hours, restore check: every 30 minutes
    pub fn lenient() -> Self {
        Self {
            archive_after_days: 180,
            deep_archive_after_days: 730,
            sweep_interval_hours: 48,
            restore_poll_interval_minutes: 30,
            restore_days: 14,
            restore_speed: RestoreSpeed::Standard,
            max_in_flight: 4,
            dry_run: false,
            default_provider: ProviderKind::Local,
            retry: RetryPolicy::default(),
        }
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_hours * 3600)
    }

    /// Get restore poll interval as Duration
    pub fn restore_poll_interval(&self) -> Duration {
        Duration::from_secs(self.restore_poll_interval_minutes * 60)
    }

    /// Archive threshold in seconds
    pub fn archive_after(&self) -> u64 {
        self.archive_after_days * 86_400
    }

    /// DeepArchive threshold in seconds
    pub fn deep_archive_after(&self) -> u64 {
        self.deep_archive_after_days * 86_400
    }

    /// Restore window length in seconds
    pub fn restore_window(&self) -> u64 {
        u64::from(self.restore_days) * 86_400
    }
}
