//! Restore status and restore speed tiers

use serde::{Deserialize, Serialize};

/// Restore state of an archived document
///
/// The normal path is `NotArchived → Archived → InProgress → Restored →
/// Archived` (on expiry). `Expired` exists as a reportable terminal state for
/// probe results; stored records revert to `Archived` when a restore lapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStatus {
    /// Document is in standard (or infrequent) storage; no restore concept applies
    NotArchived,

    /// Document is in a cold tier and no restore is active
    Archived,

    /// A provider-side restore job is running
    InProgress,

    /// A restored copy is temporarily retrievable until `restore_expiry`
    Restored,

    /// The restored copy has lapsed
    Expired,
}

impl RestoreStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreStatus::NotArchived => "not_archived",
            RestoreStatus::Archived => "archived",
            RestoreStatus::InProgress => "in_progress",
            RestoreStatus::Restored => "restored",
            RestoreStatus::Expired => "expired",
        }
    }

    /// Parse a status from a string (internal use)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "not_archived" => Some(RestoreStatus::NotArchived),
            "archived" => Some(RestoreStatus::Archived),
            "in_progress" => Some(RestoreStatus::InProgress),
            "restored" => Some(RestoreStatus::Restored),
            "expired" => Some(RestoreStatus::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speed tier for a provider-side restore job
///
/// Only affects latency and cost of the restore, never its semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreSpeed {
    /// Fastest and most expensive (minutes)
    Expedited,

    /// Default speed (hours)
    #[default]
    Standard,

    /// Cheapest, for large batches (many hours)
    Bulk,
}

impl RestoreSpeed {
    /// Get the speed name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreSpeed::Expedited => "Expedited",
            RestoreSpeed::Standard => "Standard",
            RestoreSpeed::Bulk => "Bulk",
        }
    }

    /// Parse a speed from a string (internal use)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "expedited" => Some(RestoreSpeed::Expedited),
            "standard" => Some(RestoreSpeed::Standard),
            "bulk" => Some(RestoreSpeed::Bulk),
            _ => None,
        }
    }

    /// Human-readable completion estimate for this speed tier
    pub fn estimated_completion(&self) -> &'static str {
        match self {
            RestoreSpeed::Expedited => "1-5 minutes",
            RestoreSpeed::Standard => "3-5 hours",
            RestoreSpeed::Bulk => "5-12 hours",
        }
    }
}

impl std::fmt::Display for RestoreSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            RestoreStatus::NotArchived,
            RestoreStatus::Archived,
            RestoreStatus::InProgress,
            RestoreStatus::Restored,
            RestoreStatus::Expired,
        ] {
            assert_eq!(RestoreStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RestoreStatus::parse("pending"), None);
    }

    #[test]
    fn test_speed_estimates() {
        assert_eq!(RestoreSpeed::Expedited.estimated_completion(), "1-5 minutes");
        assert_eq!(RestoreSpeed::Standard.estimated_completion(), "3-5 hours");
        assert_eq!(RestoreSpeed::Bulk.estimated_completion(), "5-12 hours");
    }

    #[test]
    fn test_speed_parse_is_case_insensitive() {
        assert_eq!(RestoreSpeed::parse("expedited"), Some(RestoreSpeed::Expedited));
        assert_eq!(RestoreSpeed::parse("Standard"), Some(RestoreSpeed::Standard));
        assert_eq!(RestoreSpeed::parse("BULK"), Some(RestoreSpeed::Bulk));
    }
}
