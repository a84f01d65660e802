//! Storage tiers and backend kinds

use serde::{Deserialize, Serialize};

/// Cost/latency class for a stored object
///
/// Tiers are totally ordered from warmest to coldest:
/// Standard < Infrequent < Archive < DeepArchive.
///
/// Lifecycle aging only ever moves a document toward a colder tier. A restore
/// never changes the tier; it grants a temporary availability window on top
/// of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    /// Immediately retrievable, highest cost
    Standard,

    /// Immediately retrievable, lower cost for rarely read objects
    Infrequent,

    /// Cold storage (S3 Glacier IR, Azure Cold, GCS Coldline)
    Archive,

    /// Coldest storage (S3 Deep Archive, Azure Archive, GCS Archive)
    DeepArchive,
}

impl StorageTier {
    /// Get the tier name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageTier::Standard => "standard",
            StorageTier::Infrequent => "infrequent",
            StorageTier::Archive => "archive",
            StorageTier::DeepArchive => "deep_archive",
        }
    }

    /// Parse a tier from a string (internal use)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "standard" => Some(StorageTier::Standard),
            "infrequent" => Some(StorageTier::Infrequent),
            "archive" => Some(StorageTier::Archive),
            "deep_archive" => Some(StorageTier::DeepArchive),
            _ => None,
        }
    }

    /// Whether objects in this tier require a restore before retrieval
    pub fn is_cold(&self) -> bool {
        matches!(self, StorageTier::Archive | StorageTier::DeepArchive)
    }
}

impl std::str::FromStr for StorageTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid storage tier: {}", s))
    }
}

impl std::fmt::Display for StorageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed, compile-time-known set of storage backends
///
/// Adding a backend is an explicit new variant, not a runtime string match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Local filesystem backend (development and tests)
    Local,

    /// AWS S3 with Glacier storage classes
    Aws,

    /// Azure Blob Storage with access tiers
    Azure,

    /// Google Cloud Storage with storage classes
    Gcp,
}

impl ProviderKind {
    /// Get the provider name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::Aws => "aws",
            ProviderKind::Azure => "azure",
            ProviderKind::Gcp => "gcp",
        }
    }

    /// Parse a provider kind from a string (internal use)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(ProviderKind::Local),
            "aws" => Some(ProviderKind::Aws),
            "azure" => Some(ProviderKind::Azure),
            "gcp" => Some(ProviderKind::Gcp),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
