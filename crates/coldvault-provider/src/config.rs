//! Provider configuration structs
//!
//! Deserialized by the surrounding service; config-file parsing itself is
//! out of scope here. Every struct carries workable defaults so tests and
//! embedded use need no config plumbing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Explicit per-operation timeouts for provider calls
///
/// Probes (`archive_status`, `exists`) must return quickly; transfers may
/// legitimately run long. A stuck call must not stall a whole sweep, so no
/// operation ever runs under a global default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTimeouts {
    /// Timeout for `archive_status` and `exists` (seconds)
    pub probe_secs: u64,

    /// Timeout for `upload` and `download` (seconds)
    pub transfer_secs: u64,

    /// Timeout for `archive_to_tier` (seconds)
    pub tier_change_secs: u64,

    /// Timeout for `request_restore` and `delete` (seconds)
    pub restore_secs: u64,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self {
            probe_secs: 10,
            transfer_secs: 300,
            tier_change_secs: 60,
            restore_secs: 60,
        }
    }
}

impl ProviderTimeouts {
    /// Probe timeout as a Duration
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    /// Transfer timeout as a Duration
    pub fn transfer(&self) -> Duration {
        Duration::from_secs(self.transfer_secs)
    }

    /// Tier-change timeout as a Duration
    pub fn tier_change(&self) -> Duration {
        Duration::from_secs(self.tier_change_secs)
    }

    /// Restore/delete timeout as a Duration
    pub fn restore(&self) -> Duration {
        Duration::from_secs(self.restore_secs)
    }
}

/// Configuration for the local filesystem backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Root directory for stored objects and their sidecar metadata
    pub root: PathBuf,

    /// Per-operation timeouts (kept for interface parity; local I/O rarely
    /// hits them)
    #[serde(default)]
    pub timeouts: ProviderTimeouts,
}

impl LocalConfig {
    /// Config rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeouts: ProviderTimeouts::default(),
        }
    }
}

/// Configuration for the AWS S3 backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Bucket name
    pub bucket: String,

    /// AWS region, e.g. `us-east-1`
    pub region: String,

    /// Access key id
    pub access_key_id: String,

    /// Secret access key
    pub secret_access_key: String,

    /// Endpoint override (S3-compatible stores, test servers); defaults to
    /// `https://s3.<region>.amazonaws.com`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-operation timeouts
    #[serde(default)]
    pub timeouts: ProviderTimeouts,
}

/// Configuration for the Azure Blob Storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Storage account name
    pub account: String,

    /// Container name
    pub container: String,

    /// SAS token granting object and tier permissions (leading `?` optional)
    pub sas_token: String,

    /// Endpoint override; defaults to
    /// `https://<account>.blob.core.windows.net`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-operation timeouts
    #[serde(default)]
    pub timeouts: ProviderTimeouts,
}

/// Configuration for the Google Cloud Storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// Bucket name
    pub bucket: String,

    /// OAuth2 bearer token for the JSON API
    pub access_token: String,

    /// Endpoint override; defaults to `https://storage.googleapis.com`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-operation timeouts
    #[serde(default)]
    pub timeouts: ProviderTimeouts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_defaults() {
        let t = ProviderTimeouts::default();
        assert_eq!(t.probe(), Duration::from_secs(10));
        assert_eq!(t.transfer(), Duration::from_secs(300));
        assert!(t.probe() < t.transfer());
    }

    #[test]
    fn test_aws_config_deserializes_without_optionals() {
        let cfg: AwsConfig = serde_json::from_str(
            r#"{
                "bucket": "document-archive",
                "region": "us-east-1",
                "access_key_id": "AKIDEXAMPLE",
                "secret_access_key": "secret"
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.endpoint, None);
        assert_eq!(cfg.timeouts, ProviderTimeouts::default());
    }
}
