//! Shared provider value types

use crate::timefmt;
use bytes::Bytes;
use coldvault_domain::{DocumentId, StorageTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payload and descriptive metadata for an upload
#[derive(Debug, Clone)]
pub struct UploadObject {
    /// Document id; doubles as the idempotency key
    pub document_id: DocumentId,

    /// Original filename, becomes the last path segment
    pub filename: String,

    /// MIME type stored with the object
    pub content_type: String,

    /// The payload
    pub data: Bytes,

    /// Key-value tags attached to the object where the backend supports them
    pub tags: BTreeMap<String, String>,

    /// Epoch seconds; fixes the date prefix of the storage path so retries
    /// land on the same key
    pub created_at: u64,
}

impl UploadObject {
    /// The deterministic storage path for this object
    pub fn storage_path(&self) -> String {
        storage_key(self.document_id, &self.filename, self.created_at)
    }
}

/// Derive the storage path for a document: `archives/YYYY/MM/DD/<id>/<name>`
pub fn storage_key(document_id: DocumentId, filename: &str, created_at: u64) -> String {
    format!(
        "archives/{}/{}/{}",
        timefmt::date_prefix(created_at),
        document_id,
        filename
    )
}

/// Result of a tier-change request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChange {
    /// Tier the backend reported before the change
    pub previous_tier: StorageTier,

    /// Tier requested (and now intended)
    pub new_tier: StorageTier,

    /// Whether the object is retrievable in the new tier without a restore
    pub immediate: bool,
}

/// Restore state as reported by a backend probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreProbe {
    /// Object is in a warm tier; no restore concept applies
    NotNeeded,

    /// Object is cold and no restore has been requested
    Required,

    /// A restore job is running
    InProgress,

    /// A restored copy is retrievable
    Ready {
        /// When the restored copy lapses, if the backend reports it
        expires_at: Option<u64>,
    },
}

/// Read-only snapshot of an object's tier and restore state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProbe {
    /// Storage tier the backend reports
    pub tier: StorageTier,

    /// Restore state the backend reports
    pub restore: RestoreProbe,
}

impl ArchiveProbe {
    /// Whether the object can be downloaded right now
    pub fn is_retrievable(&self) -> bool {
        matches!(
            self.restore,
            RestoreProbe::NotNeeded | RestoreProbe::Ready { .. }
        )
    }
}
