//! Document records - the unit of state the engine manages

use crate::restore::RestoreStatus;
use crate::tier::{ProviderKind, StorageTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for an archived document, based on UUIDv7
///
/// UUIDv7 provides:
/// - Chronological sortability for temporal queries
/// - 128-bit uniqueness
/// - No coordination required for distributed generation
///
/// The identifier doubles as the idempotency key for retried backend
/// operations: a retried upload derives the same storage path from it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DocumentId(uuid::Uuid);

impl DocumentId {
    /// Generate a new UUIDv7-based DocumentId
    ///
    /// # Examples
    ///
    /// ```
    /// use coldvault_domain::DocumentId;
    ///
    /// let id = DocumentId::new();
    /// assert_eq!(id.to_string().len(), 36);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Parse a DocumentId from a UUID string
    ///
    /// # Examples
    ///
    /// ```
    /// use coldvault_domain::DocumentId;
    ///
    /// let id = DocumentId::new();
    /// let parsed = DocumentId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid document id: {}", e))
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One record per archived document
///
/// The record is the local source of truth for *intent*: which tier the
/// system believes the document is in and which restore state it is in. The
/// backend is authoritative for *fact* (what is actually retrievable); the
/// restore poller is the only path that reconciles fact into intent.
///
/// Records are mutated only through [`crate::TierStateMachine`]-validated
/// transitions, committed with a conditional update on `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique identifier, immutable
    pub document_id: DocumentId,

    /// Backend-specific locator, immutable once set
    pub storage_path: String,

    /// Which backend holds the object, immutable
    pub provider: ProviderKind,

    /// Current storage tier; never decreases under lifecycle aging
    pub storage_tier: StorageTier,

    /// Current restore state
    pub restore_status: RestoreStatus,

    /// Epoch seconds after which a restored copy lapses; `Some` iff
    /// `restore_status == Restored`
    pub restore_expiry: Option<u64>,

    /// Original filename at ingest, immutable
    pub filename: String,

    /// MIME type at ingest, immutable
    pub content_type: String,

    /// Payload size in bytes, immutable
    pub size_bytes: u64,

    /// Key-value tags supplied at ingest, immutable
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Epoch seconds when the document was first archived
    pub created_at: u64,

    /// Epoch seconds of the most recent tier change
    pub last_tier_change_at: u64,

    /// Optimistic-concurrency counter, incremented by every committed update
    pub version: u64,
}

impl DocumentRecord {
    /// Create a new record for a freshly uploaded document
    ///
    /// New documents start at Standard tier with no restore state and
    /// version 1.
    pub fn new(
        document_id: DocumentId,
        storage_path: String,
        provider: ProviderKind,
        filename: String,
        content_type: String,
        size_bytes: u64,
        tags: BTreeMap<String, String>,
        created_at: u64,
    ) -> Self {
        Self {
            document_id,
            storage_path,
            provider,
            storage_tier: StorageTier::Standard,
            restore_status: RestoreStatus::NotArchived,
            restore_expiry: None,
            filename,
            content_type,
            size_bytes,
            tags,
            created_at,
            last_tier_change_at: created_at,
            version: 1,
        }
    }

    /// Age of the document in whole days as of `as_of` (epoch seconds)
    pub fn age_days(&self, as_of: u64) -> u64 {
        as_of.saturating_sub(self.created_at) / 86_400
    }

    /// Whether the record says the object can be downloaded right now
    ///
    /// This is intent-side retrievability; the backend probe is the factual
    /// answer. Warm tiers are always retrievable, cold tiers only inside an
    /// unexpired restore window.
    pub fn is_retrievable(&self, now: u64) -> bool {
        if !self.storage_tier.is_cold() {
            return true;
        }
        match (self.restore_status, self.restore_expiry) {
            (RestoreStatus::Restored, Some(expiry)) => expiry > now,
            _ => false,
        }
    }

    /// Check the record invariants
    ///
    /// 1. `restore_status != NotArchived` implies `storage_tier != Standard`
    /// 2. `restore_expiry` is `Some` iff `restore_status == Restored`
    ///
    /// Returns a description of the first violated invariant, if any.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.restore_status != RestoreStatus::NotArchived
            && self.storage_tier == StorageTier::Standard
        {
            return Err(format!(
                "restore_status {} with storage_tier standard",
                self.restore_status
            ));
        }
        match (self.restore_status, self.restore_expiry) {
            (RestoreStatus::Restored, None) => {
                Err("restore_status restored without restore_expiry".to_string())
            }
            (status, Some(_)) if status != RestoreStatus::Restored => Err(format!(
                "restore_expiry set with restore_status {}",
                status
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DocumentRecord {
        DocumentRecord::new(
            DocumentId::new(),
            "archives/2026/01/15/x/report.pdf".to_string(),
            ProviderKind::Local,
            "report.pdf".to_string(),
            "application/pdf".to_string(),
            1024,
            BTreeMap::new(),
            1_700_000_000,
        )
    }

    #[test]
    fn test_new_record_defaults() {
        let r = record();
        assert_eq!(r.storage_tier, StorageTier::Standard);
        assert_eq!(r.restore_status, RestoreStatus::NotArchived);
        assert_eq!(r.restore_expiry, None);
        assert_eq!(r.version, 1);
        assert_eq!(r.last_tier_change_at, r.created_at);
        assert!(r.check_invariants().is_ok());
    }

    #[test]
    fn test_age_days() {
        let r = record();
        assert_eq!(r.age_days(r.created_at), 0);
        assert_eq!(r.age_days(r.created_at + 91 * 86_400), 91);
        // Clock skew must not underflow
        assert_eq!(r.age_days(r.created_at - 10), 0);
    }

    #[test]
    fn test_retrievability() {
        let mut r = record();
        let now = r.created_at;
        assert!(r.is_retrievable(now));

        r.storage_tier = StorageTier::DeepArchive;
        r.restore_status = RestoreStatus::Archived;
        assert!(!r.is_retrievable(now));

        r.restore_status = RestoreStatus::Restored;
        r.restore_expiry = Some(now + 100);
        assert!(r.is_retrievable(now));
        assert!(!r.is_retrievable(now + 101));
    }

    #[test]
    fn test_invariant_violations_detected() {
        let mut r = record();
        r.restore_status = RestoreStatus::Archived;
        assert!(r.check_invariants().is_err());

        let mut r = record();
        r.storage_tier = StorageTier::Archive;
        r.restore_status = RestoreStatus::Restored;
        assert!(r.check_invariants().is_err()); // missing expiry

        r.restore_expiry = Some(1);
        assert!(r.check_invariants().is_ok());

        r.restore_status = RestoreStatus::Archived;
        assert!(r.check_invariants().is_err()); // dangling expiry
    }

    #[test]
    fn test_document_id_serde_is_transparent() {
        let id = DocumentId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: DocumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
