//! Coldvault Metadata Store
//!
//! Persists one [`DocumentRecord`] per archived document and serializes all
//! mutations through a conditional (versioned) update, so a request-scoped
//! orchestrator call and a background sweep can never both apply overlapping
//! changes to the same document undetected.
//!
//! # Implementations
//!
//! - [`SqliteMetadataStore`]: SQLite (bundled, WAL) for real deployments
//! - [`MemoryMetadataStore`]: in-memory map for tests and embedded use
//!
//! # Examples
//!
//! ```
//! use coldvault_store::{MemoryMetadataStore, MetadataStore};
//!
//! let store = MemoryMetadataStore::new();
//! assert!(store.get(coldvault_domain::DocumentId::new()).unwrap().is_none());
//! ```

#![warn(missing_docs)]

mod memory;
mod sqlite;

use coldvault_domain::{DocumentId, DocumentRecord, ProviderKind, RestoreStatus, StorageTier};
use thiserror::Error;

pub use memory::MemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

/// Errors that can occur during metadata store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data format in a stored row
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A record with the same document id already exists
    #[error("Duplicate document: {0}")]
    Duplicate(DocumentId),

    /// No record exists for the document id
    #[error("Document not found: {0}")]
    NotFound(DocumentId),
}

/// Predicate for scan queries over document records
///
/// All fields are conjunctive; `None` means "don't filter on this". Used by
/// the lifecycle sweep (created-before + tier set) and the restore poller
/// (restore-status, expiry-before).
#[derive(Debug, Clone, Default)]
pub struct EligibilityFilter {
    /// Only records created strictly before this epoch-seconds cutoff
    pub created_before: Option<u64>,

    /// Only records currently in one of these tiers
    pub tiers: Option<Vec<StorageTier>>,

    /// Only records in this restore state
    pub restore_status: Option<RestoreStatus>,

    /// Only records whose restore expiry is at or before this timestamp
    pub expiry_before: Option<u64>,

    /// Only records on this backend
    pub provider: Option<ProviderKind>,

    /// Cap the number of returned records
    pub limit: Option<usize>,
}

impl EligibilityFilter {
    /// Whether a record satisfies every set predicate (limit excluded)
    pub fn matches(&self, record: &DocumentRecord) -> bool {
        if let Some(cutoff) = self.created_before {
            if record.created_at >= cutoff {
                return false;
            }
        }
        if let Some(tiers) = &self.tiers {
            if !tiers.contains(&record.storage_tier) {
                return false;
            }
        }
        if let Some(status) = self.restore_status {
            if record.restore_status != status {
                return false;
            }
        }
        if let Some(cutoff) = self.expiry_before {
            match record.restore_expiry {
                Some(expiry) if expiry <= cutoff => {}
                _ => return false,
            }
        }
        if let Some(provider) = self.provider {
            if record.provider != provider {
                return false;
            }
        }
        true
    }
}

/// Persistent store for document records
///
/// The store is the single source of truth for the engine's view of every
/// document. Implementations must be safe to share across tasks (`&self`
/// methods, internal synchronization).
pub trait MetadataStore: Send + Sync {
    /// Insert a new record; fails with [`StoreError::Duplicate`] if the
    /// document id is already present
    fn insert(&self, record: &DocumentRecord) -> Result<(), StoreError>;

    /// Fetch a record by document id
    fn get(&self, id: DocumentId) -> Result<Option<DocumentRecord>, StoreError>;

    /// Conditionally replace a record
    ///
    /// Writes `record` (with its version set to `expected_version + 1`) only
    /// if the stored version still equals `expected_version`. Returns
    /// `Ok(false)` on a version conflict, leaving the stored record
    /// untouched; the caller must re-read and re-validate against the
    /// now-current state.
    fn update_if_version(
        &self,
        record: &DocumentRecord,
        expected_version: u64,
    ) -> Result<bool, StoreError>;

    /// Scan records matching a filter, in `created_at` order
    fn list_eligible(&self, filter: &EligibilityFilter) -> Result<Vec<DocumentRecord>, StoreError>;
}
