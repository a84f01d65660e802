//! In-memory metadata store for tests and embedded use

use crate::{EligibilityFilter, MetadataStore, StoreError};
use coldvault_domain::{DocumentId, DocumentRecord};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory implementation of [`MetadataStore`]
///
/// Backed by a `RwLock<HashMap>`; the conditional update takes the write
/// lock for the whole compare-and-swap, giving the same serialization
/// guarantee as the SQLite implementation.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: RwLock<HashMap<DocumentId, DocumentRecord>>,
}

impl MemoryMetadataStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held (test convenience)
    pub fn len(&self) -> usize {
        self.records.read().expect("store lock poisoned").len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn insert(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().expect("store lock poisoned");
        if records.contains_key(&record.document_id) {
            return Err(StoreError::Duplicate(record.document_id));
        }
        records.insert(record.document_id, record.clone());
        Ok(())
    }

    fn get(&self, id: DocumentId) -> Result<Option<DocumentRecord>, StoreError> {
        let records = self.records.read().expect("store lock poisoned");
        Ok(records.get(&id).cloned())
    }

    fn update_if_version(
        &self,
        record: &DocumentRecord,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().expect("store lock poisoned");
        let current = records
            .get_mut(&record.document_id)
            .ok_or(StoreError::NotFound(record.document_id))?;
        if current.version != expected_version {
            return Ok(false);
        }
        let mut next = record.clone();
        next.version = expected_version + 1;
        *current = next;
        Ok(true)
    }

    fn list_eligible(&self, filter: &EligibilityFilter) -> Result<Vec<DocumentRecord>, StoreError> {
        let records = self.records.read().expect("store lock poisoned");
        let mut matched: Vec<DocumentRecord> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by_key(|r| (r.created_at, r.document_id));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
