//! SQLite-backed metadata store

use crate::{EligibilityFilter, MetadataStore, StoreError};
use coldvault_domain::{DocumentId, DocumentRecord, ProviderKind, RestoreStatus, StorageTier};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

const SELECT_COLUMNS: &str = "document_id, storage_path, provider, storage_tier, \
     restore_status, restore_expiry, filename, content_type, size_bytes, tags, \
     created_at, last_tier_change_at, version";

/// SQLite-based implementation of [`MetadataStore`]
///
/// Uses a bundled SQLite with WAL journaling. The connection is wrapped in a
/// mutex so the store can be shared across tasks; every statement is short
/// enough that contention is negligible next to provider I/O.
///
/// # Examples
///
/// ```no_run
/// use coldvault_store::SqliteMetadataStore;
///
/// let store = SqliteMetadataStore::new("coldvault.db").unwrap();
/// ```
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open (or create) a store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // WAL returns the resulting mode as a row, so execute won't do
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
        let id_str: String = row.get(0)?;
        let provider_str: String = row.get(2)?;
        let tier_str: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let restore_expiry: Option<i64> = row.get(5)?;
        let tags_json: String = row.get(9)?;

        let document_id = DocumentId::from_string(&id_str)
            .map_err(|e| conversion_error(0, rusqlite::types::Type::Text, e))?;
        let provider = ProviderKind::parse(&provider_str).ok_or_else(|| {
            conversion_error(2, rusqlite::types::Type::Text, format!("unknown provider: {}", provider_str))
        })?;
        let storage_tier = StorageTier::parse(&tier_str).ok_or_else(|| {
            conversion_error(3, rusqlite::types::Type::Text, format!("unknown tier: {}", tier_str))
        })?;
        let restore_status = RestoreStatus::parse(&status_str).ok_or_else(|| {
            conversion_error(4, rusqlite::types::Type::Text, format!("unknown restore status: {}", status_str))
        })?;
        let tags = serde_json::from_str(&tags_json)
            .map_err(|e| conversion_error(9, rusqlite::types::Type::Text, e.to_string()))?;

        Ok(DocumentRecord {
            document_id,
            storage_path: row.get(1)?,
            provider,
            storage_tier,
            restore_status,
            restore_expiry: restore_expiry.map(|v| v as u64),
            filename: row.get(6)?,
            content_type: row.get(7)?,
            size_bytes: row.get::<_, i64>(8)? as u64,
            tags,
            created_at: row.get::<_, i64>(10)? as u64,
            last_tier_change_at: row.get::<_, i64>(11)? as u64,
            version: row.get::<_, i64>(12)? as u64,
        })
    }
}

fn conversion_error(
    column: usize,
    ty: rusqlite::types::Type,
    message: impl Into<String>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        ty,
        Box::<dyn std::error::Error + Send + Sync>::from(message.into()),
    )
}

impl MetadataStore for SqliteMetadataStore {
    fn insert(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");

        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM documents WHERE document_id = ?1",
                params![record.document_id.to_string()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if exists {
            return Err(StoreError::Duplicate(record.document_id));
        }

        let tags_json = serde_json::to_string(&record.tags)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        conn.execute(
            "INSERT INTO documents (document_id, storage_path, provider, storage_tier, \
             restore_status, restore_expiry, filename, content_type, size_bytes, tags, \
             created_at, last_tier_change_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.document_id.to_string(),
                record.storage_path,
                record.provider.as_str(),
                record.storage_tier.as_str(),
                record.restore_status.as_str(),
                record.restore_expiry.map(|v| v as i64),
                record.filename,
                record.content_type,
                record.size_bytes as i64,
                tags_json,
                record.created_at as i64,
                record.last_tier_change_at as i64,
                record.version as i64,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: DocumentId) -> Result<Option<DocumentRecord>, StoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let record = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE document_id = ?1", SELECT_COLUMNS),
                params![id.to_string()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn update_if_version(
        &self,
        record: &DocumentRecord,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let tags_json = serde_json::to_string(&record.tags)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        // The WHERE clause on version is the compare-and-swap; immutable
        // columns are rewritten with their unchanged values
        let changed = conn.execute(
            "UPDATE documents SET storage_path = ?1, storage_tier = ?2, \
             restore_status = ?3, restore_expiry = ?4, tags = ?5, \
             last_tier_change_at = ?6, version = ?7
             WHERE document_id = ?8 AND version = ?9",
            params![
                record.storage_path,
                record.storage_tier.as_str(),
                record.restore_status.as_str(),
                record.restore_expiry.map(|v| v as i64),
                tags_json,
                record.last_tier_change_at as i64,
                (expected_version + 1) as i64,
                record.document_id.to_string(),
                expected_version as i64,
            ],
        )?;
        if changed == 1 {
            return Ok(true);
        }

        // Distinguish a version conflict from a missing row
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM documents WHERE document_id = ?1",
                params![record.document_id.to_string()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if exists {
            Ok(false)
        } else {
            Err(StoreError::NotFound(record.document_id))
        }
    }

    fn list_eligible(&self, filter: &EligibilityFilter) -> Result<Vec<DocumentRecord>, StoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");

        let mut sql = format!("SELECT {} FROM documents WHERE 1=1", SELECT_COLUMNS);
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(cutoff) = filter.created_before {
            sql.push_str(" AND created_at < ?");
            params.push(Box::new(cutoff as i64));
        }
        if let Some(tiers) = &filter.tiers {
            let placeholders = vec!["?"; tiers.len()].join(", ");
            sql.push_str(&format!(" AND storage_tier IN ({})", placeholders));
            for tier in tiers {
                params.push(Box::new(tier.as_str()));
            }
        }
        if let Some(status) = filter.restore_status {
            sql.push_str(" AND restore_status = ?");
            params.push(Box::new(status.as_str()));
        }
        if let Some(cutoff) = filter.expiry_before {
            sql.push_str(" AND restore_expiry IS NOT NULL AND restore_expiry <= ?");
            params.push(Box::new(cutoff as i64));
        }
        if let Some(provider) = filter.provider {
            sql.push_str(" AND provider = ?");
            params.push(Box::new(provider.as_str()));
        }
        sql.push_str(" ORDER BY created_at, document_id");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let records = stmt
            .query_map(&param_refs[..], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
