//! Request-scoped entry points and the engine façade
//!
//! The orchestrator serves caller-initiated operations (upload, retrieve,
//! archive, restore, status) and delegates the batch entry points to its
//! scheduler and poller, so an API layer needs a single handle.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{emit, EventKind, EventSink};
use crate::lifecycle::{LifecycleCandidate, LifecycleScheduler, SweepReport};
use crate::now_epoch;
use crate::poller::{RestoreCheckReport, RestorePoller};
use crate::pool::CancelToken;
use bytes::Bytes;
use coldvault_domain::{
    DocumentId, DocumentRecord, ProviderKind, RestoreSpeed, RestoreStatus, StorageTier,
    TierStateMachine, TransitionOutcome,
};
use coldvault_provider::{ProviderRegistry, StorageProvider, UploadObject};
use coldvault_store::MetadataStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of an explicit `archive_now` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierChangeOutcome {
    /// Which document
    pub document_id: DocumentId,

    /// Tier before the request
    pub previous_tier: StorageTier,

    /// Tier after the request
    pub new_tier: StorageTier,

    /// False when the document was already at the target (no-op success)
    pub changed: bool,
}

/// Result of an explicit `restore_now` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    /// Which document
    pub document_id: DocumentId,

    /// Restore state after the request
    pub restore_status: RestoreStatus,

    /// Expiry of the (possibly renewed) restore window, when one exists
    pub restore_expiry: Option<u64>,

    /// Human-readable completion estimate for the requested speed
    pub estimated_completion: String,
}

/// Point-in-time view of one document's tier and restore state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Which document
    pub document_id: DocumentId,

    /// Recorded storage tier
    pub storage_tier: StorageTier,

    /// Recorded restore state
    pub restore_status: RestoreStatus,

    /// Recorded restore expiry
    pub restore_expiry: Option<u64>,

    /// Whether the object can be downloaded right now, backend-probed when
    /// possible and record-derived when the probe fails transiently
    pub is_retrievable: bool,
}

/// Payload and metadata for a document ingest
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Original filename
    pub filename: String,

    /// MIME type
    pub content_type: String,

    /// The payload
    pub data: Bytes,

    /// Key-value tags to store with the document
    pub tags: BTreeMap<String, String>,

    /// Backend to store on; the configured default when absent
    pub provider: Option<ProviderKind>,
}

/// Single handle over every engine operation
pub struct ArchiveOrchestrator {
    config: EngineConfig,
    store: Arc<dyn MetadataStore>,
    providers: Arc<ProviderRegistry>,
    events: Arc<dyn EventSink>,
    scheduler: LifecycleScheduler,
    poller: RestorePoller,
}

impl ArchiveOrchestrator {
    /// Create an orchestrator (and its scheduler and poller) over the given
    /// store, providers, and event sink
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn MetadataStore>,
        providers: Arc<ProviderRegistry>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let scheduler = LifecycleScheduler::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&providers),
            Arc::clone(&events),
        );
        let poller = RestorePoller::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&providers),
            Arc::clone(&events),
        );
        Self {
            config,
            store,
            providers,
            events,
            scheduler,
            poller,
        }
    }

    fn fetch(&self, id: DocumentId) -> Result<DocumentRecord, EngineError> {
        self.store.get(id)?.ok_or(EngineError::NotFound(id))
    }

    fn provider_for(
        &self,
        kind: ProviderKind,
    ) -> Result<Arc<dyn StorageProvider>, EngineError> {
        self.providers
            .get(kind)
            .ok_or(EngineError::UnknownProvider(kind))
    }

    /// Store a new document at Standard tier and insert its record
    pub async fn upload_document(
        &self,
        request: UploadRequest,
    ) -> Result<DocumentRecord, EngineError> {
        let kind = request.provider.unwrap_or(self.config.default_provider);
        let provider = self.provider_for(kind)?;
        let now = now_epoch();
        let document_id = DocumentId::new();

        let object = UploadObject {
            document_id,
            filename: request.filename.clone(),
            content_type: request.content_type.clone(),
            data: request.data.clone(),
            tags: request.tags.clone(),
            created_at: now,
        };
        let storage_path = provider.upload(&object).await?;

        let record = DocumentRecord::new(
            document_id,
            storage_path,
            kind,
            request.filename,
            request.content_type,
            request.data.len() as u64,
            request.tags,
            now,
        );
        self.store.insert(&record)?;
        emit(
            self.events.as_ref(),
            EventKind::Archived,
            document_id,
            serde_json::json!({
                "provider": kind,
                "storage_path": record.storage_path,
                "size_bytes": record.size_bytes,
            }),
        );
        Ok(record)
    }

    /// Download a document's bytes
    ///
    /// A cold, un-restored object surfaces
    /// [`coldvault_provider::ProviderError::NotRetrievable`]; the remedy is
    /// a restore, never a retry.
    pub async fn retrieve_document(&self, id: DocumentId) -> Result<Bytes, EngineError> {
        let record = self.fetch(id)?;
        let provider = self.provider_for(record.provider)?;
        Ok(provider.download(&record.storage_path).await?)
    }

    /// Move a document to a colder tier immediately
    ///
    /// A same-tier repeat is a success no-op with `changed = false`, no
    /// version bump, and no event.
    pub async fn archive_now(
        &self,
        id: DocumentId,
        target: StorageTier,
    ) -> Result<TierChangeOutcome, EngineError> {
        let record = self.fetch(id)?;
        let changed = self
            .scheduler
            .transition_document(&record, target, now_epoch())
            .await?;
        Ok(TierChangeOutcome {
            document_id: id,
            previous_tier: record.storage_tier,
            new_tier: target,
            changed,
        })
    }

    /// Request (or renew) a restore
    ///
    /// Initiation moves the record to `InProgress` and publishes
    /// `restore_initiated`. A renewal while `Restored` extends the expiry
    /// without passing through `InProgress`. A duplicate while `InProgress`
    /// is a no-op carrying the estimate for the requested speed.
    pub async fn restore_now(
        &self,
        id: DocumentId,
        days: Option<u32>,
        speed: Option<RestoreSpeed>,
    ) -> Result<RestoreOutcome, EngineError> {
        let record = self.fetch(id)?;
        let days = days.unwrap_or(self.config.restore_days);
        let speed = speed.unwrap_or(self.config.restore_speed);
        let now = now_epoch();

        let updated = match TierStateMachine::request_restore(&record, days, now)? {
            TransitionOutcome::Applied(updated) => updated,
            TransitionOutcome::NoOp => {
                // Already in progress; report the standing request
                return Ok(RestoreOutcome {
                    document_id: id,
                    restore_status: record.restore_status,
                    restore_expiry: record.restore_expiry,
                    estimated_completion: speed.estimated_completion().to_string(),
                });
            }
        };

        let provider = self.provider_for(record.provider)?;
        provider
            .request_restore(&record.storage_path, days, speed)
            .await?;

        if !self.store.update_if_version(&updated, record.version)? {
            return Err(EngineError::VersionConflict { document_id: id });
        }

        // Renewals only extend the window; initiation is what announces a
        // new restore job
        if record.restore_status != RestoreStatus::Restored {
            emit(
                self.events.as_ref(),
                EventKind::RestoreInitiated,
                id,
                serde_json::json!({
                    "days": days,
                    "speed": speed,
                    "estimated_completion": speed.estimated_completion(),
                }),
            );
        }

        Ok(RestoreOutcome {
            document_id: id,
            restore_status: updated.restore_status,
            restore_expiry: updated.restore_expiry,
            estimated_completion: speed.estimated_completion().to_string(),
        })
    }

    /// Report a document's tier and restore state
    ///
    /// Asks the backend read-only for live retrievability and never writes
    /// reconciliation back; when the probe fails transiently the report
    /// degrades to record-derived retrievability.
    pub async fn get_status(&self, id: DocumentId) -> Result<StatusReport, EngineError> {
        let record = self.fetch(id)?;
        let provider = self.provider_for(record.provider)?;
        let is_retrievable = match provider.archive_status(&record.storage_path).await {
            Ok(probe) => probe.is_retrievable(),
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    "Status probe for document {} degraded to record state: {}",
                    id,
                    e
                );
                record.is_retrievable(now_epoch())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(StatusReport {
            document_id: id,
            storage_tier: record.storage_tier,
            restore_status: record.restore_status,
            restore_expiry: record.restore_expiry,
            is_retrievable,
        })
    }

    /// Run one lifecycle sweep (see [`LifecycleScheduler::run_sweep`])
    pub async fn run_lifecycle_sweep(&self, dry_run: bool) -> Result<SweepReport, EngineError> {
        self.scheduler.run_sweep(dry_run, &CancelToken::new()).await
    }

    /// Run one restore check (see [`RestorePoller::run_check`])
    pub async fn run_restore_check(&self) -> Result<RestoreCheckReport, EngineError> {
        self.poller.run_check(&CancelToken::new()).await
    }

    /// The eligibility computation as data (see
    /// [`LifecycleScheduler::list_eligible`])
    pub fn list_eligible(&self, as_of: u64) -> Result<Vec<LifecycleCandidate>, EngineError> {
        self.scheduler.list_eligible(as_of)
    }
}
