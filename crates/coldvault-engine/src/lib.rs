//! Coldvault Lifecycle Engine
//!
//! Orchestrates the cold-storage lifecycle of archived documents across
//! pluggable storage backends:
//!
//! - [`LifecycleScheduler`]: moves documents to colder tiers as they age
//!   past configured thresholds
//! - [`RestorePoller`]: completes in-progress restores once the backend
//!   reports them retrievable, and lapses expired restore windows
//! - [`ArchiveOrchestrator`]: request-scoped entry points (upload, retrieve,
//!   archive-now, restore-now, status) plus the batch façade
//! - [`LifecycleWorker`]: timer-driven background runner for sweeps and
//!   restore checks
//!
//! # Consistency model
//!
//! The metadata store is authoritative for *intent*; the backend for *fact*;
//! the restore poller is the only path that reconciles fact into intent.
//! Every record mutation goes through the
//! [`coldvault_domain::TierStateMachine`] and commits with a conditional
//! version update, so overlapping sweeps, checks, and request-scoped calls
//! serialize per document and publish each event at most once.
//!
//! # Examples
//!
//! ```
//! use coldvault_engine::{ArchiveOrchestrator, EngineConfig, MemoryEventSink, UploadRequest};
//! use coldvault_provider::{MockProvider, ProviderRegistry};
//! use coldvault_store::MemoryMetadataStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut providers = ProviderRegistry::new();
//! providers.register(Arc::new(MockProvider::new()));
//!
//! let engine = ArchiveOrchestrator::new(
//!     EngineConfig::default(),
//!     Arc::new(MemoryMetadataStore::new()),
//!     Arc::new(providers),
//!     Arc::new(MemoryEventSink::new()),
//! );
//!
//! let record = engine
//!     .upload_document(UploadRequest {
//!         filename: "report.pdf".into(),
//!         content_type: "application/pdf".into(),
//!         data: bytes::Bytes::from_static(b"..."),
//!         tags: Default::default(),
//!         provider: None,
//!     })
//!     .await?;
//! assert_eq!(engine.retrieve_document(record.document_id).await?.len(), 3);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod events;
mod lifecycle;
mod orchestrator;
mod poller;
mod pool;
mod retry;
mod worker;

pub use config::{EngineConfig, RetryPolicy};
pub use error::EngineError;
pub use events::{Event, EventError, EventKind, EventSink, LogEventSink, MemoryEventSink};
pub use lifecycle::{
    LifecycleCandidate, LifecycleScheduler, SweepAction, SweepDetail, SweepReport,
};
pub use orchestrator::{
    ArchiveOrchestrator, RestoreOutcome, StatusReport, TierChangeOutcome, UploadRequest,
};
pub use poller::{RestoreAction, RestoreCheckReport, RestoreDetail, RestorePoller};
pub use pool::{run_batch, BatchOutcome, CancelToken};
pub use retry::{RetryDisposition, RetryLedger};
pub use worker::LifecycleWorker;

/// Current epoch seconds
pub(crate) fn now_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
