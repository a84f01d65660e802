//! Coldvault Storage Providers
//!
//! The provider-agnostic capability set every cold-storage backend
//! implements, plus the four backend implementations:
//!
//! - [`LocalProvider`]: filesystem backend with full tier/restore semantics
//!   (development and tests get production behavior, not a stub)
//! - [`AwsProvider`]: S3 REST with SigV4 signing and Glacier storage classes
//! - [`AzureProvider`]: Blob Storage REST with SAS auth and access tiers
//! - [`GcpProvider`]: GCS JSON API with bearer auth and storage classes
//!
//! [`MockProvider`] is a scriptable test double used by the engine suite.
//!
//! # Contract
//!
//! Every method is safe to retry (at-least-once from the caller's view); the
//! document id is the idempotency key, so a retried upload derives the same
//! storage path. Every call carries an explicit per-operation timeout from
//! [`ProviderTimeouts`] because probes must return quickly while transfers
//! may legitimately run long.
//!
//! Tier changes to cold tiers only change the *intended* storage class; they
//! never make an object retrievable. Retrievability is granted exclusively
//! by a completed restore, which [`StorageProvider::archive_status`] reports
//! as a side-effect-free probe.

#![warn(missing_docs)]

mod aws;
mod azure;
mod config;
mod error;
mod gcp;
mod local;
mod mock;
mod registry;
mod timefmt;
mod types;

use async_trait::async_trait;
use bytes::Bytes;
use coldvault_domain::{ProviderKind, RestoreSpeed, StorageTier};

pub use aws::AwsProvider;
pub use azure::AzureProvider;
pub use config::{AwsConfig, AzureConfig, GcpConfig, LocalConfig, ProviderTimeouts};
pub use error::ProviderError;
pub use gcp::GcpProvider;
pub use local::LocalProvider;
pub use mock::MockProvider;
pub use registry::ProviderRegistry;
pub use types::{storage_key, ArchiveProbe, RestoreProbe, TierChange, UploadObject};

/// Uniform capability set implemented once per backend
///
/// Implementations hold no orchestration logic; deciding *when* to move or
/// restore a document belongs to the engine.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> ProviderKind;

    /// Store the object and return its storage path
    ///
    /// The path is derived deterministically from the document id and
    /// `created_at`, so a retried upload overwrites the same key instead of
    /// creating a duplicate.
    async fn upload(&self, object: &UploadObject) -> Result<String, ProviderError>;

    /// Fetch the object bytes
    ///
    /// Fails with [`ProviderError::NotRetrievable`] when the object exists
    /// but sits in a cold tier without an active restore. The remedy is to
    /// request a restore, not to retry the download.
    async fn download(&self, path: &str) -> Result<Bytes, ProviderError>;

    /// Whether an object exists at the path
    ///
    /// Never errors on a missing object, only on connectivity failure.
    async fn exists(&self, path: &str) -> Result<bool, ProviderError>;

    /// Delete the object; deleting an absent object is a success
    async fn delete(&self, path: &str) -> Result<(), ProviderError>;

    /// Change the object's storage tier
    ///
    /// Synchronous for warm tiers; for cold tiers the storage class changes
    /// but retrievability does not.
    async fn archive_to_tier(
        &self,
        path: &str,
        target: StorageTier,
    ) -> Result<TierChange, ProviderError>;

    /// Read-only probe of the object's tier and restore state
    ///
    /// Idempotent and side-effect free; the restore poller calls this
    /// arbitrarily often.
    async fn archive_status(&self, path: &str) -> Result<ArchiveProbe, ProviderError>;

    /// Initiate a provider-side restore job
    ///
    /// Idempotent: while a job is already running, a second call extends it
    /// or no-ops; it never starts a second conflicting job.
    async fn request_restore(
        &self,
        path: &str,
        days: u32,
        speed: RestoreSpeed,
    ) -> Result<(), ProviderError>;
}
