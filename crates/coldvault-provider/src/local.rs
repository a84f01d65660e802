//! Local filesystem backend
//!
//! Development and test backend with the full production semantics: cold
//! tiers refuse downloads until a restore is granted, and restores expire.
//! Objects live under one root keyed by the deterministic storage path; a
//! JSON sidecar (`<file>.meta.json`) records tier, restore state, and a
//! SHA-256 content digest. The locator never changes across tier moves.

use crate::config::LocalConfig;
use crate::error::ProviderError;
use crate::timefmt::now_epoch;
use crate::types::{ArchiveProbe, RestoreProbe, TierChange, UploadObject};
use crate::StorageProvider;
use async_trait::async_trait;
use bytes::Bytes;
use coldvault_domain::{ProviderKind, RestoreSpeed, StorageTier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sidecar {
    document_id: String,
    filename: String,
    content_type: String,
    size_bytes: u64,
    tags: BTreeMap<String, String>,
    sha256: String,
    uploaded_at: u64,
    tier: StorageTier,
    #[serde(default)]
    restore: Option<SidecarRestore>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SidecarRestore {
    expires_at: u64,
}

/// Local filesystem implementation of [`StorageProvider`]
///
/// # Examples
///
/// ```no_run
/// use coldvault_provider::{LocalConfig, LocalProvider};
///
/// let provider = LocalProvider::new(LocalConfig::new("./documents"));
/// ```
pub struct LocalProvider {
    config: LocalConfig,
}

impl LocalProvider {
    /// Create a provider rooted at `config.root`
    pub fn new(config: LocalConfig) -> Self {
        Self { config }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.config.root.join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.config.root.join(format!("{}.meta.json", key))
    }

    async fn read_sidecar(&self, key: &str) -> Result<Sidecar, ProviderError> {
        let raw = tokio::fs::read(self.sidecar_path(key))
            .await
            .map_err(|e| io_error(key, e))?;
        serde_json::from_slice(&raw).map_err(|e| {
            ProviderError::InvalidResponse(format!("corrupt sidecar for {}: {}", key, e))
        })
    }

    async fn write_sidecar(&self, key: &str, sidecar: &Sidecar) -> Result<(), ProviderError> {
        let raw = serde_json::to_vec_pretty(sidecar)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        tokio::fs::write(self.sidecar_path(key), raw)
            .await
            .map_err(|e| io_error(key, e))
    }

    fn probe_from_sidecar(sidecar: &Sidecar, now: u64) -> ArchiveProbe {
        let restore = if !sidecar.tier.is_cold() {
            RestoreProbe::NotNeeded
        } else {
            match sidecar.restore {
                Some(r) if r.expires_at > now => RestoreProbe::Ready {
                    expires_at: Some(r.expires_at),
                },
                _ => RestoreProbe::Required,
            }
        };
        ArchiveProbe {
            tier: sidecar.tier,
            restore,
        }
    }
}

fn io_error(key: &str, err: std::io::Error) -> ProviderError {
    if err.kind() == ErrorKind::NotFound {
        ProviderError::NotFound(key.to_string())
    } else {
        ProviderError::Unavailable(format!("{}: {}", key, err))
    }
}

async fn ensure_parent(path: &Path, key: &str) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(key, e))?;
    }
    Ok(())
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn upload(&self, object: &UploadObject) -> Result<String, ProviderError> {
        let key = object.storage_path();
        let path = self.object_path(&key);
        ensure_parent(&path, &key).await?;

        tokio::fs::write(&path, &object.data)
            .await
            .map_err(|e| io_error(&key, e))?;

        let sidecar = Sidecar {
            document_id: object.document_id.to_string(),
            filename: object.filename.clone(),
            content_type: object.content_type.clone(),
            size_bytes: object.data.len() as u64,
            tags: object.tags.clone(),
            sha256: hex::encode(Sha256::digest(&object.data)),
            uploaded_at: now_epoch(),
            tier: StorageTier::Standard,
            restore: None,
        };
        self.write_sidecar(&key, &sidecar).await?;

        tracing::info!(
            "Uploaded {} ({} bytes) to local storage at {}",
            object.filename,
            object.data.len(),
            key
        );
        Ok(key)
    }

    async fn download(&self, path: &str) -> Result<Bytes, ProviderError> {
        let sidecar = self.read_sidecar(path).await?;
        let probe = Self::probe_from_sidecar(&sidecar, now_epoch());
        if !probe.is_retrievable() {
            return Err(ProviderError::NotRetrievable {
                tier: Some(sidecar.tier),
            });
        }
        let data = tokio::fs::read(self.object_path(path))
            .await
            .map_err(|e| io_error(path, e))?;
        Ok(Bytes::from(data))
    }

    async fn exists(&self, path: &str) -> Result<bool, ProviderError> {
        match tokio::fs::metadata(self.object_path(path)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ProviderError::Unavailable(format!("{}: {}", path, e))),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        for target in [self.object_path(path), self.sidecar_path(path)] {
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(path, e)),
            }
        }
        Ok(())
    }

    async fn archive_to_tier(
        &self,
        path: &str,
        target: StorageTier,
    ) -> Result<TierChange, ProviderError> {
        let mut sidecar = self.read_sidecar(path).await?;
        let previous = sidecar.tier;
        if previous != target {
            sidecar.tier = target;
            self.write_sidecar(path, &sidecar).await?;
            tracing::info!("Moved {} from {} to {}", path, previous, target);
        }
        Ok(TierChange {
            previous_tier: previous,
            new_tier: target,
            immediate: !target.is_cold(),
        })
    }

    async fn archive_status(&self, path: &str) -> Result<ArchiveProbe, ProviderError> {
        let sidecar = self.read_sidecar(path).await?;
        Ok(Self::probe_from_sidecar(&sidecar, now_epoch()))
    }

    async fn request_restore(
        &self,
        path: &str,
        days: u32,
        _speed: RestoreSpeed,
    ) -> Result<(), ProviderError> {
        let mut sidecar = self.read_sidecar(path).await?;
        if !sidecar.tier.is_cold() {
            return Ok(());
        }
        let requested = now_epoch() + u64::from(days) * 86_400;
        // Renewal extends, never shortens, the existing window
        let expires_at = match sidecar.restore {
            Some(r) => r.expires_at.max(requested),
            None => requested,
        };
        sidecar.restore = Some(SidecarRestore { expires_at });
        self.write_sidecar(path, &sidecar).await?;
        tracing::info!("Granted restore of {} for {} days", path, days);
        Ok(())
    }
}
