//! Scriptable in-memory provider for engine tests
//!
//! Behaves like a well-functioning backend by default; tests can seed
//! objects, script probe answers, and inject one-shot failures per
//! operation. Every call is recorded for assertion.

use crate::error::ProviderError;
use crate::types::{ArchiveProbe, RestoreProbe, TierChange, UploadObject};
use crate::StorageProvider;
use async_trait::async_trait;
use bytes::Bytes;
use coldvault_domain::{ProviderKind, RestoreSpeed, StorageTier};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct MockObject {
    data: Bytes,
    tier: StorageTier,
    restore: Option<RestoreProbe>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, MockObject>,
    probe_scripts: HashMap<String, VecDeque<ArchiveProbe>>,
    failures: HashMap<&'static str, VecDeque<ProviderError>>,
    calls: Vec<(&'static str, String)>,
}

/// Test double implementing [`StorageProvider`] entirely in memory
pub struct MockProvider {
    kind: ProviderKind,
    inner: Mutex<Inner>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// A mock reporting itself as the local backend
    pub fn new() -> Self {
        Self::for_kind(ProviderKind::Local)
    }

    /// A mock reporting itself as the given backend
    pub fn for_kind(kind: ProviderKind) -> Self {
        Self {
            kind,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Seed an object at a path, in the given tier, with no restore state
    pub fn insert_object(&self, path: &str, data: impl Into<Bytes>, tier: StorageTier) {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.insert(
            path.to_string(),
            MockObject {
                data: data.into(),
                tier,
                restore: None,
            },
        );
    }

    /// Force the restore state of a seeded object
    pub fn set_restore_state(&self, path: &str, restore: RestoreProbe) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(object) = inner.objects.get_mut(path) {
            object.restore = Some(restore);
        }
    }

    /// Script the answers `archive_status` gives for a path, in order; once
    /// the script runs out the derived state answers again
    pub fn script_probes(&self, path: &str, probes: impl IntoIterator<Item = ArchiveProbe>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .probe_scripts
            .entry(path.to_string())
            .or_default()
            .extend(probes);
    }

    /// Make the next call of `op` fail with the given error
    pub fn fail_once(&self, op: &'static str, error: ProviderError) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.entry(op).or_default().push_back(error);
    }

    /// Every call made so far, as `(operation, path)` pairs
    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// How many times `op` was called
    pub fn call_count(&self, op: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(o, _)| *o == op)
            .count()
    }

    fn enter(&self, op: &'static str, path: &str) -> Result<(), ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push((op, path.to_string()));
        if let Some(queue) = inner.failures.get_mut(op) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }
        Ok(())
    }

    fn derived_probe(object: &MockObject) -> ArchiveProbe {
        let restore = if !object.tier.is_cold() {
            RestoreProbe::NotNeeded
        } else {
            object.restore.unwrap_or(RestoreProbe::Required)
        };
        ArchiveProbe {
            tier: object.tier,
            restore,
        }
    }
}

#[async_trait]
impl StorageProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn upload(&self, object: &UploadObject) -> Result<String, ProviderError> {
        let path = object.storage_path();
        self.enter("upload", &path)?;
        let mut inner = self.inner.lock().unwrap();
        inner.objects.insert(
            path.clone(),
            MockObject {
                data: object.data.clone(),
                tier: StorageTier::Standard,
                restore: None,
            },
        );
        Ok(path)
    }

    async fn download(&self, path: &str) -> Result<Bytes, ProviderError> {
        self.enter("download", path)?;
        let inner = self.inner.lock().unwrap();
        let object = inner
            .objects
            .get(path)
            .ok_or_else(|| ProviderError::NotFound(path.to_string()))?;
        if !Self::derived_probe(object).is_retrievable() {
            return Err(ProviderError::NotRetrievable {
                tier: Some(object.tier),
            });
        }
        Ok(object.data.clone())
    }

    async fn exists(&self, path: &str) -> Result<bool, ProviderError> {
        self.enter("exists", path)?;
        Ok(self.inner.lock().unwrap().objects.contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.enter("delete", path)?;
        self.inner.lock().unwrap().objects.remove(path);
        Ok(())
    }

    async fn archive_to_tier(
        &self,
        path: &str,
        target: StorageTier,
    ) -> Result<TierChange, ProviderError> {
        self.enter("archive_to_tier", path)?;
        let mut inner = self.inner.lock().unwrap();
        let object = inner
            .objects
            .get_mut(path)
            .ok_or_else(|| ProviderError::NotFound(path.to_string()))?;
        let previous = object.tier;
        object.tier = target;
        if !target.is_cold() {
            object.restore = None;
        }
        Ok(TierChange {
            previous_tier: previous,
            new_tier: target,
            immediate: !target.is_cold(),
        })
    }

    async fn archive_status(&self, path: &str) -> Result<ArchiveProbe, ProviderError> {
        self.enter("archive_status", path)?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(queue) = inner.probe_scripts.get_mut(path) {
            if let Some(probe) = queue.pop_front() {
                return Ok(probe);
            }
        }
        let object = inner
            .objects
            .get(path)
            .ok_or_else(|| ProviderError::NotFound(path.to_string()))?;
        Ok(Self::derived_probe(object))
    }

    async fn request_restore(
        &self,
        path: &str,
        _days: u32,
        _speed: RestoreSpeed,
    ) -> Result<(), ProviderError> {
        self.enter("request_restore", path)?;
        let mut inner = self.inner.lock().unwrap();
        let object = inner
            .objects
            .get_mut(path)
            .ok_or_else(|| ProviderError::NotFound(path.to_string()))?;
        // A second request while one is running or ready is a no-op
        if object.restore.is_none() {
            object.restore = Some(RestoreProbe::InProgress);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_probes_then_derived_state() {
        let mock = MockProvider::new();
        mock.insert_object("k", &b"data"[..], StorageTier::Archive);
        mock.script_probes(
            "k",
            [ArchiveProbe {
                tier: StorageTier::Archive,
                restore: RestoreProbe::InProgress,
            }],
        );

        let first = mock.archive_status("k").await.unwrap();
        assert_eq!(first.restore, RestoreProbe::InProgress);

        // Script exhausted, derived state answers
        let second = mock.archive_status("k").await.unwrap();
        assert_eq!(second.restore, RestoreProbe::Required);
        assert_eq!(mock.call_count("archive_status"), 2);
    }

    #[tokio::test]
    async fn test_fail_once_then_recover() {
        let mock = MockProvider::new();
        mock.insert_object("k", &b"data"[..], StorageTier::Standard);
        mock.fail_once("download", ProviderError::Unavailable("flaky".into()));

        let err = mock.download("k").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(mock.download("k").await.unwrap(), Bytes::from(&b"data"[..]));
    }

    #[tokio::test]
    async fn test_cold_object_refuses_download_until_restored() {
        let mock = MockProvider::new();
        mock.insert_object("k", &b"data"[..], StorageTier::DeepArchive);

        let err = mock.download("k").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotRetrievable { .. }));

        mock.request_restore("k", 7, RestoreSpeed::Standard)
            .await
            .unwrap();
        assert!(matches!(
            mock.download("k").await.unwrap_err(),
            ProviderError::NotRetrievable { .. }
        ));

        mock.set_restore_state("k", RestoreProbe::Ready { expires_at: None });
        assert_eq!(mock.download("k").await.unwrap(), Bytes::from(&b"data"[..]));
    }
}
