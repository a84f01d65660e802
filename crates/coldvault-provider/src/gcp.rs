//! Google Cloud Storage backend
//!
//! Uses the JSON API with bearer-token auth. Every GCS storage class is
//! online, so probes never report a restore requirement; tier changes and
//! restores are both object rewrites that swap the storage class.

use crate::aws::sigv4::uri_encode;
use crate::config::GcpConfig;
use crate::error::{classify_status, classify_transport, ProviderError};
use crate::types::{ArchiveProbe, RestoreProbe, TierChange, UploadObject};
use crate::StorageProvider;
use async_trait::async_trait;
use bytes::Bytes;
use coldvault_domain::{ProviderKind, RestoreSpeed, StorageTier};
use reqwest::Method;
use std::time::Duration;

/// GCS storage class for a tier
fn tier_to_class(tier: StorageTier) -> &'static str {
    match tier {
        StorageTier::Standard => "STANDARD",
        StorageTier::Infrequent => "NEARLINE",
        StorageTier::Archive => "COLDLINE",
        StorageTier::DeepArchive => "ARCHIVE",
    }
}

/// Tier for a GCS storage class; unknown classes read as Standard
fn class_to_tier(class: &str) -> StorageTier {
    match class {
        "NEARLINE" => StorageTier::Infrequent,
        "COLDLINE" => StorageTier::Archive,
        "ARCHIVE" => StorageTier::DeepArchive,
        _ => StorageTier::Standard,
    }
}

/// Google Cloud Storage implementation of [`StorageProvider`]
pub struct GcpProvider {
    config: GcpConfig,
    client: reqwest::Client,
}

impl GcpProvider {
    /// Create a provider for the configured bucket
    pub fn new(config: GcpConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        self.config
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://storage.googleapis.com".to_string())
    }

    /// `.../storage/v1/b/<bucket>/o/<object>` with the object name fully
    /// percent-encoded (slashes included, as the JSON API requires)
    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint(),
            self.config.bucket,
            uri_encode(path, true)
        )
    }

    async fn request(
        &self,
        method: Method,
        url: String,
        body: Option<Vec<u8>>,
        content_type: Option<&str>,
        timeout: Duration,
        op: &'static str,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .request(method, url)
            .timeout(timeout)
            .bearer_auth(&self.config.access_token);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        builder.send().await.map_err(|e| classify_transport(op, e))
    }

    /// Fetch object metadata as JSON
    async fn metadata(
        &self,
        path: &str,
        op: &'static str,
    ) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .request(
                Method::GET,
                self.object_url(path),
                None,
                None,
                self.config.timeouts.probe(),
                op,
            )
            .await?;
        match response.status().as_u16() {
            200 => response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", op, e))),
            404 => Err(ProviderError::NotFound(path.to_string())),
            s => Err(classify_status(s, path)),
        }
    }

    /// Rewrite the object over itself with a new storage class, following
    /// `rewriteToken` continuations until the copy reports done
    async fn rewrite_to_class(
        &self,
        path: &str,
        class: &'static str,
        timeout: Duration,
    ) -> Result<(), ProviderError> {
        let base = format!(
            "{}/rewriteTo/b/{}/o/{}",
            self.object_url(path),
            self.config.bucket,
            uri_encode(path, true)
        );
        let body = format!("{{\"storageClass\":\"{}\"}}", class);
        let mut token: Option<String> = None;
        loop {
            let url = match &token {
                Some(t) => format!("{}?rewriteToken={}", base, uri_encode(t, true)),
                None => base.clone(),
            };
            let response = self
                .request(
                    Method::POST,
                    url,
                    Some(body.clone().into_bytes()),
                    Some("application/json"),
                    timeout,
                    "rewrite",
                )
                .await?;
            match response.status().as_u16() {
                200 => {
                    let value: serde_json::Value = response
                        .json()
                        .await
                        .map_err(|e| ProviderError::InvalidResponse(format!("rewrite: {}", e)))?;
                    if value.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
                        return Ok(());
                    }
                    token = value
                        .get("rewriteToken")
                        .and_then(|t| t.as_str())
                        .map(str::to_string);
                    if token.is_none() {
                        return Err(ProviderError::InvalidResponse(
                            "rewrite neither done nor continuable".to_string(),
                        ));
                    }
                }
                404 => return Err(ProviderError::NotFound(path.to_string())),
                s => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(classify_status(s, &body));
                }
            }
        }
    }
}

#[async_trait]
impl StorageProvider for GcpProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gcp
    }

    async fn upload(&self, object: &UploadObject) -> Result<String, ProviderError> {
        let key = object.storage_path();
        // Media upload carries no custom metadata; tags stay in the document
        // record
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoint(),
            self.config.bucket,
            uri_encode(&key, true)
        );
        let response = self
            .request(
                Method::POST,
                url,
                Some(object.data.to_vec()),
                Some(&object.content_type),
                self.config.timeouts.transfer(),
                "upload",
            )
            .await?;
        let status = response.status().as_u16();
        if status == 200 {
            tracing::info!(
                "Uploaded document {} to gs://{}/{}",
                object.document_id,
                self.config.bucket,
                key
            );
            Ok(key)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status, &body))
        }
    }

    async fn download(&self, path: &str) -> Result<Bytes, ProviderError> {
        let url = format!("{}?alt=media", self.object_url(path));
        let response = self
            .request(
                Method::GET,
                url,
                None,
                None,
                self.config.timeouts.transfer(),
                "download",
            )
            .await?;
        match response.status().as_u16() {
            200 => response
                .bytes()
                .await
                .map_err(|e| classify_transport("download", e)),
            404 => Err(ProviderError::NotFound(path.to_string())),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(classify_status(s, &body))
            }
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, ProviderError> {
        match self.metadata(path, "exists").await {
            Ok(_) => Ok(true),
            Err(ProviderError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        let response = self
            .request(
                Method::DELETE,
                self.object_url(path),
                None,
                None,
                self.config.timeouts.restore(),
                "delete",
            )
            .await?;
        match response.status().as_u16() {
            200 | 204 | 404 => Ok(()),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(classify_status(s, &body))
            }
        }
    }

    async fn archive_to_tier(
        &self,
        path: &str,
        target: StorageTier,
    ) -> Result<TierChange, ProviderError> {
        let meta = self.metadata(path, "archive_to_tier").await?;
        let previous = class_to_tier(
            meta.get("storageClass")
                .and_then(|c| c.as_str())
                .unwrap_or("STANDARD"),
        );
        if previous != target {
            self.rewrite_to_class(path, tier_to_class(target), self.config.timeouts.tier_change())
                .await?;
            tracing::info!("Moved gs://{}/{} to {}", self.config.bucket, path, target);
        }
        // Every GCS class stays readable, so the move never strands the
        // object behind a restore
        Ok(TierChange {
            previous_tier: previous,
            new_tier: target,
            immediate: true,
        })
    }

    async fn archive_status(&self, path: &str) -> Result<ArchiveProbe, ProviderError> {
        let meta = self.metadata(path, "archive_status").await?;
        let tier = class_to_tier(
            meta.get("storageClass")
                .and_then(|c| c.as_str())
                .unwrap_or("STANDARD"),
        );
        Ok(ArchiveProbe {
            tier,
            restore: RestoreProbe::NotNeeded,
        })
    }

    async fn request_restore(
        &self,
        path: &str,
        days: u32,
        speed: RestoreSpeed,
    ) -> Result<(), ProviderError> {
        // Cold GCS objects are already readable; restoring moves them back
        // to STANDARD so later reads stop paying retrieval fees. No expiring
        // copy exists, so days and speed do not translate.
        self.rewrite_to_class(path, "STANDARD", self.config.timeouts.restore())
            .await?;
        tracing::info!(
            "Rewrote gs://{}/{} to STANDARD for restore ({} days, {} ignored)",
            self.config.bucket,
            path,
            days,
            speed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderTimeouts;

    #[test]
    fn test_class_mapping() {
        assert_eq!(tier_to_class(StorageTier::Standard), "STANDARD");
        assert_eq!(tier_to_class(StorageTier::Infrequent), "NEARLINE");
        assert_eq!(tier_to_class(StorageTier::Archive), "COLDLINE");
        assert_eq!(tier_to_class(StorageTier::DeepArchive), "ARCHIVE");

        assert_eq!(class_to_tier("NEARLINE"), StorageTier::Infrequent);
        assert_eq!(class_to_tier("COLDLINE"), StorageTier::Archive);
        assert_eq!(class_to_tier("ARCHIVE"), StorageTier::DeepArchive);
        assert_eq!(class_to_tier("MULTI_REGIONAL"), StorageTier::Standard);
    }

    #[test]
    fn test_object_url_encodes_slashes() {
        let provider = GcpProvider::new(GcpConfig {
            bucket: "document-archive".to_string(),
            access_token: "token".to_string(),
            endpoint: None,
            timeouts: ProviderTimeouts::default(),
        });
        assert_eq!(
            provider.object_url("archives/2026/01/02/x/report.pdf"),
            "https://storage.googleapis.com/storage/v1/b/document-archive/o/archives%2F2026%2F01%2F02%2Fx%2Freport.pdf"
        );
    }
}
