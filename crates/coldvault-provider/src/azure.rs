//! Azure Blob Storage backend
//!
//! Uses the Blob REST API with SAS-token auth. Tier changes go through
//! `PUT ?comp=tier`; a restore is a rehydration back to Hot, whose progress
//! shows up in the `x-ms-archive-status` header.

use crate::aws::sigv4::uri_encode;
use crate::config::AzureConfig;
use crate::error::{classify_status, classify_transport, ProviderError};
use crate::types::{ArchiveProbe, RestoreProbe, TierChange, UploadObject};
use crate::StorageProvider;
use async_trait::async_trait;
use bytes::Bytes;
use coldvault_domain::{ProviderKind, RestoreSpeed, StorageTier};
use reqwest::Method;
use std::time::Duration;

const API_VERSION: &str = "2023-11-03";

/// Azure access tier for a storage tier
///
/// Azure's Cold tier is online, so only the Archive access tier maps to an
/// offline tier here.
fn tier_to_access_tier(tier: StorageTier) -> &'static str {
    match tier {
        StorageTier::Standard => "Hot",
        StorageTier::Infrequent => "Cool",
        StorageTier::Archive => "Cold",
        StorageTier::DeepArchive => "Archive",
    }
}

/// Storage tier for an Azure access tier; unknown tiers read as Standard
fn access_tier_to_tier(access_tier: &str) -> StorageTier {
    match access_tier {
        "Cool" => StorageTier::Infrequent,
        "Cold" => StorageTier::Archive,
        "Archive" => StorageTier::DeepArchive,
        _ => StorageTier::Standard,
    }
}

/// Azure Blob Storage implementation of [`StorageProvider`]
pub struct AzureProvider {
    config: AzureConfig,
    client: reqwest::Client,
}

impl AzureProvider {
    /// Create a provider for the configured container
    pub fn new(config: AzureConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        self.config.endpoint.clone().unwrap_or_else(|| {
            format!("https://{}.blob.core.windows.net", self.config.account)
        })
    }

    /// Blob URL with the SAS token and any extra query parameters appended
    fn blob_url(&self, path: &str, extra_query: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/{}/{}?{}",
            self.endpoint(),
            self.config.container,
            uri_encode(path, false),
            self.config.sas_token.trim_start_matches('?')
        );
        for (k, v) in extra_query {
            url.push('&');
            url.push_str(k);
            url.push('=');
            url.push_str(v);
        }
        url
    }

    async fn request(
        &self,
        method: Method,
        url: String,
        headers: Vec<(&'static str, String)>,
        body: Option<Vec<u8>>,
        timeout: Duration,
        op: &'static str,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .request(method, url)
            .timeout(timeout)
            .header("x-ms-version", API_VERSION);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        builder.send().await.map_err(|e| classify_transport(op, e))
    }

    async fn head(&self, path: &str, op: &'static str) -> Result<reqwest::Response, ProviderError> {
        self.request(
            Method::HEAD,
            self.blob_url(path, &[]),
            Vec::new(),
            None,
            self.config.timeouts.probe(),
            op,
        )
        .await
    }

    fn probe_from_head(response: &reqwest::Response) -> ArchiveProbe {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let access_tier = header("x-ms-access-tier").unwrap_or_else(|| "Hot".to_string());
        let tier = access_tier_to_tier(&access_tier);
        // Only the Archive access tier is offline; rehydration progress is a
        // separate header
        let restore = if access_tier != "Archive" {
            RestoreProbe::NotNeeded
        } else {
            match header("x-ms-archive-status").as_deref() {
                Some(status) if status.starts_with("rehydrate-pending") => RestoreProbe::InProgress,
                _ => RestoreProbe::Required,
            }
        };
        ArchiveProbe { tier, restore }
    }
}

#[async_trait]
impl StorageProvider for AzureProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    async fn upload(&self, object: &UploadObject) -> Result<String, ProviderError> {
        let key = object.storage_path();
        let mut headers = vec![
            ("x-ms-blob-type", "BlockBlob".to_string()),
            ("content-type", object.content_type.clone()),
            ("x-ms-meta-documentid", object.document_id.to_string()),
        ];
        if !object.tags.is_empty() {
            let tags = object
                .tags
                .iter()
                .map(|(k, v)| format!("{}={}", uri_encode(k, true), uri_encode(v, true)))
                .collect::<Vec<_>>()
                .join("&");
            headers.push(("x-ms-tags", tags));
        }

        let response = self
            .request(
                Method::PUT,
                self.blob_url(&key, &[]),
                headers,
                Some(object.data.to_vec()),
                self.config.timeouts.transfer(),
                "upload",
            )
            .await?;
        let status = response.status().as_u16();
        if status == 201 {
            tracing::info!(
                "Uploaded document {} to container {} at {}",
                object.document_id,
                self.config.container,
                key
            );
            Ok(key)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status, &body))
        }
    }

    async fn download(&self, path: &str) -> Result<Bytes, ProviderError> {
        let response = self
            .request(
                Method::GET,
                self.blob_url(path, &[]),
                Vec::new(),
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
            // Reads of an archived blob fail with 409 BlobArchived
            409 => Err(ProviderError::NotRetrievable {
                tier: Some(StorageTier::DeepArchive),
            }),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(classify_status(s, &body))
            }
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, ProviderError> {
        let response = self.head(path, "exists").await?;
        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            s => Err(classify_status(s, path)),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        let response = self
            .request(
                Method::DELETE,
                self.blob_url(path, &[]),
                Vec::new(),
                None,
                self.config.timeouts.restore(),
                "delete",
            )
            .await?;
        match response.status().as_u16() {
            202 | 204 | 404 => Ok(()),
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
        let head = self.head(path, "archive_to_tier").await?;
        match head.status().as_u16() {
            200 => {}
            404 => return Err(ProviderError::NotFound(path.to_string())),
            s => return Err(classify_status(s, path)),
        }
        let previous = Self::probe_from_head(&head).tier;
        if previous == target {
            return Ok(TierChange {
                previous_tier: previous,
                new_tier: target,
                immediate: !target.is_cold(),
            });
        }

        let response = self
            .request(
                Method::PUT,
                self.blob_url(path, &[("comp", "tier")]),
                vec![("x-ms-access-tier", tier_to_access_tier(target).to_string())],
                None,
                self.config.timeouts.tier_change(),
                "archive_to_tier",
            )
            .await?;
        match response.status().as_u16() {
            200 | 202 => {
                tracing::info!("Moved blob {} to {}", path, target);
                Ok(TierChange {
                    previous_tier: previous,
                    new_tier: target,
                    // Azure's Cold access tier stays online, so only the
                    // Archive access tier loses retrievability
                    immediate: target != StorageTier::DeepArchive,
                })
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(classify_status(s, &body))
            }
        }
    }

    async fn archive_status(&self, path: &str) -> Result<ArchiveProbe, ProviderError> {
        let response = self.head(path, "archive_status").await?;
        match response.status().as_u16() {
            200 => Ok(Self::probe_from_head(&response)),
            404 => Err(ProviderError::NotFound(path.to_string())),
            s => Err(classify_status(s, path)),
        }
    }

    async fn request_restore(
        &self,
        path: &str,
        days: u32,
        speed: RestoreSpeed,
    ) -> Result<(), ProviderError> {
        // Rehydration is a tier change back to Hot; Azure has no expiring
        // restored copy, so `days` does not translate
        let priority = match speed {
            RestoreSpeed::Expedited => "High",
            RestoreSpeed::Standard | RestoreSpeed::Bulk => "Standard",
        };
        let response = self
            .request(
                Method::PUT,
                self.blob_url(path, &[("comp", "tier")]),
                vec![
                    ("x-ms-access-tier", "Hot".to_string()),
                    ("x-ms-rehydrate-priority", priority.to_string()),
                ],
                None,
                self.config.timeouts.restore(),
                "request_restore",
            )
            .await?;
        match response.status().as_u16() {
            // 409 means a rehydration is already pending; idempotent success
            200 | 202 | 409 => {
                tracing::info!(
                    "Rehydration of blob {} requested (priority {}, {} days ignored)",
                    path,
                    priority,
                    days
                );
                Ok(())
            }
            404 => Err(ProviderError::NotFound(path.to_string())),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(classify_status(s, &body))
            }
        }
    }
}
