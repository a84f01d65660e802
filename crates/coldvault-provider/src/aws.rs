//! AWS S3 backend
//!
//! Talks to the S3 REST API directly over reqwest with SigV4 request
//! signing and path-style addressing. Tier changes are copy-to-self with a
//! new storage class; restores go through `POST ?restore`; the probe is a
//! HEAD parsing `x-amz-storage-class` and `x-amz-restore`.

use crate::config::AwsConfig;
use crate::error::{classify_status, classify_transport, ProviderError};
use crate::timefmt::{amz_timestamp, now_epoch};
use crate::types::{ArchiveProbe, RestoreProbe, TierChange, UploadObject};
use crate::StorageProvider;
use async_trait::async_trait;
use bytes::Bytes;
use coldvault_domain::{ProviderKind, RestoreSpeed, StorageTier};
use reqwest::Method;
use std::time::Duration;

/// S3 storage class for a tier
fn tier_to_class(tier: StorageTier) -> &'static str {
    match tier {
        StorageTier::Standard => "STANDARD",
        StorageTier::Infrequent => "STANDARD_IA",
        StorageTier::Archive => "GLACIER_IR",
        StorageTier::DeepArchive => "DEEP_ARCHIVE",
    }
}

/// Tier for an S3 storage class; legacy `GLACIER` reads back as Archive,
/// unknown classes as Standard
fn class_to_tier(class: &str) -> StorageTier {
    match class {
        "STANDARD_IA" | "ONEZONE_IA" => StorageTier::Infrequent,
        "GLACIER_IR" | "GLACIER" => StorageTier::Archive,
        "DEEP_ARCHIVE" => StorageTier::DeepArchive,
        _ => StorageTier::Standard,
    }
}

/// Parse an `x-amz-restore` header value
///
/// `ongoing-request="true"` means the restore job is still running;
/// `ongoing-request="false", expiry-date="..."` means the restored copy is
/// available until the RFC 1123 expiry.
fn parse_restore_header(value: &str) -> RestoreProbe {
    if value.contains("ongoing-request=\"true\"") {
        return RestoreProbe::InProgress;
    }
    if value.contains("ongoing-request=\"false\"") {
        let expires_at = value
            .split("expiry-date=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .and_then(|date| httpdate::parse_http_date(date).ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        return RestoreProbe::Ready { expires_at };
    }
    RestoreProbe::Required
}

/// SigV4 signing primitives, kept as pure functions so they are testable
/// against the published AWS test vector
pub(crate) mod sigv4 {
    use hmac::{Hmac, Mac};
    use sha2::{Digest, Sha256};

    type HmacSha256 = Hmac<Sha256>;

    pub fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    /// URI-encode per the SigV4 rules: unreserved characters pass through,
    /// everything else becomes uppercase `%XX`; `/` is kept for URI paths
    pub fn uri_encode(input: &str, encode_slash: bool) -> String {
        let mut out = String::with_capacity(input.len());
        for byte in input.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(byte as char)
                }
                b'/' if !encode_slash => out.push('/'),
                _ => out.push_str(&format!("%{:02X}", byte)),
            }
        }
        out
    }

    /// Canonical query string: pairs sorted by key then value, both encoded
    pub fn canonical_query(params: &[(&str, String)]) -> String {
        let mut encoded: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
            .collect();
        encoded.sort();
        encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Build the canonical request; `headers` must be lowercase-named and
    /// sorted by name
    pub fn canonical_request(
        method: &str,
        canonical_uri: &str,
        canonical_query: &str,
        headers: &[(String, String)],
        payload_hash: &str,
    ) -> (String, String) {
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, canonical_uri, canonical_query, canonical_headers, signed_headers, payload_hash
        );
        (request, signed_headers)
    }

    pub fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
        format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            sha256_hex(canonical_request.as_bytes())
        )
    }

    pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
        let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, region.as_bytes());
        let k_service = hmac_sha256(&k_region, service.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }

    pub fn signature(key: &[u8], string_to_sign: &str) -> String {
        hex::encode(hmac_sha256(key, string_to_sign.as_bytes()))
    }
}

/// AWS S3 implementation of [`StorageProvider`]
pub struct AwsProvider {
    config: AwsConfig,
    client: reqwest::Client,
}

impl AwsProvider {
    /// Create a provider for the configured bucket
    pub fn new(config: AwsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        self.config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.config.region))
    }

    fn host(&self) -> String {
        let endpoint = self.endpoint();
        endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Send one signed request; every header passed here is also signed
    async fn request(
        &self,
        method: Method,
        key: &str,
        query: &[(&str, String)],
        extra_headers: Vec<(String, String)>,
        body: Vec<u8>,
        timeout: Duration,
        op: &'static str,
    ) -> Result<reqwest::Response, ProviderError> {
        let payload_hash = sigv4::sha256_hex(&body);
        let (amz_date, date) = amz_timestamp(now_epoch());
        let canonical_uri = format!(
            "/{}/{}",
            self.config.bucket,
            sigv4::uri_encode(key, false)
        );
        let canonical_query = sigv4::canonical_query(query);

        let mut headers = extra_headers;
        headers.push(("host".to_string(), self.host()));
        headers.push(("x-amz-content-sha256".to_string(), payload_hash.clone()));
        headers.push(("x-amz-date".to_string(), amz_date.clone()));
        headers.sort();

        let (canonical_request, signed_headers) = sigv4::canonical_request(
            method.as_str(),
            &canonical_uri,
            &canonical_query,
            &headers,
            &payload_hash,
        );
        let scope = format!("{}/{}/s3/aws4_request", date, self.config.region);
        let string_to_sign = sigv4::string_to_sign(&amz_date, &scope, &canonical_request);
        let key_bytes = sigv4::signing_key(
            &self.config.secret_access_key,
            &date,
            &self.config.region,
            "s3",
        );
        let signature = sigv4::signature(&key_bytes, &string_to_sign);
        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.config.access_key_id, scope, signed_headers, signature
        );

        let mut url = format!("{}{}", self.endpoint(), canonical_uri);
        if !canonical_query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query);
        }

        let mut builder = self
            .client
            .request(method, &url)
            .timeout(timeout)
            .header("authorization", authorization);
        for (name, value) in &headers {
            if name != "host" {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        builder
            .body(body)
            .send()
            .await
            .map_err(|e| classify_transport(op, e))
    }

    async fn head(&self, key: &str, op: &'static str) -> Result<reqwest::Response, ProviderError> {
        self.request(
            Method::HEAD,
            key,
            &[],
            Vec::new(),
            Vec::new(),
            self.config.timeouts.probe(),
            op,
        )
        .await
    }

    fn probe_from_head(response: &reqwest::Response) -> ArchiveProbe {
        let class = response
            .headers()
            .get("x-amz-storage-class")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("STANDARD");
        let tier = class_to_tier(class);
        let restore = if !tier.is_cold() {
            RestoreProbe::NotNeeded
        } else {
            match response
                .headers()
                .get("x-amz-restore")
                .and_then(|v| v.to_str().ok())
            {
                Some(value) => parse_restore_header(value),
                None => RestoreProbe::Required,
            }
        };
        ArchiveProbe { tier, restore }
    }
}

#[async_trait]
impl StorageProvider for AwsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Aws
    }

    async fn upload(&self, object: &UploadObject) -> Result<String, ProviderError> {
        let key = object.storage_path();
        let mut headers = vec![
            ("content-type".to_string(), object.content_type.clone()),
            (
                "x-amz-meta-document-id".to_string(),
                object.document_id.to_string(),
            ),
        ];
        if !object.tags.is_empty() {
            let tagging = object
                .tags
                .iter()
                .map(|(k, v)| {
                    format!("{}={}", sigv4::uri_encode(k, true), sigv4::uri_encode(v, true))
                })
                .collect::<Vec<_>>()
                .join("&");
            headers.push(("x-amz-tagging".to_string(), tagging));
        }

        let response = self
            .request(
                Method::PUT,
                &key,
                &[],
                headers,
                object.data.to_vec(),
                self.config.timeouts.transfer(),
                "upload",
            )
            .await?;
        let status = response.status().as_u16();
        if status == 200 {
            tracing::info!("Uploaded document {} to s3://{}/{}", object.document_id, self.config.bucket, key);
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
                path,
                &[],
                Vec::new(),
                Vec::new(),
                self.config.timeouts.transfer(),
                "download",
            )
            .await?;
        let status = response.status().as_u16();
        match status {
            200 => response
                .bytes()
                .await
                .map_err(|e| classify_transport("download", e)),
            404 => Err(ProviderError::NotFound(path.to_string())),
            403 => {
                let body = response.text().await.unwrap_or_default();
                // GETs on cold objects fail with InvalidObjectState, which
                // S3 reports as 403
                if body.contains("InvalidObjectState") {
                    Err(ProviderError::NotRetrievable { tier: None })
                } else {
                    Err(ProviderError::Auth(body))
                }
            }
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
                path,
                &[],
                Vec::new(),
                Vec::new(),
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

        // Copy-to-self with the new storage class
        let headers = vec![
            (
                "x-amz-copy-source".to_string(),
                format!("/{}/{}", self.config.bucket, sigv4::uri_encode(path, false)),
            ),
            ("x-amz-metadata-directive".to_string(), "COPY".to_string()),
            (
                "x-amz-storage-class".to_string(),
                tier_to_class(target).to_string(),
            ),
        ];
        let response = self
            .request(
                Method::PUT,
                path,
                &[],
                headers,
                Vec::new(),
                self.config.timeouts.tier_change(),
                "archive_to_tier",
            )
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        // S3 copy can return 200 with an error document in the body
        if status == 200 && !body.contains("<Error>") {
            tracing::info!("Moved s3://{}/{} to {}", self.config.bucket, path, target);
            Ok(TierChange {
                previous_tier: previous,
                new_tier: target,
                immediate: !target.is_cold(),
            })
        } else if status == 200 {
            Err(ProviderError::Unavailable(body))
        } else {
            Err(classify_status(status, &body))
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
        let body = format!(
            "<RestoreRequest><Days>{}</Days><GlacierJobParameters><Tier>{}</Tier></GlacierJobParameters></RestoreRequest>",
            days,
            speed.as_str()
        );
        let response = self
            .request(
                Method::POST,
                path,
                &[("restore", String::new())],
                vec![("content-type".to_string(), "application/xml".to_string())],
                body.into_bytes(),
                self.config.timeouts.restore(),
                "request_restore",
            )
            .await?;
        match response.status().as_u16() {
            // 409 is RestoreAlreadyInProgress: the idempotent success case
            200 | 202 | 409 => {
                tracing::info!("Restore of s3://{}/{} requested ({} days, {})", self.config.bucket, path, days, speed);
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
