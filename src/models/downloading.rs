// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model artifact resolution with download-and-cache
//!
//! A [`ModelSource`] names where a model should live on disk and, optionally,
//! where to fetch it from. Files already on disk are used as-is; missing files
//! are streamed to `<path>.part`, checksummed, then renamed into place so a
//! half-written artifact is never picked up on the next start.

use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub retry_policy: RetryPolicy,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 300,
            retry_policy: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            exponential_base: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = self.exponential_base.powi(attempt as i32);
        let delay = (self.initial_delay_ms as f64 * factor) as u64;
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Where a model artifact lives and where it can be fetched from
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSource {
    /// Name used in logs ("leaf detection", "disease classification")
    pub name: String,
    /// Local file path; the cache location when `url` is set
    pub path: PathBuf,
    /// Remote location to download from when `path` does not exist
    pub url: Option<String>,
    /// Expected lowercase hex SHA-256 of the file
    pub sha256: Option<String>,
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Checksum mismatch - expected: {expected}, actual: {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("Max retries exceeded: {attempts} attempts, last error: {last_error}")]
    MaxRetriesExceeded { attempts: usize, last_error: String },
    #[error("{name} model not found at {path} and no download URL configured")]
    NotConfigured { name: String, path: PathBuf },
}

impl DownloadError {
    fn is_retryable(&self) -> bool {
        matches!(self, DownloadError::NetworkError(_))
    }
}

/// Result of resolving a model source
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub path: PathBuf,
    /// Whether the file was fetched during this call
    pub downloaded: bool,
    pub size_bytes: u64,
}

pub struct ModelDownloader {
    config: DownloadConfig,
    client: reqwest::Client,
}

impl ModelDownloader {
    pub fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DownloadError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Make sure `source` exists on disk, downloading it if needed
    pub async fn ensure(&self, source: &ModelSource) -> Result<ResolvedModel, DownloadError> {
        if let Ok(metadata) = tokio::fs::metadata(&source.path).await {
            if metadata.is_file() {
                info!(
                    "✅ {} model already present at {}",
                    source.name,
                    source.path.display()
                );
                return Ok(ResolvedModel {
                    path: source.path.clone(),
                    downloaded: false,
                    size_bytes: metadata.len(),
                });
            }
        }

        let url = source
            .url
            .as_deref()
            .ok_or_else(|| DownloadError::NotConfigured {
                name: source.name.clone(),
                path: source.path.clone(),
            })?;

        if let Some(parent) = source.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("📥 Downloading {} model from {}", source.name, url);
        let size_bytes = self.download_with_retry(source, url).await?;
        info!(
            "✅ {} model downloaded ({} bytes) to {}",
            source.name,
            size_bytes,
            source.path.display()
        );

        Ok(ResolvedModel {
            path: source.path.clone(),
            downloaded: true,
            size_bytes,
        })
    }

    async fn download_with_retry(
        &self,
        source: &ModelSource,
        url: &str,
    ) -> Result<u64, DownloadError> {
        let policy = &self.config.retry_policy;
        let mut attempt = 0;

        loop {
            match self.try_download(source, url).await {
                Ok(size) => return Ok(size),
                Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "⚠️ Download of {} failed ({}), retrying in {:?}",
                        source.name, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(DownloadError::MaxRetriesExceeded {
                        attempts: attempt + 1,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_download(&self, source: &ModelSource, url: &str) -> Result<u64, DownloadError> {
        let part_path = part_path(&source.path);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DownloadError::NetworkError(e.to_string()))?;

        let outcome = self.write_part(source, response, &part_path).await;
        if outcome.is_err() {
            tokio::fs::remove_file(&part_path).await.ok();
        }
        outcome
    }

    /// Stream the body to `part_path`, verify it, then move it into place
    async fn write_part(
        &self,
        source: &ModelSource,
        response: reqwest::Response,
        part_path: &Path,
    ) -> Result<u64, DownloadError> {
        let mut file = tokio::fs::File::create(part_path).await?;
        let mut hasher = Sha256::new();
        let mut size_bytes = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::NetworkError(e.to_string()))?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            size_bytes += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        let actual = hex::encode(hasher.finalize());
        debug!("{} sha256: {}", source.name, actual);

        if let Some(expected) = &source.sha256 {
            if !expected.eq_ignore_ascii_case(&actual) {
                return Err(DownloadError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        tokio::fs::rename(part_path, &source.path).await?;
        Ok(size_bytes)
    }
}

/// SHA-256 of a file on disk, as lowercase hex
pub async fn file_sha256(path: &Path) -> Result<String, DownloadError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
