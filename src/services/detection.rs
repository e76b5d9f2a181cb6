// SPDX-License-Identifier: MIT

//! Brand-detection collaborator.
//!
//! The external AI service classifies an image into per-brand counts. It may
//! fail or time out, so callers treat every error as retryable.

use crate::error::{AppError, Result};
use crate::models::BrandCounts;
use async_trait::async_trait;
use std::time::Duration;

/// External brand-detection service.
#[async_trait]
pub trait DetectionService: Send + Sync {
    async fn detect(&self, image_bytes: &[u8]) -> Result<BrandCounts>;
}

/// HTTP client for a real detection endpoint.
///
/// Posts the raw image and expects a JSON `{ "BrandName": count, ... }` body.
pub struct HttpDetectionService {
    client: reqwest::Client,
    url: String,
}

impl HttpDetectionService {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client error: {}", e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl DetectionService for HttpDetectionService {
    async fn detect(&self, image_bytes: &[u8]) -> Result<BrandCounts> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image_bytes.to_vec())
            .send()
            .await
            .map_err(|e| AppError::DetectionFailed(e.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|e| AppError::DetectionFailed(e.to_string()))?;

        response
            .json::<BrandCounts>()
            .await
            .map_err(|e| AppError::DetectionFailed(format!("invalid response body: {}", e)))
    }
}

/// Stand-in detector returning the fixed counts the upstream AI integration
/// was stubbed with. Used when no `DETECTION_SERVICE_URL` is configured.
pub struct StubDetectionService;

#[async_trait]
impl DetectionService for StubDetectionService {
    async fn detect(&self, _image_bytes: &[u8]) -> Result<BrandCounts> {
        Ok([("BrandA".to_string(), 5), ("BrandB".to_string(), 2)]
            .into_iter()
            .collect())
    }
}

/// Detector whose calls never resolve. Pins dispatch workers in place so
/// tests can fill the job queue deterministically.
pub struct PendingDetectionService;

#[async_trait]
impl DetectionService for PendingDetectionService {
    async fn detect(&self, _image_bytes: &[u8]) -> Result<BrandCounts> {
        futures_util::future::pending().await
    }
}

/// Scriptable detector for tests: fails a configured number of times before
/// answering, and counts every call.
pub struct MockDetectionService {
    result: BrandCounts,
    failures_remaining: std::sync::atomic::AtomicU32,
    calls: std::sync::atomic::AtomicU32,
}

impl MockDetectionService {
    pub fn new(result: BrandCounts, failures_before_success: u32) -> Self {
        Self {
            result,
            failures_remaining: std::sync::atomic::AtomicU32::new(failures_before_success),
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionService for MockDetectionService {
    async fn detect(&self, _image_bytes: &[u8]) -> Result<BrandCounts> {
        use std::sync::atomic::Ordering;

        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::DetectionFailed(
                "scripted detection failure".to_string(),
            ));
        }

        Ok(self.result.clone())
    }
}
