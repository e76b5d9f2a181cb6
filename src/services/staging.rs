// SPDX-License-Identifier: MIT

//! Upload staging manager.
//!
//! Accepts incoming image bytes, stages them under a temporary name, runs the
//! blur gate, and either promotes the image to its deterministic permanent
//! path (advancing the record to `ImageStaged`) or discards it. The staged
//! image is never visible to other components.

use crate::db::RecordStore;
use crate::error::{AppError, Result};
use crate::models::{Record, RecordKind, RecordStatus};
use crate::services::blobs::BlobStore;
use crate::services::blur::{BlurDetector, Sharpness};
use std::path::PathBuf;
use std::sync::Arc;

/// Outcome of a successful staging call.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    /// Name of the accepted image relative to the upload root (`{id}_{filename}`)
    pub image_name: String,
    /// Absolute path for response bodies
    pub file_path: PathBuf,
}

/// Stages uploads, applies the blur gate, and promotes accepted images.
pub struct StagingService {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    blur: BlurDetector,
}

impl StagingService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        blur: BlurDetector,
    ) -> Self {
        Self {
            records,
            blobs,
            blur,
        }
    }

    /// Stage `bytes`, run the blur gate, and promote on success.
    ///
    /// Re-invoking on an `ImageStaged` record is idempotent: the permanent
    /// image is overwritten and the state does not change. A blurry or
    /// undecodable image leaves both the record and the permanent path
    /// untouched.
    pub async fn stage_and_validate(
        &self,
        kind: RecordKind,
        record_id: &str,
        bytes: &[u8],
        filename: &str,
    ) -> Result<StagedUpload> {
        if filename.is_empty() {
            return Err(AppError::BadRequest("missing image filename".to_string()));
        }

        let record = self
            .records
            .get_record(kind, record_id)
            .await?
            .ok_or_else(|| AppError::RecordNotFound(format!("{} {}", kind, record_id)))?;

        // Fail fast before any I/O; the store's CAS re-checks under the lock.
        if !record.status.can_transition_to(RecordStatus::ImageStaged) {
            return Err(AppError::InvalidStateTransition(format!(
                "{} {}: cannot accept an upload in status {}",
                kind, record_id, record.status
            )));
        }

        let staging_name = Record::staging_image_name(record_id, filename);
        self.blobs.write(&staging_name, bytes).await?;

        match self.blur.assess(bytes) {
            Ok(Sharpness::Sharp) => {}
            Ok(Sharpness::Blurry) => {
                self.discard(&staging_name).await;
                tracing::info!(kind = %kind, record_id, filename, "Rejected blurry upload");
                return Err(AppError::ImageQuality);
            }
            Err(e) => {
                self.discard(&staging_name).await;
                return Err(e);
            }
        }

        let image_name = Record::permanent_image_name(record_id, filename);
        let file_path = self.blobs.rename(&staging_name, &image_name).await?;

        match self.records.stage_image(kind, record_id, &image_name).await {
            Ok(replaced) => {
                if let Some(orphan) = replaced {
                    // A re-upload under a new filename orphaned the previous
                    // accepted image.
                    self.discard(&orphan).await;
                }
            }
            Err(e) => {
                // The record moved on while we were promoting; do not leave a
                // file the record never accepted.
                if record.image_path.as_deref() != Some(image_name.as_str()) {
                    self.discard(&image_name).await;
                }
                return Err(e);
            }
        }

        tracing::info!(kind = %kind, record_id, image = %image_name, "Image accepted");

        Ok(StagedUpload {
            image_name,
            file_path,
        })
    }

    /// Best-effort blob removal; failure is logged, never surfaced.
    async fn discard(&self, name: &str) {
        if let Err(e) = self.blobs.delete(name).await {
            tracing::warn!(name, error = %e, "Failed to remove staged image");
        }
    }
}
