// SPDX-License-Identifier: MIT

//! Background dispatch queue for brand detection.
//!
//! Decouples the processing endpoint's response from the slow, unreliable
//! detection call: `enqueue` returns immediately, and a fixed pool of workers
//! pulls jobs, runs detection with bounded exponential backoff, and applies
//! the `Processing -> Completed` transition. After retry exhaustion the record
//! keeps its `Processing` status and is flagged `detection_failed` for later
//! re-drive; jobs are never silently dropped.

use crate::db::{Completion, RecordStore};
use crate::error::{AppError, Result};
use crate::models::{BrandCounts, OwnerRole, RecordKind};
use crate::services::blobs::BlobStore;
use crate::services::detection::DetectionService;
use crate::services::ledger::LedgerService;
use crate::time_utils::completion_stamps;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A queued detection job.
#[derive(Debug, Clone)]
pub struct DetectionJob {
    pub kind: RecordKind,
    pub record_id: String,
    pub owner_ref: String,
    /// Accepted image name relative to the upload root
    pub image_name: String,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the given 1-based attempt: base, 2x, 4x, ...
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

struct DispatchContext {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    detector: Arc<dyn DetectionService>,
    ledger: LedgerService,
    retry: RetryPolicy,
    visit_reward_points: u32,
}

/// Handle for enqueueing detection work.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<DetectionJob>,
}

impl DispatchQueue {
    /// Spawn the worker pool and return the enqueue handle.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        workers: usize,
        queue_depth: usize,
        retry: RetryPolicy,
        visit_reward_points: u32,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        detector: Arc<dyn DetectionService>,
        ledger: LedgerService,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let ctx = Arc::new(DispatchContext {
            records,
            blobs,
            detector,
            ledger,
            retry,
            visit_reward_points,
        });

        tokio::spawn(run_workers(rx, ctx, workers.max(1)));

        Self { tx }
    }

    /// Fire-and-forget enqueue; the caller's response does not wait for
    /// detection.
    pub fn enqueue(&self, job: DetectionJob) -> Result<()> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => {
                tracing::error!(record_id = %job.record_id, "Detection queue full");
                AppError::Internal(anyhow::anyhow!("detection queue full"))
            }
            mpsc::error::TrySendError::Closed(_) => {
                AppError::Internal(anyhow::anyhow!("detection queue closed"))
            }
        })
    }
}

async fn run_workers(
    rx: mpsc::Receiver<DetectionJob>,
    ctx: Arc<DispatchContext>,
    workers: usize,
) {
    futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|job| (job, rx))
    })
    .for_each_concurrent(workers, |job| {
        let ctx = Arc::clone(&ctx);
        async move { process_job(&ctx, job).await }
    })
    .await;

    tracing::info!("Dispatch queue drained, workers stopping");
}

async fn process_job(ctx: &DispatchContext, job: DetectionJob) {
    tracing::info!(
        kind = %job.kind,
        record_id = %job.record_id,
        image = %job.image_name,
        "Running brand detection"
    );

    let bytes = match ctx.blobs.read(&job.image_name).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(
                record_id = %job.record_id,
                image = %job.image_name,
                error = %e,
                "Failed to read accepted image for detection"
            );
            flag_failed(ctx, &job).await;
            return;
        }
    };

    for attempt in 1..=ctx.retry.max_attempts {
        match ctx.detector.detect(&bytes).await {
            Ok(brands) => {
                apply_completion(ctx, &job, brands).await;
                return;
            }
            Err(e) => {
                tracing::warn!(
                    record_id = %job.record_id,
                    attempt,
                    max_attempts = ctx.retry.max_attempts,
                    error = %e,
                    "Detection attempt failed"
                );
                if attempt < ctx.retry.max_attempts {
                    tokio::time::sleep(ctx.retry.delay_after(attempt)).await;
                }
            }
        }
    }

    tracing::error!(
        kind = %job.kind,
        record_id = %job.record_id,
        "Detection retries exhausted; flagging record"
    );
    flag_failed(ctx, &job).await;
}

async fn apply_completion(ctx: &DispatchContext, job: &DetectionJob, brands: BrandCounts) {
    let (completed_day, completed_time) = completion_stamps(chrono::Utc::now());

    // Only visits carry a reward; activities complete with zero points.
    let points_awarded = match job.kind {
        RecordKind::Visit => ctx.visit_reward_points,
        RecordKind::Activity => 0,
    };

    let completion = Completion {
        brands,
        completed_day,
        completed_time,
        points_awarded,
    };

    match ctx
        .records
        .complete_record(job.kind, &job.record_id, &completion)
        .await
    {
        Ok(true) => {
            tracing::info!(
                kind = %job.kind,
                record_id = %job.record_id,
                points_awarded,
                "Record completed"
            );
            if points_awarded > 0 {
                // Ledger update is best-effort; completion has committed.
                ctx.ledger
                    .award_after_completion(OwnerRole::Worker, &job.owner_ref, points_awarded)
                    .await;
            }
        }
        Ok(false) => {
            tracing::debug!(
                kind = %job.kind,
                record_id = %job.record_id,
                "Duplicate detection result ignored"
            );
        }
        Err(e) => {
            tracing::error!(
                kind = %job.kind,
                record_id = %job.record_id,
                error = %e,
                "Failed to apply completion"
            );
            flag_failed(ctx, job).await;
        }
    }
}

async fn flag_failed(ctx: &DispatchContext, job: &DetectionJob) {
    if let Err(e) = ctx
        .records
        .mark_detection_failed(job.kind, &job.record_id)
        .await
    {
        tracing::error!(
            record_id = %job.record_id,
            error = %e,
            "Failed to flag record after detection failure"
        );
    }
}
