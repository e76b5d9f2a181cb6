// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod blobs;
pub mod blur;
pub mod detection;
pub mod dispatch;
pub mod ledger;
pub mod staging;

pub use blobs::{BlobStore, LocalBlobStore};
pub use blur::{BlurDetector, Sharpness};
pub use detection::{DetectionService, HttpDetectionService, StubDetectionService};
pub use dispatch::{DetectionJob, DispatchQueue, RetryPolicy};
pub use ledger::LedgerService;
pub use staging::{StagedUpload, StagingService};
