// SPDX-License-Identifier: MIT

//! Brandsnap: loyalty backend for photo-verified store visits
//!
//! This crate provides the image-intake and asynchronous brand-detection
//! pipeline: uploads pass a blur-quality gate, accepted images are dispatched
//! to the detection service in the background, and results are merged into
//! the record and the owner's points ledger.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{OwnerStore, RecordStore};
use services::{BlobStore, DispatchQueue, StagingService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub records: Arc<dyn RecordStore>,
    pub owners: Arc<dyn OwnerStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub staging: StagingService,
    pub dispatch: DispatchQueue,
}
