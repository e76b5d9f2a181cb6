// SPDX-License-Identifier: MIT

//! Brandsnap API Server
//!
//! Accepts store-visit proof photos, gates them on sharpness, runs background
//! brand detection, and credits reward points on completion.

use brandsnap::{
    config::Config,
    db::FirestoreDb,
    services::{
        BlurDetector, DetectionService, DispatchQueue, HttpDetectionService, LedgerService,
        LocalBlobStore, RetryPolicy, StagingService, StubDetectionService,
    },
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Brandsnap API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");
    let records: Arc<dyn brandsnap::db::RecordStore> = Arc::new(db.clone());
    let owners: Arc<dyn brandsnap::db::OwnerStore> = Arc::new(db);

    // Initialize the blob store for staged and accepted images
    let blobs: Arc<dyn brandsnap::services::BlobStore> = Arc::new(
        LocalBlobStore::new(config.upload_dir.clone())
            .await
            .expect("Failed to prepare upload directory"),
    );
    tracing::info!(upload_dir = %config.upload_dir, "Blob store ready");

    // Blur gate + staging
    let blur = BlurDetector::new(config.blur_variance_threshold);
    let staging = StagingService::new(Arc::clone(&records), Arc::clone(&blobs), blur);

    // Detection collaborator: real endpoint when configured, stub otherwise
    let detector: Arc<dyn DetectionService> = match &config.detection_service_url {
        Some(url) => {
            tracing::info!(url = %url, "Using HTTP brand-detection service");
            Arc::new(HttpDetectionService::new(
                url.clone(),
                config.detection_timeout_secs,
            )?)
        }
        None => {
            tracing::warn!("DETECTION_SERVICE_URL not set; using stub detector");
            Arc::new(StubDetectionService)
        }
    };

    // Background dispatch queue
    let dispatch = DispatchQueue::start(
        config.dispatch_workers,
        config.dispatch_queue_depth,
        RetryPolicy {
            max_attempts: config.detection_max_attempts,
            base_delay: Duration::from_millis(config.detection_retry_base_ms),
        },
        config.visit_reward_points,
        Arc::clone(&records),
        Arc::clone(&blobs),
        detector,
        LedgerService::new(Arc::clone(&owners)),
    );
    tracing::info!(
        workers = config.dispatch_workers,
        "Detection dispatch queue started"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        records,
        owners,
        blobs,
        staging,
        dispatch,
    });

    // Build router
    let app = brandsnap::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("brandsnap=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
