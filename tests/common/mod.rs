// SPDX-License-Identifier: MIT

use axum::body::Body;
use axum::http::{header, Request, Response};
use brandsnap::config::Config;
use brandsnap::db::MemoryStore;
use brandsnap::middleware::auth::create_jwt;
use brandsnap::models::{BrandCounts, Owner, OwnerRole};
use brandsnap::services::detection::{MockDetectionService, PendingDetectionService};
use brandsnap::services::{
    BlurDetector, DispatchQueue, LedgerService, LocalBlobStore, RetryPolicy, StagingService,
};
use brandsnap::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

#[allow(dead_code)]
pub const MULTIPART_BOUNDARY: &str = "test-boundary-7f92a1";

/// Test application with in-memory stores, a tempdir blob store, and a
/// scriptable detection mock.
#[allow(dead_code)]
pub struct TestApp {
    pub app: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub detector: Arc<MockDetectionService>,
    // Held so the upload dir outlives the test.
    _upload_dir: tempfile::TempDir,
}

/// Create a test app whose detector succeeds immediately.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with_failures(0).await
}

/// Create a test app whose detector fails `failures` times before answering
/// `{"BrandA": 5, "BrandB": 2}`.
#[allow(dead_code)]
pub async fn create_test_app_with_failures(failures: u32) -> TestApp {
    let mock = Arc::new(MockDetectionService::new(detection_result(), failures));
    build_test_app(Config::test_default(), mock.clone(), mock).await
}

/// Create a test app whose single dispatch worker hangs forever on a queue of
/// depth 1, so a handful of submissions overflows the queue.
#[allow(dead_code)]
pub async fn create_backpressure_app() -> TestApp {
    let mut config = Config::test_default();
    config.dispatch_workers = 1;
    config.dispatch_queue_depth = 1;
    // The mock is never called; detection is pinned on the pending service.
    let mock = Arc::new(MockDetectionService::new(detection_result(), 0));
    build_test_app(config, Arc::new(PendingDetectionService), mock).await
}

async fn build_test_app(
    config: Config,
    detector: Arc<dyn brandsnap::services::DetectionService>,
    mock: Arc<MockDetectionService>,
) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let records: Arc<dyn brandsnap::db::RecordStore> = store.clone();
    let owners: Arc<dyn brandsnap::db::OwnerStore> = store.clone();

    let upload_dir = tempfile::tempdir().expect("tempdir");
    let blobs: Arc<dyn brandsnap::services::BlobStore> = Arc::new(
        LocalBlobStore::new(upload_dir.path())
            .await
            .expect("blob store"),
    );

    let blur = BlurDetector::new(config.blur_variance_threshold);
    let staging = StagingService::new(records.clone(), blobs.clone(), blur);

    let dispatch = DispatchQueue::start(
        config.dispatch_workers,
        config.dispatch_queue_depth,
        RetryPolicy {
            max_attempts: config.detection_max_attempts,
            base_delay: Duration::from_millis(config.detection_retry_base_ms),
        },
        config.visit_reward_points,
        records.clone(),
        blobs.clone(),
        detector,
        LedgerService::new(owners.clone()),
    );

    let state = Arc::new(AppState {
        config,
        records,
        owners,
        blobs,
        staging,
        dispatch,
    });

    TestApp {
        app: brandsnap::routes::create_router(state.clone()),
        state,
        store,
        detector: mock,
        _upload_dir: upload_dir,
    }
}

/// Result the mock detector answers with.
#[allow(dead_code)]
pub fn detection_result() -> BrandCounts {
    [("BrandA".to_string(), 5), ("BrandB".to_string(), 2)]
        .into_iter()
        .collect()
}

/// Mint a signed session token for tests.
#[allow(dead_code)]
pub fn create_test_jwt(owner_id: &str, role: OwnerRole, signing_key: &[u8]) -> String {
    create_jwt(owner_id, role, signing_key).expect("JWT creation")
}

/// Seed an owner account into the test store.
#[allow(dead_code)]
pub async fn seed_owner(app: &TestApp, id: &str, role: OwnerRole) {
    use brandsnap::db::OwnerStore;
    app.store
        .upsert_owner(&Owner {
            id: id.to_string(),
            role,
            full_name: "Test Owner".to_string(),
            email: format!("{}@example.com", id),
            total_points: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .await
        .expect("seed owner");
}

// ─── Synthetic Images ────────────────────────────────────────

fn encode_png(img: &image::GrayImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(img.clone())
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .expect("PNG encoding");
    bytes
}

/// 200x200 solid color: Laplacian variance ~ 0, always blurry.
#[allow(dead_code)]
pub fn solid_png() -> Vec<u8> {
    encode_png(&image::GrayImage::from_pixel(200, 200, image::Luma([128])))
}

/// 200x200 high-contrast checkerboard: always sharp.
#[allow(dead_code)]
pub fn checkerboard_png() -> Vec<u8> {
    encode_png(&image::GrayImage::from_fn(200, 200, |x, y| {
        if (x + y) % 2 == 0 {
            image::Luma([255])
        } else {
            image::Luma([0])
        }
    }))
}

// ─── HTTP Helpers ────────────────────────────────────────────

/// Build a multipart/form-data body with one `file` field.
#[allow(dead_code)]
pub fn multipart_body(filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

/// POST a multipart image to `uri` with a bearer token.
#[allow(dead_code)]
pub async fn post_multipart(
    app: &axum::Router,
    uri: &str,
    token: &str,
    filename: &str,
    bytes: &[u8],
) -> Response<axum::body::Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
                )
                .body(Body::from(multipart_body(filename, bytes)))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// POST a JSON payload to `uri` with a bearer token.
#[allow(dead_code)]
pub async fn post_json(
    app: &axum::Router,
    uri: &str,
    token: &str,
    payload: serde_json::Value,
) -> Response<axum::body::Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// DELETE `uri` with a bearer token.
#[allow(dead_code)]
pub async fn delete_authed(
    app: &axum::Router,
    uri: &str,
    token: &str,
) -> Response<axum::body::Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// GET `uri` with a bearer token.
#[allow(dead_code)]
pub async fn get_authed(app: &axum::Router, uri: &str, token: &str) -> Response<axum::body::Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<axum::body::Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll until `condition` holds or a deadline passes.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..400 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within deadline");
}
