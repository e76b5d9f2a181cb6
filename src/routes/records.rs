// SPDX-License-Identifier: MIT

//! Record endpoints: creation, retrieval, image upload, and processing.
//!
//! Activities (consumer engagements) and visits (worker engagements) share one
//! handler set parameterized by [`RecordKind`].

use crate::error::{AppError, Result};
use crate::middleware::auth::{authorize, required_role, AuthUser};
use crate::models::{Record, RecordKind};
use crate::services::DetectionJob;
use crate::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Record routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activities", post(create_activity))
        .route(
            "/activities/{id}",
            get(get_activity).delete(delete_activity),
        )
        .route("/activities/{id}/upload-image", post(upload_activity_image))
        .route(
            "/activities/{id}/process-images",
            post(process_activity_images),
        )
        .route("/visits", post(create_visit))
        .route("/visits/{id}", get(get_visit).delete(delete_visit))
        .route("/visits/{id}/upload-image", post(upload_visit_image))
        .route("/visits/{id}/process-images", post(process_visit_images))
}

// ─── Creation ────────────────────────────────────────────────

/// Payload for creating an activity or visit record.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRecordRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "store must not be empty"))]
    pub store: String,
    /// Scheduled day (ISO 8601 date)
    pub day: String,
    /// Scheduled start time (ISO 8601 time)
    pub time: String,
    #[validate(range(min = 1, message = "at least one image is expected"))]
    pub total_pics: u32,
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<Record>)> {
    create_record(state, user, RecordKind::Activity, payload).await
}

async fn create_visit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<Record>)> {
    create_record(state, user, RecordKind::Visit, payload).await
}

async fn create_record(
    state: Arc<AppState>,
    user: AuthUser,
    kind: RecordKind,
    payload: CreateRecordRequest,
) -> Result<(StatusCode, Json<Record>)> {
    authorize(&user, required_role(kind))?;

    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let record = Record::new(
        uuid::Uuid::new_v4().to_string(),
        kind,
        payload.name,
        user.owner_id.clone(),
        payload.store,
        payload.day,
        payload.time,
        payload.total_pics,
    );

    state.records.create_record(&record).await?;
    tracing::info!(kind = %kind, id = %record.id, owner = %record.owner_ref, "Record created");

    Ok((StatusCode::CREATED, Json(record)))
}

// ─── Retrieval ───────────────────────────────────────────────

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Record>> {
    fetch_owned_record(&state, &user, RecordKind::Activity, &id)
        .await
        .map(Json)
}

async fn get_visit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Record>> {
    fetch_owned_record(&state, &user, RecordKind::Visit, &id)
        .await
        .map(Json)
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    remove_record(state, user, RecordKind::Activity, id).await
}

async fn delete_visit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    remove_record(state, user, RecordKind::Visit, id).await
}

/// Delete a record and its accepted image, if any.
async fn remove_record(
    state: Arc<AppState>,
    user: AuthUser,
    kind: RecordKind,
    id: String,
) -> Result<StatusCode> {
    let record = fetch_owned_record(&state, &user, kind, &id).await?;

    state.records.delete_record(kind, &id).await?;

    if let Some(image_name) = record.image_path {
        // Best effort; the record is already gone.
        if let Err(e) = state.blobs.delete(&image_name).await {
            tracing::warn!(kind = %kind, id = %id, image = %image_name, error = %e,
                "Failed to remove image for deleted record");
        }
    }

    tracing::info!(kind = %kind, id = %id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch a record and verify the caller owns it.
async fn fetch_owned_record(
    state: &AppState,
    user: &AuthUser,
    kind: RecordKind,
    id: &str,
) -> Result<Record> {
    authorize(user, required_role(kind))?;

    let record = state
        .records
        .get_record(kind, id)
        .await?
        .ok_or_else(|| AppError::RecordNotFound(format!("{} {}", kind, id)))?;

    if record.owner_ref != user.owner_id {
        return Err(AppError::Unauthorized);
    }

    Ok(record)
}

// ─── Image Upload ────────────────────────────────────────────

/// Response for image upload and processing submissions.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_path: String,
}

async fn upload_activity_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    upload_image(state, user, RecordKind::Activity, id, multipart).await
}

async fn upload_visit_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    upload_image(state, user, RecordKind::Visit, id, multipart).await
}

async fn upload_image(
    state: Arc<AppState>,
    user: AuthUser,
    kind: RecordKind,
    id: String,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    fetch_owned_record(&state, &user, kind, &id).await?;

    let (filename, bytes) = read_image_field(multipart).await?;

    let staged = state
        .staging
        .stage_and_validate(kind, &id, &bytes, &filename)
        .await?;

    Ok(Json(UploadResponse {
        message: "Image uploaded successfully".to_string(),
        file_path: staged.file_path.display().to_string(),
    }))
}

// ─── Processing Submission ───────────────────────────────────

async fn process_activity_images(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    process_images(state, user, RecordKind::Activity, id, multipart).await
}

async fn process_visit_images(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    process_images(state, user, RecordKind::Visit, id, multipart).await
}

/// Submit a record for brand detection.
///
/// A record that already has an accepted image keeps it; a `Pending` record
/// may carry the image directly in this call, in which case it goes through
/// the same blur-gated staging path. Either way the image is written once.
/// The detection job is enqueued and the response returns before it runs.
async fn process_images(
    state: Arc<AppState>,
    user: AuthUser,
    kind: RecordKind,
    id: String,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let record = fetch_owned_record(&state, &user, kind, &id).await?;

    if record.image_path.is_none() {
        let (filename, bytes) = read_image_field(multipart).await?;
        state
            .staging
            .stage_and_validate(kind, &id, &bytes, &filename)
            .await?;
    }

    let record = state.records.begin_processing(kind, &id).await?;

    let image_name = record.image_path.clone().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("processing record without an image"))
    })?;

    if let Err(e) = state.dispatch.enqueue(DetectionJob {
        kind,
        record_id: record.id.clone(),
        owner_ref: record.owner_ref.clone(),
        image_name: image_name.clone(),
    }) {
        // The record just moved to Processing but no worker will ever see it.
        // Flag it for re-drive so the failure is visible, then surface the
        // error.
        if let Err(flag_err) = state.records.mark_detection_failed(kind, &id).await {
            tracing::error!(
                kind = %kind,
                id = %id,
                error = %flag_err,
                "Failed to flag record after enqueue failure"
            );
        }
        return Err(e);
    }

    tracing::info!(kind = %kind, id = %record.id, "Record queued for brand detection");

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            message: "Images sent for AI processing".to_string(),
            file_path: state.blobs.resolve(&image_name).display().to_string(),
        }),
    ))
}

// ─── Multipart Helpers ───────────────────────────────────────

/// Pull the uploaded image out of the multipart body.
///
/// Accepts the first field carrying a filename (clients send it as `file`).
async fn read_image_field(mut multipart: Multipart) -> Result<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("failed to read upload: {}", e)))?;

        if bytes.is_empty() {
            return Err(AppError::BadRequest("uploaded file is empty".to_string()));
        }

        return Ok((filename, bytes.to_vec()));
    }

    Err(AppError::BadRequest(
        "multipart body has no file field".to_string(),
    ))
}
