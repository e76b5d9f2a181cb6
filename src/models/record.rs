// SPDX-License-Identifier: MIT

//! Activity/visit record model and its status state machine.
//!
//! Activities (consumer store engagements) and visits (worker store
//! engagements) share one document shape, tagged by [`RecordKind`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Brand name to detected-count mapping returned by the detection service.
pub type BrandCounts = HashMap<String, u32>;

/// Which side of the loyalty program owns a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Consumer store engagement
    Activity,
    /// Worker store visit
    Visit,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Activity => "activity",
            RecordKind::Visit => "visit",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a record.
///
/// `Pending → ImageStaged → Processing → Completed`, with `Rejected` as a
/// terminal branch off the first two states. No backward moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    ImageStaged,
    Processing,
    Completed,
    Rejected,
}

impl RecordStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `ImageStaged → ImageStaged` is allowed so a re-upload can overwrite the
    /// accepted image without changing state.
    pub fn can_transition_to(self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, next),
            (Pending, ImageStaged)
                | (ImageStaged, ImageStaged)
                | (ImageStaged, Processing)
                | (Processing, Completed)
                | (Pending, Rejected)
                | (ImageStaged, Rejected)
        )
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordStatus::Completed | RecordStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::ImageStaged => "image_staged",
            RecordStatus::Processing => "processing",
            RecordStatus::Completed => "completed",
            RecordStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored activity/visit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Opaque unique identifier (also used as document ID), immutable
    pub id: String,
    /// Activity (consumer) or visit (worker)
    pub kind: RecordKind,
    /// Task name/title
    pub name: String,
    /// Consumer or worker who performed the engagement, immutable
    pub owner_ref: String,
    /// Store that was visited, immutable
    pub store_ref: String,
    /// Scheduled day (ISO 8601 date)
    pub scheduled_day: String,
    /// Scheduled start time (ISO 8601 time)
    pub scheduled_time: String,
    /// How many images are expected for this record (>= 1)
    pub total_expected_images: u32,
    /// Lifecycle status; all behavior keys off this field
    pub status: RecordStatus,
    /// Accepted (non-blurry) image path; absent until `ImageStaged`
    pub image_path: Option<String>,
    /// Detection result; absent until `Completed`
    pub brand_detection_result: Option<BrandCounts>,
    /// Reward points; 0 until `Completed`, then write-once
    pub points_awarded: u32,
    /// Set when detection retries were exhausted; record stays `Processing`
    pub detection_failed: bool,
    /// Completion day stamp (ISO 8601 date), set with `Completed`
    pub completed_day: Option<String>,
    /// Completion time stamp (ISO 8601 time), set with `Completed`
    pub completed_time: Option<String>,
    /// When this record was created
    pub created_at: String,
}

impl Record {
    /// Create a fresh `Pending` record with identity fields set.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        kind: RecordKind,
        name: String,
        owner_ref: String,
        store_ref: String,
        scheduled_day: String,
        scheduled_time: String,
        total_expected_images: u32,
    ) -> Self {
        Self {
            id,
            kind,
            name,
            owner_ref,
            store_ref,
            scheduled_day,
            scheduled_time,
            total_expected_images,
            status: RecordStatus::Pending,
            image_path: None,
            brand_detection_result: None,
            points_awarded: 0,
            detection_failed: false,
            completed_day: None,
            completed_time: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Deterministic permanent path (relative to the upload dir) for an
    /// accepted image. Re-uploads with the same filename overwrite in place.
    pub fn permanent_image_name(record_id: &str, filename: &str) -> String {
        format!("{}_{}", record_id, filename)
    }

    /// Staging path, named so it can never collide with a permanent path.
    pub fn staging_image_name(record_id: &str, filename: &str) -> String {
        format!("temp_{}_{}", record_id, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_legal() {
        use RecordStatus::*;
        assert!(Pending.can_transition_to(ImageStaged));
        assert!(ImageStaged.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
    }

    #[test]
    fn reupload_is_idempotent() {
        assert!(RecordStatus::ImageStaged.can_transition_to(RecordStatus::ImageStaged));
    }

    #[test]
    fn rejection_only_before_processing() {
        use RecordStatus::*;
        assert!(Pending.can_transition_to(Rejected));
        assert!(ImageStaged.can_transition_to(Rejected));
        assert!(!Processing.can_transition_to(Rejected));
        assert!(!Completed.can_transition_to(Rejected));
    }

    #[test]
    fn no_backward_or_skipping_moves() {
        use RecordStatus::*;
        assert!(!Pending.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!ImageStaged.can_transition_to(Pending));
        assert!(!ImageStaged.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(ImageStaged));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Rejected.can_transition_to(Pending));
    }

    #[test]
    fn terminal_states() {
        assert!(RecordStatus::Completed.is_terminal());
        assert!(RecordStatus::Rejected.is_terminal());
        assert!(!RecordStatus::Processing.is_terminal());
    }

    #[test]
    fn staging_name_never_collides_with_permanent_name() {
        let staged = Record::staging_image_name("abc", "photo.png");
        let permanent = Record::permanent_image_name("abc", "photo.png");
        assert_ne!(staged, permanent);
        assert_eq!(permanent, "abc_photo.png");
    }

    #[test]
    fn new_record_starts_pending_with_zero_points() {
        let record = Record::new(
            "r1".to_string(),
            RecordKind::Visit,
            "Shelf audit".to_string(),
            "worker-1".to_string(),
            "store-9".to_string(),
            "2026-08-25".to_string(),
            "09:00:00".to_string(),
            1,
        );
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.points_awarded, 0);
        assert!(record.image_path.is_none());
        assert!(record.brand_detection_result.is_none());
    }
}
