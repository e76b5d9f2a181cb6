//! Storage layer: repository traits plus Firestore and in-memory backends.
//!
//! Components receive these traits by injection; there is no process-wide
//! database handle. Every state transition goes through a compare-and-swap on
//! the stored status so concurrent attempts on one record serialize.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{BrandCounts, Owner, OwnerRole, Record, RecordKind};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const ACTIVITIES: &str = "activities";
    pub const VISITS: &str = "visits";
    pub const CONSUMERS: &str = "consumers";
    pub const WORKERS: &str = "workers";

    use crate::models::{OwnerRole, RecordKind};

    pub fn for_kind(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Activity => ACTIVITIES,
            RecordKind::Visit => VISITS,
        }
    }

    pub fn for_role(role: OwnerRole) -> &'static str {
        match role {
            OwnerRole::Consumer => CONSUMERS,
            OwnerRole::Worker => WORKERS,
        }
    }
}

/// Completion data applied on the `Processing -> Completed` transition.
///
/// Brand counts, completion stamps, and the points figure are written together
/// in a single atomic update.
#[derive(Debug, Clone)]
pub struct Completion {
    pub brands: BrandCounts,
    pub completed_day: String,
    pub completed_time: String,
    pub points_awarded: u32,
}

/// CRUD-plus-transitions contract over activity/visit records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_record(&self, record: &Record) -> Result<()>;

    async fn get_record(&self, kind: RecordKind, id: &str) -> Result<Option<Record>>;

    async fn delete_record(&self, kind: RecordKind, id: &str) -> Result<()>;

    /// CAS `Pending|ImageStaged -> ImageStaged`, setting `image_path`.
    ///
    /// Returns the previously accepted image path when a re-upload replaced it,
    /// so the caller can clean up the orphaned file.
    async fn stage_image(
        &self,
        kind: RecordKind,
        id: &str,
        image_path: &str,
    ) -> Result<Option<String>>;

    /// CAS `ImageStaged -> Processing`. Requires an accepted image.
    async fn begin_processing(&self, kind: RecordKind, id: &str) -> Result<Record>;

    /// CAS `Processing -> Completed`, applying `completion` atomically.
    ///
    /// Returns `false` when the record was already `Completed` (idempotent
    /// duplicate callback): nothing is reapplied.
    async fn complete_record(
        &self,
        kind: RecordKind,
        id: &str,
        completion: &Completion,
    ) -> Result<bool>;

    /// Flag a `Processing` record whose detection retries were exhausted.
    /// The status itself is left untouched for later re-drive.
    async fn mark_detection_failed(&self, kind: RecordKind, id: &str) -> Result<()>;
}

/// Contract over the consumer/worker credential store.
#[async_trait]
pub trait OwnerStore: Send + Sync {
    async fn get_owner(&self, role: OwnerRole, id: &str) -> Result<Option<Owner>>;

    async fn upsert_owner(&self, owner: &Owner) -> Result<()>;

    /// Atomic increment of the owner's running points total.
    ///
    /// Safe under concurrent awards to the same owner. Fails with
    /// `OwnerNotFound` if the account no longer exists.
    async fn increment_points(&self, role: OwnerRole, id: &str, amount: u32) -> Result<u64>;
}
