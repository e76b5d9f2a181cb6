//! In-memory store backend.
//!
//! Used by the integration tests and for local development without a
//! Firestore emulator. Mutations go through `DashMap` entry locks, which
//! serializes transitions per record and keeps the CAS semantics identical to
//! the Firestore backend.

use crate::db::{Completion, OwnerStore, RecordStore};
use crate::error::{AppError, Result};
use crate::models::{Owner, OwnerRole, Record, RecordKind, RecordStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe in-memory record/owner store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<(RecordKind, String), Record>>,
    owners: Arc<DashMap<(OwnerRole, String), Owner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(kind: RecordKind, id: &str) -> (RecordKind, String) {
        (kind, id.to_string())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_record(&self, record: &Record) -> Result<()> {
        let key = Self::key(record.kind, &record.id);
        if self.records.contains_key(&key) {
            return Err(AppError::BadRequest(format!(
                "{} {} already exists",
                record.kind, record.id
            )));
        }
        self.records.insert(key, record.clone());
        Ok(())
    }

    async fn get_record(&self, kind: RecordKind, id: &str) -> Result<Option<Record>> {
        Ok(self
            .records
            .get(&Self::key(kind, id))
            .map(|entry| entry.value().clone()))
    }

    async fn delete_record(&self, kind: RecordKind, id: &str) -> Result<()> {
        self.records
            .remove(&Self::key(kind, id))
            .map(|_| ())
            .ok_or_else(|| AppError::RecordNotFound(format!("{} {}", kind, id)))
    }

    async fn stage_image(
        &self,
        kind: RecordKind,
        id: &str,
        image_path: &str,
    ) -> Result<Option<String>> {
        let mut entry = self
            .records
            .get_mut(&Self::key(kind, id))
            .ok_or_else(|| AppError::RecordNotFound(format!("{} {}", kind, id)))?;

        let record = entry.value_mut();
        if !record.status.can_transition_to(RecordStatus::ImageStaged) {
            return Err(AppError::InvalidStateTransition(format!(
                "{} {}: cannot stage image in status {}",
                kind, id, record.status
            )));
        }

        let previous = record.image_path.replace(image_path.to_string());
        record.status = RecordStatus::ImageStaged;

        // Only report a path for cleanup if the accepted image actually moved.
        Ok(previous.filter(|p| p != image_path))
    }

    async fn begin_processing(&self, kind: RecordKind, id: &str) -> Result<Record> {
        let mut entry = self
            .records
            .get_mut(&Self::key(kind, id))
            .ok_or_else(|| AppError::RecordNotFound(format!("{} {}", kind, id)))?;

        let record = entry.value_mut();
        if record.image_path.is_none()
            || !record.status.can_transition_to(RecordStatus::Processing)
        {
            return Err(AppError::InvalidStateTransition(format!(
                "{} {}: cannot begin processing in status {}",
                kind, id, record.status
            )));
        }

        record.status = RecordStatus::Processing;
        Ok(record.clone())
    }

    async fn complete_record(
        &self,
        kind: RecordKind,
        id: &str,
        completion: &Completion,
    ) -> Result<bool> {
        let mut entry = self
            .records
            .get_mut(&Self::key(kind, id))
            .ok_or_else(|| AppError::RecordNotFound(format!("{} {}", kind, id)))?;

        let record = entry.value_mut();
        if record.status == RecordStatus::Completed {
            // Duplicate or replayed detection callback.
            return Ok(false);
        }
        if !record.status.can_transition_to(RecordStatus::Completed) {
            return Err(AppError::InvalidStateTransition(format!(
                "{} {}: cannot complete in status {}",
                kind, id, record.status
            )));
        }

        record.status = RecordStatus::Completed;
        record.brand_detection_result = Some(completion.brands.clone());
        record.completed_day = Some(completion.completed_day.clone());
        record.completed_time = Some(completion.completed_time.clone());
        record.points_awarded = completion.points_awarded;
        record.detection_failed = false;
        Ok(true)
    }

    async fn mark_detection_failed(&self, kind: RecordKind, id: &str) -> Result<()> {
        let mut entry = self
            .records
            .get_mut(&Self::key(kind, id))
            .ok_or_else(|| AppError::RecordNotFound(format!("{} {}", kind, id)))?;

        let record = entry.value_mut();
        if record.status == RecordStatus::Processing {
            record.detection_failed = true;
        }
        Ok(())
    }
}

#[async_trait]
impl OwnerStore for MemoryStore {
    async fn get_owner(&self, role: OwnerRole, id: &str) -> Result<Option<Owner>> {
        Ok(self
            .owners
            .get(&(role, id.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn upsert_owner(&self, owner: &Owner) -> Result<()> {
        self.owners
            .insert((owner.role, owner.id.clone()), owner.clone());
        Ok(())
    }

    async fn increment_points(&self, role: OwnerRole, id: &str, amount: u32) -> Result<u64> {
        let mut entry = self
            .owners
            .get_mut(&(role, id.to_string()))
            .ok_or_else(|| AppError::OwnerNotFound(format!("{} {}", role, id)))?;

        let owner = entry.value_mut();
        owner.total_points += u64::from(amount);
        Ok(owner.total_points)
    }
}
