// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Implements the [`RecordStore`] and [`OwnerStore`] contracts:
//! - Records (activity/visit documents, one collection per kind)
//! - Owners (consumer/worker credentials with the points total)
//!
//! Status transitions run inside Firestore transactions: the record is read,
//! the transition guard is checked against the stored status, and the write is
//! committed atomically. A concurrent writer causes a transaction retry with
//! fresh data, so per-record transitions stay totally ordered.

use crate::db::{collections, Completion, OwnerStore, RecordStore};
use crate::error::AppError;
use crate::models::{Owner, OwnerRole, Record, RecordKind, RecordStatus};
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    async fn fetch_record(
        &self,
        kind: RecordKind,
        id: &str,
    ) -> Result<Option<Record>, AppError> {
        Self::fetch_record_with(&self.client, kind, id).await
    }

    async fn fetch_record_with(
        client: &firestore::FirestoreDb,
        kind: RecordKind,
        id: &str,
    ) -> Result<Option<Record>, AppError> {
        client
            .fluent()
            .select()
            .by_id_in(collections::for_kind(kind))
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Clone of the client whose reads go through `transaction`, so the commit
    /// conflict-detects concurrent writers of the documents read.
    fn read_through(
        &self,
        transaction: &firestore::FirestoreTransaction,
    ) -> Result<firestore::FirestoreDb, AppError> {
        Ok(self.client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        ))
    }

    /// Read-guard-write a record inside a transaction.
    ///
    /// `mutate` inspects the current record and either produces the updated
    /// record to write, or a control result that skips the write.
    async fn transition_record<F>(
        &self,
        kind: RecordKind,
        id: &str,
        mutate: F,
    ) -> Result<TransitionOutcome, AppError>
    where
        F: Fn(&mut Record) -> Result<TransitionOutcome, AppError>,
    {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Read through the transaction so the commit detects concurrent
        // modification and retries with fresh data.
        let txn_reader = match self.read_through(&transaction) {
            Ok(reader) => reader,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };
        let current = match Self::fetch_record_with(&txn_reader, kind, id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                let _ = transaction.rollback().await;
                return Err(AppError::RecordNotFound(format!("{} {}", kind, id)));
            }
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };

        let mut updated = current;
        let outcome = match mutate(&mut updated) {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };

        if matches!(outcome, TransitionOutcome::Skipped) {
            // Nothing to write (idempotent duplicate).
            let _ = transaction.rollback().await;
            return Ok(outcome);
        }

        self.client
            .fluent()
            .update()
            .in_col(collections::for_kind(kind))
            .document_id(&updated.id)
            .object(&updated)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add record to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(outcome)
    }
}

/// What a transactional transition did.
enum TransitionOutcome {
    Applied(Record),
    /// Re-staging replaced a previously accepted image at this path.
    Replaced(Option<String>),
    /// Idempotent duplicate; no write was made.
    Skipped,
}

#[async_trait]
impl RecordStore for FirestoreDb {
    async fn create_record(&self, record: &Record) -> Result<(), AppError> {
        let _: Record = self
            .client
            .fluent()
            .insert()
            .into(collections::for_kind(record.kind))
            .document_id(&record.id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_record(&self, kind: RecordKind, id: &str) -> Result<Option<Record>, AppError> {
        self.fetch_record(kind, id).await
    }

    async fn delete_record(&self, kind: RecordKind, id: &str) -> Result<(), AppError> {
        self.client
            .fluent()
            .delete()
            .from(collections::for_kind(kind))
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn stage_image(
        &self,
        kind: RecordKind,
        id: &str,
        image_path: &str,
    ) -> Result<Option<String>, AppError> {
        let outcome = self
            .transition_record(kind, id, |record| {
                if !record.status.can_transition_to(RecordStatus::ImageStaged) {
                    return Err(AppError::InvalidStateTransition(format!(
                        "{} {}: cannot stage image in status {}",
                        kind, id, record.status
                    )));
                }
                let previous = record.image_path.replace(image_path.to_string());
                record.status = RecordStatus::ImageStaged;
                Ok(TransitionOutcome::Replaced(
                    previous.filter(|p| p != image_path),
                ))
            })
            .await?;

        match outcome {
            TransitionOutcome::Replaced(previous) => Ok(previous),
            _ => Ok(None),
        }
    }

    async fn begin_processing(&self, kind: RecordKind, id: &str) -> Result<Record, AppError> {
        let outcome = self
            .transition_record(kind, id, |record| {
                if record.image_path.is_none()
                    || !record.status.can_transition_to(RecordStatus::Processing)
                {
                    return Err(AppError::InvalidStateTransition(format!(
                        "{} {}: cannot begin processing in status {}",
                        kind, id, record.status
                    )));
                }
                record.status = RecordStatus::Processing;
                Ok(TransitionOutcome::Applied(record.clone()))
            })
            .await?;

        match outcome {
            TransitionOutcome::Applied(record) => Ok(record),
            _ => Err(AppError::Database(
                "begin_processing produced no record".to_string(),
            )),
        }
    }

    async fn complete_record(
        &self,
        kind: RecordKind,
        id: &str,
        completion: &Completion,
    ) -> Result<bool, AppError> {
        let outcome = self
            .transition_record(kind, id, |record| {
                if record.status == RecordStatus::Completed {
                    tracing::debug!(kind = %kind, id, "Record already completed (idempotent skip)");
                    return Ok(TransitionOutcome::Skipped);
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
                Ok(TransitionOutcome::Applied(record.clone()))
            })
            .await?;

        Ok(matches!(outcome, TransitionOutcome::Applied(_)))
    }

    async fn mark_detection_failed(&self, kind: RecordKind, id: &str) -> Result<(), AppError> {
        self.transition_record(kind, id, |record| {
            if record.status != RecordStatus::Processing {
                return Ok(TransitionOutcome::Skipped);
            }
            record.detection_failed = true;
            Ok(TransitionOutcome::Applied(record.clone()))
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OwnerStore for FirestoreDb {
    async fn get_owner(&self, role: OwnerRole, id: &str) -> Result<Option<Owner>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::for_role(role))
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_owner(&self, owner: &Owner) -> Result<(), AppError> {
        let _: Owner = self
            .client
            .fluent()
            .update()
            .in_col(collections::for_role(owner.role))
            .document_id(&owner.id)
            .object(owner)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn increment_points(
        &self,
        role: OwnerRole,
        id: &str,
        amount: u32,
    ) -> Result<u64, AppError> {
        // Read-modify-write inside a transaction; Firestore retries on
        // concurrent modification, so concurrent awards never lose updates.
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let txn_reader = match self.read_through(&transaction) {
            Ok(reader) => reader,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };
        let owner: Option<Owner> = match txn_reader
            .fluent()
            .select()
            .by_id_in(collections::for_role(role))
            .obj()
            .one(id)
            .await
        {
            Ok(owner) => owner,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(AppError::Database(format!(
                    "Failed to read owner in transaction: {}",
                    e
                )));
            }
        };

        let mut owner = match owner {
            Some(owner) => owner,
            None => {
                let _ = transaction.rollback().await;
                return Err(AppError::OwnerNotFound(format!("{} {}", role, id)));
            }
        };

        owner.total_points += u64::from(amount);

        self.client
            .fluent()
            .update()
            .in_col(collections::for_role(role))
            .document_id(&owner.id)
            .object(&owner)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add owner to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(role = %role, id, amount, total = owner.total_points, "Points incremented");

        Ok(owner.total_points)
    }
}
