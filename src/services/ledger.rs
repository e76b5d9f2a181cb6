// SPDX-License-Identifier: MIT

//! Points ledger updater.
//!
//! Applies reward points as an atomic increment on the owner's running total.
//! Ledger bookkeeping is layered on top of record completion: a failed award
//! never rolls the record back.

use crate::db::OwnerStore;
use crate::error::{AppError, Result};
use crate::models::OwnerRole;
use std::sync::Arc;

/// Thin service over the credential store's atomic increment.
#[derive(Clone)]
pub struct LedgerService {
    owners: Arc<dyn OwnerStore>,
}

impl LedgerService {
    pub fn new(owners: Arc<dyn OwnerStore>) -> Self {
        Self { owners }
    }

    /// Credit `amount` points to the owner; returns the new total.
    pub async fn award_points(
        &self,
        role: OwnerRole,
        owner_ref: &str,
        amount: u32,
    ) -> Result<u64> {
        let total = self.owners.increment_points(role, owner_ref, amount).await?;
        tracing::info!(role = %role, owner_ref, amount, total, "Points awarded");
        Ok(total)
    }

    /// Best-effort award after a record completed.
    ///
    /// `OwnerNotFound` and store errors are logged and swallowed; completion
    /// has already committed.
    pub async fn award_after_completion(&self, role: OwnerRole, owner_ref: &str, amount: u32) {
        match self.award_points(role, owner_ref, amount).await {
            Ok(_) => {}
            Err(AppError::OwnerNotFound(msg)) => {
                tracing::warn!(owner = %msg, "Completed record has no owner to credit");
            }
            Err(e) => {
                tracing::error!(role = %role, owner_ref, error = %e, "Ledger update failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, OwnerStore};
    use crate::models::Owner;

    fn worker(id: &str) -> Owner {
        Owner {
            id: id.to_string(),
            role: OwnerRole::Worker,
            full_name: "Test Worker".to_string(),
            email: "w@example.com".to_string(),
            total_points: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn award_increments_total() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_owner(&worker("w1")).await.unwrap();

        let ledger = LedgerService::new(store.clone());
        assert_eq!(
            ledger
                .award_points(OwnerRole::Worker, "w1", 10)
                .await
                .unwrap(),
            10
        );
        assert_eq!(
            ledger
                .award_points(OwnerRole::Worker, "w1", 10)
                .await
                .unwrap(),
            20
        );
    }

    #[tokio::test]
    async fn missing_owner_does_not_panic_after_completion() {
        let store = Arc::new(MemoryStore::new());
        let ledger = LedgerService::new(store);
        // Must not error out; completion already committed.
        ledger
            .award_after_completion(OwnerRole::Worker, "ghost", 10)
            .await;
    }
}
