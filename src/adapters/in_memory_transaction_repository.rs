//! In-memory implementation of TransactionRepository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::TransactionRecord;
use crate::ports::{PaidTransition, RepositoryError, RepositoryResult, TransactionRepository};

/// A thread-safe in-memory store for transaction records.
///
/// Used by the test-suite and for running the service without Postgres.
/// The paid transition happens under the write lock, which gives it the same
/// check-and-set semantics as the guarded SQL update.
#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    records: Arc<RwLock<HashMap<Uuid, TransactionRecord>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, record: &TransactionRecord) -> RepositoryResult<TransactionRecord> {
        let mut records = self.records.write().await;
        records.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<TransactionRecord> {
        let records = self.records.read().await;
        records
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<TransactionRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<TransactionRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn mark_paid(&self, id: Uuid) -> RepositoryResult<PaidTransition> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        if record.is_paid() {
            return Ok(PaidTransition::AlreadyPaid);
        }

        record.mark_paid();
        Ok(PaidTransition::Transitioned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionStatus;

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = InMemoryTransactionRepository::new();
        let record = TransactionRecord::new("4.20".parse().unwrap());

        repo.insert(&record).await.unwrap();
        let fetched = repo.get_by_id(record.id).await.unwrap();

        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.status, TransactionStatus::Created);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = InMemoryTransactionRepository::new();
        let result = repo.get_by_id(Uuid::new_v4()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_paid_only_transitions_once() {
        let repo = InMemoryTransactionRepository::new();
        let record = TransactionRecord::new("1.00".parse().unwrap());
        repo.insert(&record).await.unwrap();

        assert_eq!(repo.mark_paid(record.id).await.unwrap(), PaidTransition::Transitioned);
        assert_eq!(repo.mark_paid(record.id).await.unwrap(), PaidTransition::AlreadyPaid);
        assert!(repo.get_by_id(record.id).await.unwrap().is_paid());
    }

    #[tokio::test]
    async fn test_list_applies_limit_and_offset() {
        let repo = InMemoryTransactionRepository::new();
        for _ in 0..5 {
            repo.insert(&TransactionRecord::new("1.00".parse().unwrap()))
                .await
                .unwrap();
        }

        assert_eq!(repo.list(2, 0).await.unwrap().len(), 2);
        assert_eq!(repo.list(10, 4).await.unwrap().len(), 1);
        assert_eq!(repo.len().await, 5);
    }
}
