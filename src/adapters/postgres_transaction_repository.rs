//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{TransactionRecord, TransactionStatus};
use crate::ports::{PaidTransition, RepositoryError, RepositoryResult, TransactionRepository};

const RECORD_COLUMNS: &str = "id, total_amount, status, created_at, updated_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, record: &TransactionRecord) -> RepositoryResult<TransactionRecord> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transaction_record (id, total_amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(record.id)
        .bind(&record.total_amount)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<TransactionRecord> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transaction_record WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<TransactionRecord>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transaction_record ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            RECORD_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn mark_paid(&self, id: Uuid) -> RepositoryResult<PaidTransition> {
        // Guarded update: concurrent callers race on the row lock and only one
        // of them sees a non-paid status.
        let updated: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE transaction_record
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status IS DISTINCT FROM $2
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(TransactionStatus::Paid.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_some() {
            return Ok(PaidTransition::Transitioned);
        }

        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM transaction_record WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match exists {
            Some(_) => Ok(PaidTransition::AlreadyPaid),
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    total_amount: bigdecimal::BigDecimal,
    status: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<TransactionRecord> {
        Ok(TransactionRecord {
            id: self.id,
            total_amount: self.total_amount,
            status: TransactionStatus::from_stored(self.status.as_deref())?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
