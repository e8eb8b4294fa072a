//! Ports between the verification flow and its collaborators: the
//! transaction store and the payment provider.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{TransactionRecord, UnknownStatus};
use crate::paypal::{AccessToken, AuthenticationFailed, FetchError, OrderDetails};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(#[from] UnknownStatus),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result of a conditional paid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidTransition {
    /// The record moved from created to paid.
    Transitioned,
    /// The record was already paid; nothing was written.
    AlreadyPaid,
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, record: &TransactionRecord) -> RepositoryResult<TransactionRecord>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<TransactionRecord>;

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<TransactionRecord>>;

    /// Sets the status to paid only if it is not paid yet. Implementations must
    /// make the check and the write a single atomic step.
    async fn mark_paid(&self, id: Uuid) -> RepositoryResult<PaidTransition>;

    /// Connectivity probe used by the health endpoint.
    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

/// Authority that decides whether an order was paid.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, AuthenticationFailed>;

    async fn get_order(&self, order_id: &str, token: &AccessToken) -> Result<OrderDetails, FetchError>;
}
