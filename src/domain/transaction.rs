//! Transaction domain entity.
//! Framework-agnostic representation of a pledge machine transaction.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Created,
    Paid,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Created => "created",
            TransactionStatus::Paid => "paid",
        }
    }

    /// Maps a stored status column. Rows written before the status column was
    /// populated carry NULL and are treated as freshly created.
    pub fn from_stored(value: Option<&str>) -> Result<Self, UnknownStatus> {
        match value {
            None => Ok(TransactionStatus::Created),
            Some(raw) => raw.parse(),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TransactionStatus::Created),
            "paid" => Ok(TransactionStatus::Paid),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Domain entity representing a transaction record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionRecord {
    pub id: Uuid,
    #[schema(value_type = String, example = "12.50")]
    pub total_amount: BigDecimal,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// New record in the `Created` state, amount held at two fractional digits.
    pub fn new(total_amount: BigDecimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            total_amount: total_amount.with_scale(2),
            status: TransactionStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == TransactionStatus::Paid
    }

    pub fn mark_paid(&mut self) {
        self.status = TransactionStatus::Paid;
        self.updated_at = Utc::now();
    }
}
