//! Payment verification use case.
//! Reconciles a PayPal order with the local transaction it pays for.

use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::TransactionRecord;
use crate::paypal::{
    AuthenticationFailed, CommunicationFailure, FetchError, OrderDetails, OrderStatus,
    DEFAULT_REFERENCE_ID,
};
use crate::ports::{PaidTransition, PaymentProvider, RepositoryError, TransactionRepository};
use crate::validation::{validate_order_id, ValidationError};

#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Invalid order id: {0}")]
    InvalidOrderId(#[from] ValidationError),

    #[error("Failed to authenticate with PayPal: {0}")]
    Unauthorized(#[from] AuthenticationFailed),

    #[error("Error communicating with PayPal API: {detail}")]
    Communication {
        cause: CommunicationFailure,
        detail: String,
    },

    #[error("Client error when calling PayPal API: {0}")]
    ClientRequest(String),

    #[error("PayPal server error: {0}")]
    UpstreamServer(String),

    #[error("Empty response from PayPal API")]
    EmptyUpstreamResponse,

    #[error("Malformed PayPal response: {0}")]
    MalformedUpstreamResponse(String),

    #[error("Payment incomplete. Order status is {0}")]
    PaymentIncomplete(OrderStatus),

    #[error("TransactionID is not set in PayPal response")]
    ReferenceIdNotSet,

    #[error("Invalid transaction ID format received from PayPal: {0}")]
    InvalidReferenceIdFormat(String),

    #[error("Transaction not found with ID: {0}")]
    TransactionNotFound(Uuid),

    #[error("Transaction store error: {0}")]
    TransactionStore(String),
}

impl From<FetchError> for VerificationError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Communication { cause, detail } => {
                VerificationError::Communication { cause, detail }
            }
            FetchError::ClientRequest { detail, .. } => VerificationError::ClientRequest(detail),
            FetchError::UpstreamServer { detail, .. } => VerificationError::UpstreamServer(detail),
            FetchError::EmptyResponse => VerificationError::EmptyUpstreamResponse,
        }
    }
}

/// Successful verification. Both variants confirm that the transaction is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// This call moved the transaction to paid.
    Paid(Uuid),
    /// The transaction had already been paid; nothing was written.
    AlreadyPaid(Uuid),
}

impl VerificationOutcome {
    pub fn transaction_id(&self) -> Uuid {
        match self {
            VerificationOutcome::Paid(id) | VerificationOutcome::AlreadyPaid(id) => *id,
        }
    }

    pub fn already_paid(&self) -> bool {
        matches!(self, VerificationOutcome::AlreadyPaid(_))
    }
}

/// Use case for confirming PayPal payments.
pub struct PaymentVerificationService {
    provider: Arc<dyn PaymentProvider>,
    transactions: Arc<dyn TransactionRepository>,
}

impl PaymentVerificationService {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        transactions: Arc<dyn TransactionRepository>,
    ) -> Self {
        Self {
            provider,
            transactions,
        }
    }

    /// Confirms that `order_id` is a completed PayPal order and marks the
    /// transaction referenced by its first purchase unit as paid.
    ///
    /// The record is written only after every check has passed.
    pub async fn verify_payment(
        &self,
        order_id: &str,
    ) -> Result<VerificationOutcome, VerificationError> {
        validate_order_id(order_id)?;

        let token = self.provider.access_token().await?;
        let order = self.provider.get_order(order_id, &token).await?;

        let transaction_id = extract_transaction_id(&order)?;

        let record = self
            .transactions
            .get_by_id(transaction_id)
            .await
            .map_err(|e| store_error(e, transaction_id))?;

        check_amount(&order, &record);

        let transition = self
            .transactions
            .mark_paid(transaction_id)
            .await
            .map_err(|e| store_error(e, transaction_id))?;

        let outcome = match transition {
            PaidTransition::Transitioned => VerificationOutcome::Paid(transaction_id),
            PaidTransition::AlreadyPaid => VerificationOutcome::AlreadyPaid(transaction_id),
        };

        tracing::info!(
            order_id = %order_id,
            transaction_id = %transaction_id,
            already_paid = outcome.already_paid(),
            "Payment verified"
        );

        Ok(outcome)
    }
}

/// Validates a fetched order and returns the transaction id it references.
///
/// Checks run in a fixed order so the most actionable problem is reported:
/// status presence, completion, purchase units, then the reference id.
pub fn extract_transaction_id(order: &OrderDetails) -> Result<Uuid, VerificationError> {
    let status = order.status.as_ref().ok_or_else(|| {
        VerificationError::MalformedUpstreamResponse(
            "Status field missing in PayPal response".to_string(),
        )
    })?;

    if *status != OrderStatus::Completed {
        return Err(VerificationError::PaymentIncomplete(status.clone()));
    }

    let first_unit = order
        .purchase_units
        .as_deref()
        .and_then(|units| units.first())
        .ok_or_else(|| {
            VerificationError::MalformedUpstreamResponse(
                "Purchase units missing in PayPal response".to_string(),
            )
        })?;

    let reference_id = first_unit.reference_id.as_deref().ok_or_else(|| {
        VerificationError::MalformedUpstreamResponse(
            "reference_id missing in first purchase unit".to_string(),
        )
    })?;

    if reference_id == DEFAULT_REFERENCE_ID {
        return Err(VerificationError::ReferenceIdNotSet);
    }

    Uuid::try_parse(reference_id)
        .map_err(|_| VerificationError::InvalidReferenceIdFormat(reference_id.to_string()))
}

/// Amounts are not part of the reconciliation contract yet; a mismatch is
/// reported but does not block the payment.
fn check_amount(order: &OrderDetails, record: &TransactionRecord) {
    let Some(amount) = order
        .purchase_units
        .as_deref()
        .and_then(|units| units.first())
        .and_then(|unit| unit.amount.as_ref())
    else {
        return;
    };

    match BigDecimal::from_str(&amount.value) {
        Ok(value) if value == record.total_amount => {}
        Ok(value) => tracing::warn!(
            transaction_id = %record.id,
            order_amount = %value,
            currency = %amount.currency_code,
            record_amount = %record.total_amount,
            "PayPal order amount differs from transaction total"
        ),
        Err(_) => tracing::warn!(
            transaction_id = %record.id,
            order_amount = %amount.value,
            "PayPal order amount is not a decimal"
        ),
    }
}

fn store_error(err: RepositoryError, transaction_id: Uuid) -> VerificationError {
    match err {
        RepositoryError::NotFound(_) => VerificationError::TransactionNotFound(transaction_id),
        other => {
            tracing::error!(transaction_id = %transaction_id, error = %other, "Transaction store failure");
            VerificationError::TransactionStore(other.to_string())
        }
    }
}
