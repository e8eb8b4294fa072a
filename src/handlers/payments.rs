use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::TransactionStatus;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    /// True when an earlier verification had already marked the transaction paid.
    pub already_paid: bool,
}

#[utoipa::path(
    post,
    path = "/payments/paypal/{order_id}/verify",
    params(("order_id" = String, Path, description = "PayPal order id")),
    responses(
        (status = 200, description = "Transaction is paid", body = VerifyPaymentResponse),
        (status = 400, description = "Invalid order id or rejected by PayPal"),
        (status = 401, description = "PayPal authentication failed"),
        (status = 402, description = "Order is not completed"),
        (status = 404, description = "Referenced transaction not found"),
        (status = 502, description = "PayPal unavailable or returned an unusable order")
    ),
    tag = "Payments"
)]
pub async fn verify_paypal_payment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    let outcome = state.verifier.verify_payment(&order_id).await?;

    Ok(Json(VerifyPaymentResponse {
        transaction_id: outcome.transaction_id(),
        status: TransactionStatus::Paid,
        already_paid: outcome.already_paid(),
    }))
}
