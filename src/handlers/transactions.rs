use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::TransactionRecord;
use crate::error::AppError;
use crate::validation::validate_total_amount;
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    #[schema(value_type = String, example = "12.50")]
    pub total_amount: BigDecimal,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    fn resolve(&self) -> Result<(i64, i64), AppError> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(AppError::BadRequest("offset must not be negative".to_string()));
        }
        Ok((limit, offset))
    }
}

#[utoipa::path(
    post,
    path = "/transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction created", body = TransactionRecord),
        (status = 400, description = "Invalid amount")
    ),
    tag = "Transactions"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_total_amount(&payload.total_amount)?;

    let record = state
        .transactions
        .insert(&TransactionRecord::new(payload.total_amount))
        .await?;

    tracing::info!(transaction_id = %record.id, total_amount = %record.total_amount, "Transaction created");

    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/transactions",
    params(Pagination),
    responses(
        (status = 200, description = "Transactions, newest first", body = [TransactionRecord]),
        (status = 400, description = "Invalid pagination")
    ),
    tag = "Transactions"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    let (limit, offset) = pagination.resolve()?;
    let records = state.transactions.list(limit, offset).await?;
    Ok(Json(records))
}

#[utoipa::path(
    get,
    path = "/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction found", body = TransactionRecord),
        (status = 404, description = "Transaction not found")
    ),
    tag = "Transactions"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionRecord>, AppError> {
    let record = state.transactions.get_by_id(id).await?;
    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let pagination = Pagination { limit: None, offset: None };
        assert_eq!(pagination.resolve().unwrap(), (20, 0));
    }

    #[test]
    fn test_pagination_rejects_out_of_range_limit() {
        for limit in [0, -1, 101] {
            let pagination = Pagination { limit: Some(limit), offset: None };
            assert!(matches!(pagination.resolve(), Err(AppError::BadRequest(_))));
        }
    }

    #[test]
    fn test_pagination_rejects_negative_offset() {
        let pagination = Pagination { limit: Some(10), offset: Some(-5) };
        assert!(pagination.resolve().is_err());
    }
}
