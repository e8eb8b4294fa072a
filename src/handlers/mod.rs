pub mod payments;
pub mod transactions;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::health::{check_health, HealthResponse};
use crate::{ApiDoc, AppState};

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy or degraded", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = check_health(&state.checkers, state.start_time).await;

    // Only a critical dependency failure takes the service out of rotation
    let status_code = if response.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
