use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::paypal::CommunicationFailure;
use crate::ports::RepositoryError;
use crate::services::VerificationError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Verification(#[from] VerificationError),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => AppError::NotFound(format!("Transaction {} not found", id)),
            other => AppError::Database(other.to_string()),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Verification(err) => verification_status(err),
        }
    }
}

fn verification_status(err: &VerificationError) -> StatusCode {
    match err {
        VerificationError::InvalidOrderId(_) => StatusCode::BAD_REQUEST,
        VerificationError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        VerificationError::Communication { cause, .. } => match cause {
            CommunicationFailure::Transport => StatusCode::BAD_GATEWAY,
            CommunicationFailure::Decode => StatusCode::INTERNAL_SERVER_ERROR,
        },
        VerificationError::ClientRequest(_) => StatusCode::BAD_REQUEST,
        VerificationError::UpstreamServer(_)
        | VerificationError::EmptyUpstreamResponse
        | VerificationError::MalformedUpstreamResponse(_)
        | VerificationError::ReferenceIdNotSet
        | VerificationError::InvalidReferenceIdFormat(_) => StatusCode::BAD_GATEWAY,
        VerificationError::PaymentIncomplete(_) => StatusCode::PAYMENT_REQUIRED,
        VerificationError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
        VerificationError::TransactionStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
