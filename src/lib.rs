pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod paypal;
pub mod ports;
pub mod secrets;
pub mod services;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

use crate::health::DependencyChecker;
use crate::ports::TransactionRepository;
use crate::services::PaymentVerificationService;

#[derive(Clone)]
pub struct AppState {
    pub transactions: Arc<dyn TransactionRepository>,
    pub verifier: Arc<PaymentVerificationService>,
    pub checkers: Vec<Arc<dyn DependencyChecker>>,
    pub start_time: Instant,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::payments::verify_paypal_payment,
        handlers::transactions::create_transaction,
        handlers::transactions::list_transactions,
        handlers::transactions::get_transaction,
    ),
    components(schemas(
        health::HealthResponse,
        domain::TransactionRecord,
        domain::TransactionStatus,
        handlers::payments::VerifyPaymentResponse,
        handlers::transactions::CreateTransactionRequest,
    )),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Payments", description = "PayPal payment verification"),
        (name = "Transactions", description = "Transaction records"),
    )
)]
pub struct ApiDoc;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .route(
            "/payments/paypal/:order_id/verify",
            post(handlers::payments::verify_paypal_payment),
        )
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction)
                .get(handlers::transactions::list_transactions),
        )
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
