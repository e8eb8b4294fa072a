use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use utoipa::ToSchema;

use crate::ports::{PaymentProvider, TransactionRepository};

/// Dependencies whose failure makes the whole service unhealthy.
const CRITICAL_DEPENDENCIES: &[&str] = &["transaction_store"];

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    #[schema(value_type = Object)]
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl ToString) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> DependencyStatus;
}

pub struct TransactionStoreChecker {
    repository: Arc<dyn TransactionRepository>,
}

impl TransactionStoreChecker {
    pub fn new(repository: Arc<dyn TransactionRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl DependencyChecker for TransactionStoreChecker {
    fn name(&self) -> &'static str {
        "transaction_store"
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.repository.ping().await {
            Ok(()) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

/// Probes PayPal by obtaining an access token, which also proves the
/// configured credentials are accepted.
pub struct PayPalChecker {
    provider: Arc<dyn PaymentProvider>,
}

impl PayPalChecker {
    pub fn new(provider: Arc<dyn PaymentProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl DependencyChecker for PayPalChecker {
    fn name(&self) -> &'static str {
        "paypal"
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.provider.access_token().await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

pub async fn check_health(
    checkers: &[Arc<dyn DependencyChecker>],
    start_time: Instant,
) -> HealthResponse {
    let timeout_duration = Duration::from_secs(5);

    let checks = checkers.iter().map(|checker| async move {
        let status = timeout(timeout_duration, checker.check())
            .await
            .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
        (checker.name().to_string(), status)
    });

    let dependencies: HashMap<String, DependencyStatus> =
        join_all(checks).await.into_iter().collect();

    HealthResponse {
        status: determine_overall_status(&dependencies),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies,
    }
}

pub fn determine_overall_status(dependencies: &HashMap<String, DependencyStatus>) -> String {
    let mut has_critical_failure = false;
    let mut has_non_critical_failure = false;

    for (name, status) in dependencies {
        if matches!(status, DependencyStatus::Unhealthy { .. }) {
            if CRITICAL_DEPENDENCIES.contains(&name.as_str()) {
                has_critical_failure = true;
            } else {
                has_non_critical_failure = true;
            }
        }
    }

    if has_critical_failure {
        "unhealthy".to_string()
    } else if has_non_critical_failure {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}
