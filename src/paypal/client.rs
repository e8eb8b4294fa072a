use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::models::{AccessToken, OrderDetails, TokenResponse};
use super::token_cache::{IssuedToken, TokenCache};
use crate::config::PayPalConfig;
use crate::ports::PaymentProvider;

/// Longest slice of an upstream body copied into error messages.
const MAX_DETAIL_LEN: usize = 200;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct AuthenticationFailed(pub String);

/// Why the order endpoint could not be talked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationFailure {
    /// Connection, timeout, or circuit breaker rejection.
    Transport,
    /// A response arrived but its body was not a valid order document.
    Decode,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Error communicating with PayPal API: {detail}")]
    Communication {
        cause: CommunicationFailure,
        detail: String,
    },
    #[error("Client error when calling PayPal API: {detail}")]
    ClientRequest { status: u16, detail: String },
    #[error("PayPal server error: {detail}")]
    UpstreamServer { status: u16, detail: String },
    #[error("Empty response from PayPal API")]
    EmptyResponse,
}

impl FetchError {
    fn transport(detail: impl ToString) -> Self {
        FetchError::Communication {
            cause: CommunicationFailure::Transport,
            detail: detail.to_string(),
        }
    }

    /// Failures that say something about PayPal's health rather than about
    /// the request. Only these count towards opening the circuit.
    fn is_upstream_fault(&self) -> bool {
        matches!(
            self,
            FetchError::Communication {
                cause: CommunicationFailure::Transport,
                ..
            } | FetchError::UpstreamServer { .. }
        )
    }
}

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

/// HTTP client for the PayPal OAuth and Orders v2 APIs
#[derive(Clone)]
pub struct PayPalClient {
    client: Client,
    config: PayPalConfig,
    token_cache: Option<Arc<TokenCache>>,
    circuit_breaker: Breaker,
}

impl PayPalClient {
    /// Builds a client from configuration. Every request is bounded by
    /// `config.timeout`.
    pub fn new(config: PayPalConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let backoff = backoff::equal_jittered(
            Duration::from_secs(config.circuit_reset_secs),
            Duration::from_secs(config.circuit_reset_secs.saturating_mul(2)),
        );
        let policy = failure_policy::consecutive_failures(config.circuit_failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        let token_cache = config.token_cache.then(|| Arc::new(TokenCache::new()));

        Ok(PayPalClient {
            client,
            config,
            token_cache,
            circuit_breaker,
        })
    }

    /// Shares an existing credential cache, e.g. between clients built from
    /// the same configuration.
    pub fn with_token_cache(mut self, cache: Arc<TokenCache>) -> Self {
        self.token_cache = Some(cache);
        self
    }

    pub fn without_token_cache(mut self) -> Self {
        self.token_cache = None;
        self
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Returns a bearer token, from the cache when one is still valid.
    pub async fn obtain_access_token(&self) -> Result<AccessToken, AuthenticationFailed> {
        match &self.token_cache {
            Some(cache) => {
                cache
                    .get_or_refresh(&self.config.client_id, || self.request_access_token())
                    .await
            }
            None => self.request_access_token().await.map(|issued| issued.token),
        }
    }

    /// Client-credentials grant against `/v1/oauth2/token`.
    async fn request_access_token(&self) -> Result<IssuedToken, AuthenticationFailed> {
        let url = format!("{}/v1/oauth2/token", self.base_url());
        let credentials = STANDARD.encode(format!(
            "{}:{}",
            self.config.client_id,
            self.config.client_secret.expose_secret()
        ));
        let request = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Basic {}", credentials))
            .header(ACCEPT, "application/json")
            .form(&[("grant_type", "client_credentials")]);

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| AuthenticationFailed(e.to_string()))?;

                let status = response.status();
                let body = response
                    .text()
                    .await
                    .map_err(|e| AuthenticationFailed(e.to_string()))?;

                if !status.is_success() {
                    return Err(AuthenticationFailed(format!(
                        "token endpoint returned {}: {}",
                        status,
                        error_detail(status, &body)
                    )));
                }

                let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
                    AuthenticationFailed(format!("Invalid response from PayPal authentication: {}", e))
                })?;

                match parsed.access_token {
                    Some(token) if !token.is_empty() => Ok(IssuedToken {
                        token: AccessToken::new(token),
                        expires_in: parsed.expires_in.map(Duration::from_secs),
                    }),
                    _ => Err(AuthenticationFailed(
                        "Invalid response from PayPal authentication: access_token missing".to_string(),
                    )),
                }
            })
            .await;

        match result {
            Ok(issued) => {
                tracing::debug!(
                    client_id = %self.config.client_id,
                    expires_in = ?issued.expires_in,
                    "Obtained PayPal access token"
                );
                Ok(issued)
            }
            Err(FailsafeError::Rejected) => Err(AuthenticationFailed(
                "PayPal API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => {
                tracing::warn!(client_id = %self.config.client_id, error = %e, "PayPal authentication failed");
                Err(e)
            }
        }
    }

    /// Fetches an order from `/v2/checkout/orders/{order_id}`.
    ///
    /// The body is parsed but not validated; deciding whether the order
    /// confirms a payment is the caller's job.
    pub async fn fetch_order(
        &self,
        order_id: &str,
        token: &AccessToken,
    ) -> Result<OrderDetails, FetchError> {
        let url = format!("{}/v2/checkout/orders/{}", self.base_url(), order_id);
        let request = self
            .client
            .get(&url)
            .bearer_auth(token.expose())
            .header(ACCEPT, "application/json");

        let result = self
            .circuit_breaker
            .call_with(FetchError::is_upstream_fault, async move {
                let response = request.send().await.map_err(FetchError::transport)?;
                let status = response.status();
                let body = response.text().await.map_err(FetchError::transport)?;

                if status.is_client_error() {
                    return Err(FetchError::ClientRequest {
                        status: status.as_u16(),
                        detail: error_detail(status, &body),
                    });
                }
                if status.is_server_error() {
                    return Err(FetchError::UpstreamServer {
                        status: status.as_u16(),
                        detail: error_detail(status, &body),
                    });
                }
                if !status.is_success() {
                    return Err(FetchError::transport(format!("unexpected status {}", status)));
                }

                let trimmed = body.trim();
                if trimmed.is_empty() || trimmed == "null" {
                    return Err(FetchError::EmptyResponse);
                }

                serde_json::from_str::<OrderDetails>(trimmed).map_err(|e| FetchError::Communication {
                    cause: CommunicationFailure::Decode,
                    detail: e.to_string(),
                })
            })
            .await;

        match result {
            Ok(order) => Ok(order),
            Err(FailsafeError::Rejected) => Err(FetchError::transport(
                "PayPal API circuit breaker is open",
            )),
            Err(FailsafeError::Inner(e)) => {
                if let FetchError::ClientRequest { status: 401, .. } = e {
                    // A cached token PayPal no longer accepts; the next call re-authenticates.
                    if let Some(cache) = &self.token_cache {
                        cache.invalidate(&self.config.client_id).await;
                    }
                }
                tracing::warn!(order_id = %order_id, error = %e, "PayPal order lookup failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PaymentProvider for PayPalClient {
    async fn access_token(&self) -> Result<AccessToken, AuthenticationFailed> {
        self.obtain_access_token().await
    }

    async fn get_order(&self, order_id: &str, token: &AccessToken) -> Result<OrderDetails, FetchError> {
        self.fetch_order(order_id, token).await
    }
}

/// PayPal error bodies carry a `message`; fall back to the status reason.
fn error_detail(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error_description"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    match message {
        Some(m) => m.chars().take(MAX_DETAIL_LEN).collect(),
        None => status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.as_u16().to_string()),
    }
}
