//! Wire types for the PayPal OAuth and Orders v2 APIs.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder PayPal assigns to `reference_id` when the merchant left it unset.
pub const DEFAULT_REFERENCE_ID: &str = "default";

/// Bearer credential returned by the token endpoint.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(****)")
    }
}

/// Response from `POST /v1/oauth2/token`
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: Option<u64>,
}

/// Order lifecycle as reported by PayPal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Created,
    Saved,
    Approved,
    Pending,
    Voided,
    Completed,
    PayerActionRequired,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Saved => "SAVED",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Pending => "PENDING",
            OrderStatus::Voided => "VOIDED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::PayerActionRequired => "PAYER_ACTION_REQUIRED",
            OrderStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "CREATED" => OrderStatus::Created,
            "SAVED" => OrderStatus::Saved,
            "APPROVED" => OrderStatus::Approved,
            "PENDING" => OrderStatus::Pending,
            "VOIDED" => OrderStatus::Voided,
            "COMPLETED" => OrderStatus::Completed,
            "PAYER_ACTION_REQUIRED" => OrderStatus::PayerActionRequired,
            _ => OrderStatus::Other(raw),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response from `GET /v2/checkout/orders/{id}`.
///
/// Every field is optional on the wire; the verifier decides which absences
/// are fatal and in what order they are reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub id: Option<String>,
    pub status: Option<OrderStatus>,
    pub purchase_units: Option<Vec<PurchaseUnit>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseUnit {
    pub reference_id: Option<String>,
    pub amount: Option<UnitAmount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitAmount {
    pub currency_code: String,
    pub value: String,
}
