pub mod client;
pub mod models;
pub mod token_cache;

pub use client::{AuthenticationFailed, CommunicationFailure, FetchError, PayPalClient};
pub use models::{AccessToken, OrderDetails, OrderStatus, PurchaseUnit, UnitAmount, DEFAULT_REFERENCE_ID};
pub use token_cache::TokenCache;
