use anyhow::Context;
use dotenvy::dotenv;
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::time::Duration;
use url::Url;

use crate::secrets::SecretsManager;

pub const PAYPAL_SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub paypal: PayPalConfig,
}

/// Credentials and transport settings for the PayPal REST API.
#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub timeout: Duration,
    pub token_cache: bool,
    pub circuit_failure_threshold: u32,
    pub circuit_reset_secs: u64,
}

impl PayPalConfig {
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            timeout: Duration::from_secs(10),
            token_cache: true,
            circuit_failure_threshold: 5,
            circuit_reset_secs: 30,
        }
    }

    pub fn has_client_secret(&self) -> bool {
        !self.client_secret.expose_secret().is_empty()
    }

    fn from_env() -> anyhow::Result<Self> {
        let base_url = env::var("PAYPAL_BASE_URL").unwrap_or_else(|_| PAYPAL_SANDBOX_URL.to_string());
        Url::parse(&base_url).with_context(|| format!("PAYPAL_BASE_URL is not a valid URL: {}", base_url))?;

        Ok(PayPalConfig {
            base_url,
            client_id: env::var("PAYPAL_CLIENT_ID").context("PAYPAL_CLIENT_ID is required")?,
            client_secret: client_secret_from(
                env::var("PAYPAL_CLIENT_SECRET").ok(),
                SecretsManager::is_configured(),
            )?,
            timeout: timeout_from_secs(parse_var("PAYPAL_TIMEOUT_SECS", 10)?)?,
            token_cache: parse_var("PAYPAL_TOKEN_CACHE", true)?,
            circuit_failure_threshold: parse_var("PAYPAL_CIRCUIT_FAILURE_THRESHOLD", 5)?,
            circuit_reset_secs: parse_var("PAYPAL_CIRCUIT_RESET_SECS", 30)?,
        })
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: parse_var("SERVER_PORT", 3000)?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            paypal: PayPalConfig::from_env()?,
        })
    }

    /// Replaces the PayPal client secret, e.g. with one read from Vault.
    pub fn with_paypal_secret(mut self, secret: String) -> Self {
        self.paypal.client_secret = SecretString::new(secret);
        self
    }
}

/// The secret may be left out of the environment when Vault will supply it;
/// it stays empty until `Config::with_paypal_secret` fills it in.
fn client_secret_from(env_value: Option<String>, vault_configured: bool) -> anyhow::Result<SecretString> {
    match env_value.filter(|v| !v.is_empty()) {
        Some(secret) => Ok(SecretString::new(secret)),
        None if vault_configured => Ok(SecretString::new(String::new())),
        None => anyhow::bail!("PAYPAL_CLIENT_SECRET is required unless Vault is configured"),
    }
}

fn timeout_from_secs(secs: u64) -> anyhow::Result<Duration> {
    if secs == 0 {
        anyhow::bail!("PAYPAL_TIMEOUT_SECS must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
