//! Client configuration for the Mundipagg API.
//!
//! [`Configuration`] is built once by the caller and shared read-only by every
//! request a [`Dispatcher`](crate::dispatcher::Dispatcher) sends.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.mundipagg.com/core/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Base URL, credentials and correlation identifiers for one merchant.
#[derive(Clone)]
pub struct Configuration {
    pub api_url: String,
    /// Default credential, used for `sk` and for any unrecognized mode.
    pub secret_key: String,
    pub account_management_key: String,
    pub api_token: String,
    /// Caller-supplied correlation identifier attached to every log event.
    pub request_key: String,
    pub merchant_id: String,
    pub timeout: Duration,
}

/// On-disk shape of a [`Configuration`].
///
/// ```json
/// {
///   "api_url": "https://api.mundipagg.com/core/v1",
///   "secret_key": "sk_test_...",
///   "account_management_key": "acc_...",
///   "api_token": "tok_...",
///   "request_key": "checkout-42",
///   "merchant_id": "merch_...",
///   "timeout_secs": 30
/// }
/// ```
#[derive(Deserialize)]
struct ConfigFile {
    api_url: Option<String>,
    secret_key: String,
    #[serde(default)]
    account_management_key: String,
    #[serde(default)]
    api_token: String,
    #[serde(default)]
    request_key: String,
    #[serde(default)]
    merchant_id: String,
    timeout_secs: Option<u64>,
}

impl Configuration {
    /// Creates a configuration with only a secret key, pointing at the
    /// production API.
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            secret_key: secret_key.into(),
            account_management_key: String::new(),
            api_token: String::new(),
            request_key: String::new(),
            merchant_id: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads the configuration from `MUNDIPAGG_*` environment variables.
    ///
    /// Only `MUNDIPAGG_SECRET_KEY` is required.
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("MUNDIPAGG_SECRET_KEY")
            .context("MUNDIPAGG_SECRET_KEY must be set")?;

        let timeout = match std::env::var("MUNDIPAGG_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("MUNDIPAGG_TIMEOUT_SECS is not a number: {raw}"))?,
            ),
            Err(_) => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_url: std::env::var("MUNDIPAGG_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            secret_key,
            account_management_key: std::env::var("MUNDIPAGG_ACCOUNT_MANAGEMENT_KEY")
                .unwrap_or_default(),
            api_token: std::env::var("MUNDIPAGG_TOKEN").unwrap_or_default(),
            request_key: std::env::var("MUNDIPAGG_REQUEST_KEY").unwrap_or_default(),
            merchant_id: std::env::var("MUNDIPAGG_MERCHANT_ID").unwrap_or_default(),
            timeout,
        })
    }

    /// Loads the configuration from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        Self::from_json(&content)
    }

    fn from_json(content: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_str(content).context("config file is not valid JSON")?;

        Ok(Self {
            api_url: file.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            secret_key: file.secret_key,
            account_management_key: file.account_management_key,
            api_token: file.api_token,
            request_key: file.request_key,
            merchant_id: file.merchant_id,
            timeout: file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

/// Keeps the last four characters of a credential.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 4 {
        "*".repeat(chars.len() - 4) + &chars[chars.len() - 4..].iter().collect::<String>()
    } else {
        "*".repeat(chars.len())
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("api_url", &self.api_url)
            .field("secret_key", &mask(&self.secret_key))
            .field("account_management_key", &mask(&self.account_management_key))
            .field("api_token", &mask(&self.api_token))
            .field("request_key", &self.request_key)
            .field("merchant_id", &self.merchant_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_applies_defaults() {
        let config = Configuration::from_json(r#"{"secret_key":"sk_test_123"}"#).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.secret_key, "sk_test_123");
        assert!(config.account_management_key.is_empty());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_from_json_reads_all_fields() {
        let config = Configuration::from_json(
            r#"{
                "api_url": "http://localhost:9000",
                "secret_key": "sk",
                "account_management_key": "amk",
                "api_token": "tok",
                "request_key": "req-1",
                "merchant_id": "merch-1",
                "timeout_secs": 5
            }"#,
        )
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.account_management_key, "amk");
        assert_eq!(config.api_token, "tok");
        assert_eq!(config.request_key, "req-1");
        assert_eq!(config.merchant_id, "merch-1");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_json_requires_secret_key() {
        assert!(Configuration::from_json(r#"{"api_url":"http://x"}"#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Configuration::load("/definitely/not/here.json").is_err());
    }

    #[test]
    fn test_debug_masks_credentials() {
        let mut config = Configuration::new("sk_test_abcdef1234");
        config.api_token = "tok".to_string();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk_test_abcdef1234"));
        assert!(debug.contains("1234"));
        assert!(!debug.contains("\"tok\""));
    }
}
