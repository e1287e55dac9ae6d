//! Credential selection and basic authentication.
//!
//! The Mundipagg API authenticates every call with HTTP basic auth: one of
//! three configured keys as the username and an empty password. [`AuthMode`]
//! picks the key, [`BasicAuth`] writes the header.

mod basic_auth;

pub use basic_auth::BasicAuth;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use crate::config::Configuration;

/// Which configured credential authenticates a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMode {
    /// Merchant secret key (`sk`).
    #[default]
    #[serde(rename = "sk")]
    SecretKey,
    /// Account management key (`amk`).
    #[serde(rename = "amk")]
    AccountManagementKey,
    /// API token (`token`).
    #[serde(rename = "token")]
    Token,
}

impl AuthMode {
    /// Resolves a selector string, falling back to [`AuthMode::SecretKey`]
    /// when it is absent or unrecognized. Unrecognized selectors are logged.
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector {
            None => AuthMode::SecretKey,
            Some(s) => s.parse().unwrap_or_else(|_| {
                warn!(selector = s, "Unrecognized auth mode, using secret key");
                AuthMode::SecretKey
            }),
        }
    }

    /// Returns the credential this mode selects from `config`.
    pub fn credential(self, config: &Configuration) -> &str {
        match self {
            AuthMode::SecretKey => &config.secret_key,
            AuthMode::AccountManagementKey => &config.account_management_key,
            AuthMode::Token => &config.api_token,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthMode::SecretKey => "sk",
            AuthMode::AccountManagementKey => "amk",
            AuthMode::Token => "token",
        }
    }
}

/// Strict parsing: unknown selectors are an error.
impl FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sk" => Ok(AuthMode::SecretKey),
            "amk" => Ok(AuthMode::AccountManagementKey),
            "token" => Ok(AuthMode::Token),
            other => Err(anyhow::anyhow!("unknown auth mode: {other} (expected sk, amk or token)")),
        }
    }
}
