//! Response envelope returned by every dispatched request.
//!
//! Failures never surface as `Err`: the envelope records what happened and the
//! caller decides. [`Outcome`] makes the success / API error / transport fault
//! cases mutually exclusive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::error::Category;
use std::collections::BTreeMap;

/// Error document the API returns alongside a non-2xx status.
///
/// ```json
/// {
///   "message": "The request is invalid.",
///   "errors": { "customer.name": ["The name field is required."] },
///   "request": { "name": "" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorsResponse {
    #[serde(default)]
    pub message: Option<String>,
    /// Field path to the messages reported for it. The API sends `null` when
    /// there are none.
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: BTreeMap<String, Vec<String>>,
    /// The request as the API understood it, when echoed back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<serde_json::Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ErrorsResponse {
    /// All reported messages, flattened in field order.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.errors.values().flatten().map(String::as_str)
    }
}

/// Why a request could not produce a typed result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    #[error("invalid request url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    #[error("request body could not be encoded: {message}")]
    Encode { message: String },

    #[error("request timed out: {message}")]
    Timeout { message: String },

    #[error("connection failed: {message}")]
    Connect { message: String },

    #[error("http transport error: {message}")]
    Transport { message: String },

    #[error("response body could not be decoded: {message}")]
    Decode { message: String },
}

impl From<reqwest::Error> for Fault {
    fn from(value: reqwest::Error) -> Self {
        let message = value.to_string();
        if value.is_timeout() {
            return Self::Timeout { message };
        }
        if value.is_connect() {
            return Self::Connect { message };
        }
        if value.is_decode() {
            return Self::Decode { message };
        }
        Self::Transport { message }
    }
}

impl From<serde_json::Error> for Fault {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode {
            message: describe_json_error(&value),
        }
    }
}

/// Describes a serde_json error without its message text, which quotes the
/// offending value (a card number, for instance). Missing and duplicate field
/// errors only name the field and are kept.
pub(crate) fn describe_json_error(err: &serde_json::Error) -> String {
    let text = err.to_string();
    if text.starts_with("missing field") || text.starts_with("duplicate field") {
        return text;
    }

    let what = match err.classify() {
        Category::Io => "read failure",
        Category::Syntax => "malformed json",
        Category::Data => "value does not match the expected type",
        Category::Eof => "unexpected end of json",
    };
    if err.line() == 0 {
        what.to_string()
    } else {
        format!("{what} at line {} column {}", err.line(), err.column())
    }
}

/// Result of one dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// 2xx with a body that decoded as `T`.
    Success(T),
    /// Non-2xx with a body that decoded as [`ErrorsResponse`].
    Failure(ErrorsResponse),
    /// The call did not complete, or its body could not be interpreted.
    Fault(Fault),
    /// The call completed with a blank body. With a non-2xx status only the
    /// status code describes the failure.
    Empty,
}

/// Everything known about one request/response round trip.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub raw_request: Option<String>,
    pub raw_response: Option<String>,
    pub outcome: Outcome<T>,
    pub elapsed_ms: u64,
    pub requested_at: DateTime<Utc>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
            && matches!(self.outcome, Outcome::Success(_) | Outcome::Empty)
    }

    pub fn data(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn errors(&self) -> Option<&ErrorsResponse> {
        match &self.outcome {
            Outcome::Failure(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn fault(&self) -> Option<&Fault> {
        match &self.outcome {
            Outcome::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Consumes the envelope, keeping only the success payload.
    pub fn into_data(self) -> Option<T> {
        match self.outcome {
            Outcome::Success(data) => Some(data),
            _ => None,
        }
    }
}
