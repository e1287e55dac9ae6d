//! Blocking client adapter for the Mundipagg payment API.
//!
//! A [`Dispatcher`] turns an [`ApiRequest`] into one authenticated HTTP call
//! and reports the result as an [`Envelope`]: status, raw request and
//! response text, a typed payload or API error document or transport fault,
//! and the elapsed time.

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod fetch;
pub mod redact;

pub use config::Configuration;
pub use dispatcher::{ApiRequest, Dispatcher};
pub use envelope::{Envelope, ErrorsResponse, Fault, Outcome};
pub use fetch::HttpMethod;
pub use fetch::auth::AuthMode;
