use crate::fetch::client::HttpClient;
use base64::{Engine, prelude::BASE64_STANDARD};
use reqwest::header::{AUTHORIZATION, HeaderValue};

/// An [`HttpClient`] wrapper that injects an `Authorization: Basic` header.
///
/// Mundipagg expects the selected key as `username` and an empty `password`.
pub struct BasicAuth<'a, C> {
    pub inner: C,
    pub username: &'a str,
    pub password: &'a str,
}

impl<'a, C> BasicAuth<'a, C> {
    /// Username-only credentials, the form every Mundipagg key uses.
    pub fn key(inner: C, username: &'a str) -> Self {
        Self {
            inner,
            username,
            password: "",
        }
    }

    fn header_value(&self) -> HeaderValue {
        let encoded = BASE64_STANDARD.encode(format!("{}:{}", self.username, self.password));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
            .expect("base64 output is a valid header value");
        value.set_sensitive(true);
        value
    }
}

impl<C: HttpClient> HttpClient for BasicAuth<'_, C> {
    fn execute(&self, mut req: reqwest::blocking::Request) -> reqwest::Result<reqwest::blocking::Response> {
        req.headers_mut().insert(AUTHORIZATION, self.header_value());
        self.inner.execute(req)
    }
}
