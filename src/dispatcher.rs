//! The request dispatcher: one blocking call to the Mundipagg API per
//! [`Dispatcher::send`], reported through an [`Envelope`].

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::blocking::Request;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::Configuration;
use crate::envelope::{Envelope, ErrorsResponse, Fault, Outcome, describe_json_error};
use crate::fetch::auth::{AuthMode, BasicAuth};
use crate::fetch::query::{QueryParam, build_url};
use crate::fetch::{BasicClient, HttpClient, HttpMethod};
use crate::redact::Blocklist;

/// Everything needed to issue one API call.
///
/// ```no_run
/// # use mundipagg::{ApiRequest, HttpMethod};
/// # #[derive(serde::Serialize)] struct NewCustomer { name: String }
/// let request = ApiRequest::new(HttpMethod::Post, "/customers")
///     .json(&NewCustomer { name: "Tony Stark".into() })
///     .header("Idempotency-Key", "7f1c");
/// ```
pub struct ApiRequest {
    method: HttpMethod,
    endpoint: String,
    body: Option<serde_json::Result<String>>,
    query: Vec<QueryParam>,
    headers: Vec<(String, String)>,
    auth: AuthMode,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
            query: Vec::new(),
            headers: Vec::new(),
            auth: AuthMode::default(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, endpoint)
    }

    /// Sets the JSON body, encoded with snake-case field names. Ignored for
    /// `GET`. An encoding failure is reported as [`Fault::Encode`] on send.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = Some(codec::encode(body));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), Some(value.into())));
        self
    }

    /// Adds a query parameter that may be absent; `None` is dropped.
    pub fn query_opt(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.query.push((key.into(), value.map(Into::into)));
        self
    }

    pub fn query_map<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), Some(v.into()))));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn auth(mut self, mode: AuthMode) -> Self {
        self.auth = mode;
        self
    }

    /// Selects the credential from a `sk` / `amk` / `token` string. Missing
    /// or unknown selectors use the secret key.
    pub fn auth_selector(self, selector: Option<&str>) -> Self {
        self.auth(AuthMode::from_selector(selector))
    }
}

/// The body is shown through the default block list; card fields never
/// appear in clear.
impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.body.as_ref().map(|body| match body {
            Ok(text) => Blocklist::default().redact_text(text),
            Err(_) => "<unencodable>".to_string(),
        });
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("body", &body)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("auth", &self.auth)
            .finish()
    }
}

/// Sends [`ApiRequest`]s for one merchant configuration.
///
/// `send` never returns an error: transport faults, API errors and empty
/// replies are all reported through the [`Envelope`]. The dispatcher holds no
/// per-call state and can be shared between threads.
pub struct Dispatcher<C = BasicClient> {
    config: Configuration,
    client: C,
    blocklist: Blocklist,
}

impl Dispatcher<BasicClient> {
    pub fn new(config: Configuration) -> Result<Self> {
        let client = BasicClient::new(config.timeout).context("failed to build HTTP client")?;
        Ok(Self::with_client(config, client))
    }
}

impl<C: HttpClient> Dispatcher<C> {
    pub fn with_client(config: Configuration, client: C) -> Self {
        Self {
            config,
            client,
            blocklist: Blocklist::default(),
        }
    }

    /// Replaces the default card-field block list used when logging payloads.
    pub fn with_blocklist(mut self, blocklist: Blocklist) -> Self {
        self.blocklist = blocklist;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Executes `request`, blocking until the API answers or the configured
    /// timeout expires.
    #[tracing::instrument(
        name = "api_request",
        skip_all,
        fields(
            method = %request.method,
            endpoint = %request.endpoint,
            request_key = %self.config.request_key,
            account_id = %self.config.merchant_id,
            merchant_id = %self.config.merchant_id,
        )
    )]
    pub fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Envelope<T> {
        let started = Instant::now();
        let mut envelope = Envelope {
            status: None,
            raw_request: None,
            raw_response: None,
            outcome: Outcome::Empty,
            elapsed_ms: 0,
            requested_at: Utc::now(),
        };

        envelope.outcome = match self.execute(request, &mut envelope) {
            Ok(outcome) => outcome,
            Err(fault) => {
                warn!(status = ?envelope.status, error = %fault, "Request failed");
                Outcome::Fault(fault)
            }
        };
        envelope.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            status = ?envelope.status,
            elapsed_ms = envelope.elapsed_ms,
            success = envelope.is_success(),
            "Request finished"
        );
        envelope
    }

    fn execute<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        envelope: &mut Envelope<T>,
    ) -> Result<Outcome<T>, Fault> {
        let req = self.prepare(&request)?;
        envelope.raw_request = req
            .body()
            .and_then(|body| body.as_bytes())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());

        let client = BasicAuth::key(&self.client, request.auth.credential(&self.config));
        debug!(url = %req.url(), auth = request.auth.as_str(), "Sending request");

        let response = client.execute(req)?;
        let status = response.status();
        envelope.status = Some(status.as_u16());

        let text = response.text()?;
        debug!(
            status = status.as_u16(),
            body = %self.blocklist.redact_text(&text),
            "Response body"
        );
        let outcome = interpret(status.is_success(), &text);
        envelope.raw_response = Some(text);
        outcome
    }

    /// Builds the HTTP request. Caller headers are applied last, one value
    /// per name: a repeated name keeps its last value and a caller
    /// `Content-Type` replaces the JSON default.
    fn prepare(&self, request: &ApiRequest) -> Result<Request, Fault> {
        let url = build_url(&self.config.api_url, &request.endpoint, &request.query)?;
        let mut req = Request::new(request.method.into(), url);
        req.headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(body) = request.body.as_ref().filter(|_| request.method.allows_body()) {
            let body = body.as_ref().map_err(|e| Fault::Encode {
                message: describe_json_error(e),
            })?;
            debug!(body = %self.blocklist.redact_text(body), "Request body");
            req.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            *req.body_mut() = Some(body.clone().into());
        }

        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Fault::InvalidHeader { name: name.clone() })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| Fault::InvalidHeader { name: name.clone() })?;
            req.headers_mut().insert(header_name, header_value);
        }

        Ok(req)
    }
}

/// Maps a completed response onto an [`Outcome`].
fn interpret<T: DeserializeOwned>(success: bool, text: &str) -> Result<Outcome<T>, Fault> {
    if text.trim().is_empty() {
        return Ok(Outcome::Empty);
    }
    if success {
        Ok(Outcome::Success(codec::decode(text)?))
    } else {
        Ok(Outcome::Failure(codec::decode::<ErrorsResponse>(text)?))
    }
}
