use super::client::HttpClient;
use std::time::Duration;

pub const USER_AGENT: &str = "Mundipagg Rust SDK";

/// Plain `reqwest` blocking client with the SDK user agent and a request
/// timeout. Connections are pooled across calls.
pub struct BasicClient(reqwest::blocking::Client);

impl BasicClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self(client))
    }
}

impl HttpClient for BasicClient {
    fn execute(&self, req: reqwest::blocking::Request) -> reqwest::Result<reqwest::blocking::Response> {
        self.0.execute(req)
    }
}
