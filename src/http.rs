//! HTTP collaborator shared by the data sources and the Slack transport

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::Error;
use crate::Result;

const USER_AGENT: &str = concat!("spacebot/", env!("CARGO_PKG_VERSION"));

/// Status and body of a finished request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::MalformedPayload(format!("invalid JSON: {}", e)))
    }
}

/// Minimal HTTP surface the bot needs.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url` with the given query parameters.
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse>;

    /// POST an urlencoded form to `url`.
    async fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<HttpResponse>;
}

/// GET a JSON document, treating anything but a 200 as upstream failure.
pub async fn get_json(client: &dyn HttpClient, url: &str, query: &[(&str, String)]) -> Result<Value> {
    let response = client.get(url, query).await?;
    if !response.is_ok() {
        return Err(Error::UpstreamUnavailable(format!(
            "{} returned HTTP {}",
            url, response.status
        )));
    }
    response.json()
}

/// reqwest-backed client with a bounded timeout on every call.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Failed to read response: {}", e)))?;
        Ok(HttpResponse { status, body })
    }

    async fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<HttpResponse> {
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to post to {}: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response: {}", e)))?;
        Ok(HttpResponse { status, body })
    }
}

/// A request seen by [`FakeHttpClient`].
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub params: Vec<(String, String)>,
}

#[cfg(test)]
impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Fake HTTP client for testing: replays canned responses in order.
#[cfg(test)]
#[derive(Default)]
pub struct FakeHttpClient {
    responses: std::sync::Mutex<std::collections::VecDeque<HttpResponse>>,
    requests: std::sync::Mutex<Vec<RecordedRequest>>,
}

#[cfg(test)]
impl FakeHttpClient {
    /// Create with predefined 200 responses.
    pub fn new(bodies: Vec<&str>) -> Self {
        Self::with_responses(bodies.into_iter().map(|b| HttpResponse::new(200, b)).collect())
    }

    pub fn with_responses(responses: Vec<HttpResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, method: &'static str, url: &str, params: &[(&str, String)]) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            url: url.to_string(),
            params: params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::UpstreamUnavailable("No more fake responses".to_string()))
    }
}

#[cfg(test)]
#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse> {
        self.next("GET", url, query)
    }

    async fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<HttpResponse> {
        self.next("POST", url, form)
    }
}
