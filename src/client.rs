//! Submission client: POST a [`Record`] to the ingestion endpoint with retry.
//!
//! Each attempt is one blocking request. An attempt that cannot produce a
//! readable [`Confirmation`] (connection failure, non-2xx status, unparsable
//! body) is retried with exponential backoff. A readable `success: false`
//! answer is returned at once as [`Error::Server`].
//!
//! The client performs no deduplication. If a request reaches the endpoint
//! but its response is lost, the retry appends a second row unless the
//! server runs with `idempotent_retries` enabled.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{Confirmation, Record};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP round trip. Implementations must not retry on their own.
pub trait Transport: Send + Sync {
    fn post_json(&self, url: &str, body: &str) -> Result<TransportResponse>;
    fn get(&self, url: &str) -> Result<TransportResponse>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: &str) -> Result<TransportResponse> {
        let resp = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()?;
        let status = resp.status().as_u16();
        Ok(TransportResponse::new(status, resp.text()?))
    }

    fn get(&self, url: &str) -> Result<TransportResponse> {
        let resp = self.client.get(url).send()?;
        let status = resp.status().as_u16();
        Ok(TransportResponse::new(status, resp.text()?))
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let config = ClientConfig::default();
        Self::from_config(&config)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay())
    }

    /// Wait after failed attempt `attempt` (0-indexed): `base · 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

// ---------------------------------------------------------------------------
// SubmissionClientBuilder
// ---------------------------------------------------------------------------

pub struct SubmissionClientBuilder {
    endpoint: String,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Default for SubmissionClientBuilder {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl SubmissionClientBuilder {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.endpoint_url.clone(),
            retry: RetryPolicy::from_config(config),
            timeout: config.timeout(),
        }
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Per-attempt HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a client that talks HTTP.
    pub fn build(self) -> Result<SubmissionClient<HttpTransport>> {
        let transport = HttpTransport::new(self.timeout)?;
        self.build_with_transport(transport)
    }

    pub fn build_with_transport<T: Transport>(self, transport: T) -> Result<SubmissionClient<T>> {
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint URL '{}': {}", self.endpoint, e)))?;
        Ok(SubmissionClient {
            endpoint,
            retry: self.retry,
            transport,
        })
    }
}

// ---------------------------------------------------------------------------
// SubmissionClient
// ---------------------------------------------------------------------------

/// One page of the read API's record listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub success: bool,
    pub data: Vec<Value>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

pub struct SubmissionClient<T: Transport = HttpTransport> {
    endpoint: Url,
    retry: RetryPolicy,
    transport: T,
}

impl SubmissionClient<HttpTransport> {
    pub fn builder() -> SubmissionClientBuilder {
        SubmissionClientBuilder::default()
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        SubmissionClientBuilder::from_config(config).build()
    }
}

impl<T: Transport> SubmissionClient<T> {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Serialize and submit a record.
    pub fn submit(&self, record: &Record) -> Result<Confirmation> {
        let payload = record.to_json()?;
        tracing::debug!(id = record.id(), "submitting record");
        self.submit_payload(&payload)
    }

    /// Submit arbitrary JSON, e.g. a record rebuilt from a legacy sheet.
    pub fn submit_value(&self, value: &Value) -> Result<Confirmation> {
        self.submit_payload(&serde_json::to_string(value)?)
    }

    /// POST `payload` until the endpoint gives a verdict or attempts run out.
    pub fn submit_payload(&self, payload: &str) -> Result<Confirmation> {
        let started = Instant::now();
        let attempts = self.retry.attempts();
        let mut attempt = 0;
        loop {
            match self.attempt(payload) {
                Ok(confirmation) => {
                    if attempt > 0 {
                        tracing::info!(
                            attempt = attempt + 1,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "submission succeeded after retry"
                        );
                    }
                    return Ok(confirmation);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt + 1 >= attempts => {
                    tracing::error!(
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "submission failed: retries exhausted"
                    );
                    return Err(err);
                }
                Err(err) => {
                    let backoff = self.retry.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "submission failed, will retry after backoff"
                    );
                    thread::sleep(backoff);
                    attempt += 1;
                }
            }
        }
    }

    fn attempt(&self, payload: &str) -> Result<Confirmation> {
        let resp = self.transport.post_json(self.endpoint.as_str(), payload)?;
        if !resp.is_success() {
            return Err(Error::Transport(format!("HTTP status {}", resp.status)));
        }
        let confirmation = parse_confirmation(&resp.body)?;
        if confirmation.success {
            Ok(confirmation)
        } else {
            Err(Error::Server(confirmation.message))
        }
    }

    // -----------------------------------------------------------------------
    // Read API (single attempt)
    // -----------------------------------------------------------------------

    /// `GET /health` on the endpoint's host.
    pub fn health(&self) -> Result<Value> {
        let url = self.url_for(&["health"], &[])?;
        self.get_json(&url)
    }

    pub fn list_records(&self, limit: usize, offset: usize) -> Result<RecordPage> {
        let url = self.url_for(
            &["api", "records"],
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )?;
        Ok(serde_json::from_value(self.get_json(&url)?)?)
    }

    /// The stored row for `id`, or `None` when the server has no such record.
    pub fn get_record(&self, id: &str) -> Result<Option<Value>> {
        let url = self.url_for(&["api", "records", id], &[])?;
        let resp = self.transport.get(url.as_str())?;
        if resp.status == 404 {
            return Ok(None);
        }
        if !resp.is_success() {
            return Err(Error::Transport(format!("HTTP status {}", resp.status)));
        }
        let body: Value = serde_json::from_str(&resp.body)?;
        Ok(body.get("data").cloned().or(Some(body)))
    }

    fn get_json(&self, url: &Url) -> Result<Value> {
        let resp = self.transport.get(url.as_str())?;
        if !resp.is_success() {
            return Err(Error::Transport(format!("HTTP status {}", resp.status)));
        }
        Ok(serde_json::from_str(&resp.body)?)
    }

    /// Endpoint origin with `segments` as the path.
    fn url_for(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("endpoint '{}' cannot be a base", self.endpoint)))?
            .clear()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

/// Parse a confirmation from a JSON body, tolerating text around the object.
///
/// Some hosts wrap script output in HTML or add a prefix; everything outside
/// the first `{` and the last `}` is ignored.
pub fn parse_confirmation(body: &str) -> Result<Confirmation> {
    if let Ok(confirmation) = serde_json::from_str::<Confirmation>(body.trim()) {
        return Ok(confirmation);
    }
    let start = body.find('{');
    let end = body.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Confirmation>(&body[start..=end]).map_err(|e| {
                Error::Transport(format!("unparsable response body: {}", e))
            })
        }
        _ => Err(Error::Transport(format!(
            "response is not JSON: {}",
            truncate(body, 80)
        ))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}
