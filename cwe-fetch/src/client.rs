//! Endpoint client
//!
//! All network I/O of the collection stage goes through [`EndpointClient`]:
//! a response cache in front of a two-layer retry ladder (see [`crate::retry`]),
//! with one connection-pooled `reqwest::Client` shared by every worker. The
//! shared client is swapped for a fresh one after connection resets and
//! when the connectivity probe switches trust configuration.

use crate::cache::ResponseCache;
use crate::error::{FetchError, FetchResult};
use crate::retry::{CallState, Decision, RetryPolicy};
use crate::stats::RequestStats;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Certificate trust configuration of the HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustMode {
    /// Platform TLS with the system certificate store
    System,
    /// rustls with the bundled Mozilla root set
    BundledRoots,
    /// Certificate verification disabled (`--insecure`)
    Insecure,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub trust: TrustMode,
    pub cache_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: cwe_common::config::get_user_agent(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            trust: TrustMode::System,
            cache_capacity: crate::cache::DEFAULT_CACHE_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of a cached, retried fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Json(Arc<Value>),
    /// Retries exhausted or a non-retryable failure
    Empty,
    /// HTTP 404 on a weakness URL; `category_hint` when the body mentions categories
    Missing { category_hint: bool },
}

impl FetchOutcome {
    pub fn json(&self) -> Option<&Value> {
        match self {
            FetchOutcome::Json(value) => Some(value),
            _ => None,
        }
    }
}

pub struct EndpointClient {
    http: RwLock<reqwest::Client>,
    trust: RwLock<TrustMode>,
    config: ClientConfig,
    cache: ResponseCache,
    stats: RequestStats,
}

impl EndpointClient {
    pub fn new(config: ClientConfig) -> FetchResult<Self> {
        let http = build_http(&config, config.trust)?;
        Ok(Self {
            http: RwLock::new(http),
            trust: RwLock::new(config.trust),
            cache: ResponseCache::new(config.cache_capacity),
            stats: RequestStats::default(),
            config,
        })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn stats(&self) -> &RequestStats {
        &self.stats
    }

    pub fn trust(&self) -> TrustMode {
        *self.trust.read()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry
    }

    fn http(&self) -> reqwest::Client {
        self.http.read().clone()
    }

    /// Replace the shared client with a fresh one (drops pooled connections)
    pub fn recreate(&self) {
        match build_http(&self.config, self.trust()) {
            Ok(fresh) => {
                *self.http.write() = fresh;
                debug!("Recreated HTTP client");
            }
            Err(e) => warn!(error = %e, "Failed to recreate HTTP client, keeping the current one"),
        }
    }

    /// Cached GET with both retry layers
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        if let Some(hit) = self.cache.get(url) {
            self.stats.record_cache_hit();
            debug!(url, "Cache hit");
            return FetchOutcome::Json(hit);
        }

        self.stats.record_request();
        let max_attempts = self.config.retry.max_retries + 1;
        let mut state = CallState::Attempting;
        let mut result = None;

        while !state.is_terminal() {
            let attempt = state.attempt();
            debug!(url, attempt = attempt + 1, max_attempts, "Fetching");

            match self.attempt(url).await {
                Ok(value) => {
                    result = Some(Arc::new(value));
                    state = state.after_success();
                }
                Err(FetchError::NotFound(body)) if is_weakness_url(url) => {
                    let category_hint = body.to_lowercase().contains("category");
                    debug!(url, category_hint, "Weakness not found");
                    return FetchOutcome::Missing { category_hint };
                }
                Err(err) => {
                    let decision = self.config.retry.decide(attempt, &err);
                    match decision {
                        Decision::Retry { wait, recreate_client } => {
                            warn!(
                                url,
                                attempt = attempt + 1,
                                max_attempts,
                                wait_ms = wait.as_millis() as u64,
                                error = %err,
                                "Request failed, will retry after backoff"
                            );
                            if recreate_client {
                                self.recreate();
                            }
                            tokio::time::sleep(wait).await;
                        }
                        Decision::GiveUp => match err {
                            FetchError::Tls(_) => {
                                error!(url, error = %err, "Certificate verification failed; check the system trust store")
                            }
                            FetchError::NotFound(_) => debug!(url, "Not found"),
                            _ => warn!(url, attempts = attempt + 1, error = %err, "Request dropped"),
                        },
                    }
                    state = state.after_failure(decision);
                }
            }
        }

        match result {
            Some(value) => {
                if !self.cache.insert(url, Arc::clone(&value)) {
                    debug!(url, cached = self.cache.len(), "Response not cached");
                }
                FetchOutcome::Json(value)
            }
            None => FetchOutcome::Empty,
        }
    }

    /// One application-layer attempt (transport retries included)
    ///
    /// Every response that arrives feeds the latency window, whatever its
    /// status.
    async fn attempt(&self, url: &str) -> FetchResult<Value> {
        let started = Instant::now();
        let response = self.send(&self.http(), url, None).await?;
        self.stats.record_latency(started.elapsed());
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), url, body));
        }
        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Malformed(e.to_string()))
    }

    /// Transport layer: retry retryable statuses and connection resets
    ///
    /// `timeout` overrides the client-wide request timeout per attempt.
    async fn send(&self, http: &reqwest::Client, url: &str, timeout: Option<Duration>) -> FetchResult<reqwest::Response> {
        let policy = &self.config.retry;
        let attempts = policy.transport_attempts.max(1);
        let mut n = 0;

        loop {
            let last = n + 1 >= attempts;
            let mut request = http.get(url);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }
            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if last || !policy.transport_retries_status(status) {
                        return Ok(response);
                    }
                    let wait = policy.transport_backoff(n);
                    debug!(url, status, retry = n + 1, wait_ms = wait.as_millis() as u64, "Transport retry");
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    let err = FetchError::from_reqwest(err);
                    if last || !matches!(err, FetchError::Transport(_)) {
                        return Err(err);
                    }
                    let wait = policy.transport_backoff(n);
                    debug!(url, retry = n + 1, wait_ms = wait.as_millis() as u64, error = %err, "Transport retry");
                    tokio::time::sleep(wait).await;
                }
            }
            n += 1;
        }
    }

    /// Single uncached GET returning the status only
    pub async fn status(&self, url: &str, timeout: Duration) -> FetchResult<u16> {
        let response = self
            .http()
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;
        Ok(response.status().as_u16())
    }

    /// Single uncached GET that must return JSON
    pub async fn get_json_once(&self, url: &str, timeout: Duration) -> FetchResult<Value> {
        get_json(&self.http(), url, timeout).await
    }

    /// Reachability check: any HTTP response counts
    ///
    /// Connection resets and retryable statuses go through the transport
    /// retry ladder first. Returns the parsed body when the endpoint
    /// answered 200 with JSON.
    pub async fn probe(&self, url: &str, timeout: Duration) -> FetchResult<Option<Value>> {
        self.reach(&self.http(), url, timeout).await
    }

    /// Probe with another trust configuration; adopt it on success
    pub async fn probe_with_trust(&self, trust: TrustMode, url: &str, timeout: Duration) -> FetchResult<Option<Value>> {
        let candidate = build_http(&self.config, trust)?;
        let body = self.reach(&candidate, url, timeout).await?;

        *self.http.write() = candidate;
        *self.trust.write() = trust;
        info!(?trust, "Switched HTTP client trust configuration");
        Ok(body)
    }

    async fn reach(&self, http: &reqwest::Client, url: &str, timeout: Duration) -> FetchResult<Option<Value>> {
        let response = self.send(http, url, Some(timeout)).await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            debug!(url, status = status.as_u16(), "Endpoint reachable");
            return Ok(None);
        }
        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
        Ok(serde_json::from_slice(&bytes).ok())
    }
}

/// Weakness endpoints answer 404 for category identifiers
fn is_weakness_url(url: &str) -> bool {
    url.contains("/cwe/weakness/")
}

async fn get_json(http: &reqwest::Client, url: &str, timeout: Duration) -> FetchResult<Value> {
    let response = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(FetchError::from_reqwest)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::from_status(status.as_u16(), url, body));
    }
    let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
    serde_json::from_slice(&bytes).map_err(|e| FetchError::Malformed(e.to_string()))
}

fn build_http(config: &ClientConfig, trust: TrustMode) -> FetchResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let builder = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout);

    let builder = match trust {
        TrustMode::System => builder,
        TrustMode::BundledRoots => builder.use_rustls_tls().tls_built_in_root_certs(true),
        TrustMode::Insecure => builder.danger_accept_invalid_certs(true),
    };

    builder.build().map_err(|e| FetchError::Client(e.to_string()))
}
