//! GitHub API client
//!
//! Minimal GitHub API client that knows how to wait out rate limits, retry transient
//! failures with exponential backoff, and tell authentication failures apart from
//! everything else.
//!
//! Transient failures are retried by a [`seatbelt`] retry layer. Rate-limit pauses
//! sit outside that layer and do not consume retry attempts. The last quota seen
//! on any response is shared by every clone of the client, so one exhausted metric
//! pauses all others until the reset time.

use super::LOG_TARGET;
use crate::clock;
use crate::error::{Error, Result};
use crate::facts::MetricKind;
use chrono::{DateTime, Utc};
use core::fmt;
use core::time::Duration;
use layered::{Execute, Service, Stack};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, RETRY_AFTER};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::{RecoveryInfo, ResilienceContext};
use std::sync::{Arc, Mutex, PoisonError};
use tick::Clock;

/// Upper bound on how many times a single request waits for a rate-limit reset
/// before the metric is reported unavailable.
const MAX_RATE_LIMIT_WAITS: u32 = 5;

/// Wait applied to a `429` that carries no reset information.
const DEFAULT_SECONDARY_LIMIT_WAIT_SECS: i64 = 60;

/// Timeout for a single HTTP exchange.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitInfo {
    /// Whether the quota is used up and has not been reset yet at `now`.
    #[must_use]
    pub fn is_exhausted_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining == 0 && self.reset_at > now
    }
}

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Retries on top of the original request.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.max_attempts.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Classification of a single HTTP exchange
#[derive(Debug)]
enum HostingApiResult {
    /// Request succeeded - contains the response and optional rate limit info
    Success(reqwest::Response, Option<RateLimitInfo>),

    /// Rate limited - should retry after reset time
    RateLimited(RateLimitInfo),

    /// The credential was rejected - must NOT retry
    Unauthorized(String),

    /// Network error or server error - may retry
    Transient(String),

    /// Request failed permanently - should NOT retry
    Failed(String),
}

/// Only network and server errors are worth another attempt.
fn recovery_for(result: &HostingApiResult) -> RecoveryInfo {
    match result {
        HostingApiResult::Transient(_) => RecoveryInfo::retry(),
        _ => RecoveryInfo::never(),
    }
}

/// A successfully fetched page
#[derive(Debug)]
pub struct Page {
    pub response: reqwest::Response,
    pub next_url: Option<String>,
}

/// Hosting API client
#[derive(Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
    clock: Clock,
    retry: RetryPolicy,
    quota: Arc<Mutex<Option<RateLimitInfo>>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("quota", &self.last_quota())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new hosting API client authenticating with `token`.
    pub fn new(token: &str, base_url: impl Into<String>, clock: Clock, retry: RetryPolicy) -> Result<Self> {
        let mut auth_val = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|e| Error::Configuration(format!("the GitHub token cannot be used in an HTTP header: {e}")))?;
        auth_val.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _ = headers.insert(AUTHORIZATION, auth_val);
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        let client = reqwest::Client::builder()
            .user_agent("repo-pulse")
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("could not build HTTP client: {e}")))?;

        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            clock,
            retry,
            quota: Arc::new(Mutex::new(None)),
        })
    }

    /// Get the base URL for this client
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page for `kind`.
    ///
    /// Before issuing the request, the call suspends until the reset time if the
    /// last quota seen by this client (or any of its clones) is exhausted.
    pub async fn get_page(&self, kind: MetricKind, url: &str) -> Result<Page> {
        let mut rate_limit_waits = 0_u32;

        loop {
            self.wait_for_quota(kind).await;

            log::debug!(target: LOG_TARGET, "GET {url} for {kind}");

            match self.send_with_retry(kind, url).await {
                HostingApiResult::Success(response, rate_limit) => {
                    if let Some(rate_limit) = rate_limit {
                        self.record_quota(rate_limit);
                    }
                    let next_url = next_page_url(response.headers());
                    return Ok(Page { response, next_url });
                }

                HostingApiResult::RateLimited(rate_limit) => {
                    self.record_quota(rate_limit);
                    rate_limit_waits += 1;
                    if rate_limit_waits > MAX_RATE_LIMIT_WAITS {
                        return Err(Error::UpstreamUnavailable {
                            kind,
                            message: format!("rate limit still in effect after waiting {MAX_RATE_LIMIT_WAITS} times"),
                        });
                    }

                    log::warn!(
                        target: LOG_TARGET,
                        "GitHub rate limit hit while fetching {kind}, resets at {}",
                        rate_limit.reset_at.with_timezone(&chrono::Local).format("%T")
                    );
                }

                HostingApiResult::Unauthorized(message) => {
                    return Err(Error::Authentication { kind, message });
                }

                HostingApiResult::Failed(message) => {
                    return Err(Error::UpstreamUnavailable { kind, message });
                }

                HostingApiResult::Transient(message) => {
                    return Err(Error::UpstreamUnavailable {
                        kind,
                        message: format!("{message} (gave up after {} attempts)", self.retry.retries() + 1),
                    });
                }
            }
        }
    }

    /// Issue one GET, retrying transient failures with exponential backoff.
    async fn send_with_retry(&self, kind: MetricKind, url: &str) -> HostingApiResult {
        let context = ResilienceContext::new(&self.clock).name("github_get");
        let client = self.client.clone();
        let clock = self.clock.clone();

        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(|result: &HostingApiResult, _| recovery_for(result))
                .max_retry_attempts(self.retry.retries())
                .base_delay(self.retry.base_delay)
                .backoff(Backoff::Exponential)
                .on_retry(move |_output, args| {
                    log::debug!(
                        target: LOG_TARGET,
                        "retrying {kind} request after transient failure (attempt {}, delay {}ms)",
                        args.attempt().index() + 1,
                        args.retry_delay().as_millis(),
                    );
                }),
            Execute::new(move |url: String| {
                let client = client.clone();
                let clock = clock.clone();
                async move { api_call(&client, &clock, &url).await }
            }),
        )
            .into_service();

        service.execute(url.to_string()).await
    }

    /// Suspend until the reset time if the known quota is exhausted.
    async fn wait_for_quota(&self, kind: MetricKind) {
        let Some(rate_limit) = self.last_quota() else {
            return;
        };

        let now = clock::now(&self.clock);
        if !rate_limit.is_exhausted_at(now) {
            return;
        }

        let wait = (rate_limit.reset_at - now).to_std().unwrap_or(Duration::ZERO);
        log::info!(
            target: LOG_TARGET,
            "GitHub quota exhausted, pausing {kind} requests for {}s until {}",
            wait.as_secs(),
            rate_limit.reset_at.with_timezone(&chrono::Local).format("%T")
        );
        self.clock.delay(wait).await;
    }

    fn last_quota(&self) -> Option<RateLimitInfo> {
        *self.quota.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_quota(&self, rate_limit: RateLimitInfo) {
        *self.quota.lock().unwrap_or_else(PoisonError::into_inner) = Some(rate_limit);
    }
}

/// Make an API call and classify the result
async fn api_call(client: &reqwest::Client, clock: &Clock, url: &str) -> HostingApiResult {
    let resp = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => return HostingApiResult::Transient(format!("request to {url} failed: {e}")),
    };

    // Extract rate limit info from response headers before checking status
    let rate_limit = extract_rate_limit_from_headers(resp.headers());

    let status = resp.status();
    if status.is_success() {
        return HostingApiResult::Success(resp, rate_limit);
    }

    let now = clock::now(clock);
    let retry_after = parse_retry_after(resp.headers()).map(|secs| RateLimitInfo {
        remaining: 0,
        reset_at: now + chrono::Duration::seconds(secs),
    });

    match status {
        StatusCode::TOO_MANY_REQUESTS => HostingApiResult::RateLimited(
            retry_after.or(rate_limit.filter(|rl| rl.remaining == 0)).unwrap_or_else(|| RateLimitInfo {
                remaining: 0,
                reset_at: now + chrono::Duration::seconds(DEFAULT_SECONDARY_LIMIT_WAIT_SECS),
            }),
        ),

        // GitHub reports both exhausted quotas and insufficient permissions as 403
        StatusCode::FORBIDDEN => match retry_after.or(rate_limit.filter(|rl| rl.remaining == 0)) {
            Some(rl) => HostingApiResult::RateLimited(rl),
            None => HostingApiResult::Unauthorized(format!("{url} returned HTTP {status}: {}", body_excerpt(resp).await)),
        },

        StatusCode::UNAUTHORIZED => HostingApiResult::Unauthorized(format!("{url} returned HTTP {status}: {}", body_excerpt(resp).await)),

        s if s.is_server_error() => HostingApiResult::Transient(format!("{url} returned HTTP {s}")),

        s => HostingApiResult::Failed(format!("{url} returned HTTP {s}: {}", body_excerpt(resp).await)),
    }
}

/// The `message` field of a GitHub error body, or a short excerpt of the raw body.
async fn body_excerpt(resp: reqwest::Response) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: String,
    }

    let text = resp.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text).map_or_else(|_| text.chars().take(200).collect(), |body| body.message)
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<usize>().ok()?;

    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;

    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<i64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<i64>().ok()
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;

    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;
        parts
            .any(|param| param.trim() == r#"rel="next""#)
            .then(|| target.to_string())
    })
}
