//! HTTP transport for provider APIs.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * Request rate limiting shared by all providers
//! * A per-call timeout, which is what the retry policy reacts to
//! * Consistent keep-alive and JSON decoding
//!
//! The [`Transport`] trait is the seam between the resolver and the
//! network. [`Client`] implements it for production use; tests substitute a
//! scripted implementation.
//!
//! # Resource Handling
//!
//! Connections are pooled by `reqwest`. A connection is returned to the pool
//! or closed when the request future completes or is dropped, so abandoning
//! a request (for example through cancellation) does not leak it.
//!
//! # Example
//!
//! ```rust
//! use mirrorsrc::http::{ApiRequest, Client, Transport};
//!
//! let client = Client::new(&config)?;
//! let request = ApiRequest::new("lastfm", url);
//! let json = client.get_json(request).await?;
//! ```

use std::{fmt, future::Future, num::NonZeroU32, time::Duration};

use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT},
    Url,
};
use serde_json::Value;

use crate::{
    config::Config,
    error::{Error, Result},
    protocol,
};

/// A GET request to a provider API.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Provider name, used for logging and events.
    pub origin: String,

    pub url: Url,

    /// Headers in addition to the client defaults.
    pub headers: HeaderMap,
}

impl ApiRequest {
    #[must_use]
    pub fn new(origin: impl Into<String>, url: Url) -> Self {
        Self {
            origin: origin.into(),
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Adds a header.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `value` is not a valid header value.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Result<Self> {
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(self)
    }
}

/// Headers may hold API keys, so only their names are printed.
impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("origin", &self.origin)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Issues provider requests and returns the parsed JSON tree.
pub trait Transport: Send + Sync {
    /// Performs `request` and parses the response body as JSON. An empty
    /// body is `Value::Null`.
    ///
    /// # Errors
    ///
    /// * `DeadlineExceeded` when the call timed out
    /// * `Unavailable` when no connection could be made
    /// * `FailedPrecondition` when the body is not JSON
    /// * a status-derived kind for unsuccessful HTTP responses
    fn get_json(&self, request: ApiRequest) -> impl Future<Output = Result<Value>> + Send;
}

/// HTTP client with built-in rate limiting and timeouts.
pub struct Client {
    /// Underlying client. Requests go through [`Client::execute`], which
    /// applies the rate limit.
    http_client: reqwest::Client,

    /// Rate limiter shared by every provider.
    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Standard rate limit interval.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(5);

    /// Maximum allowed API calls per interval.
    ///
    /// Requests beyond this limit will be automatically delayed.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 50;

    /// Duration to keep idle connections alive.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    ///
    /// # Panics
    ///
    /// Panics if rate limit parameters are zero.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .connect_timeout(config.request_timeout)
            .timeout(config.request_timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent);

        // Rate limit own requests as to not DoS the provider infrastructure.
        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .expect("quota time interval is zero")
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .expect("calls per interval is zero"),
            );

        Ok(Self {
            http_client: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Executes a GET request with rate limiting.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, times out or the response has an
    /// unsuccessful status.
    pub async fn execute(&self, request: ApiRequest) -> Result<String> {
        // No need to await with jitter because the level of concurrency is low.
        self.rate_limiter.until_ready().await;

        let ApiRequest {
            origin,
            url,
            headers,
        } = request;
        trace!("{origin}: GET {}", url.path());

        let response = self.http_client.get(url).headers(headers).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status(status, &origin));
        }

        response.text().await.map_err(Into::into)
    }
}

impl Transport for Client {
    async fn get_json(&self, request: ApiRequest) -> Result<Value> {
        let origin = request.origin.clone();
        let body = self.execute(request).await?;
        body_json(&body, &origin)
    }
}

/// Parses a response body. Providers answer some empty results with an
/// empty body, which is read as `null`.
fn body_json(body: &str, origin: &str) -> Result<Value> {
    if body.trim().is_empty() {
        trace!("{origin}: empty body");
        return Ok(Value::Null);
    }
    protocol::json(body, origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn blank_bodies_are_null() {
        assert_eq!(body_json("", "test").unwrap(), Value::Null);
        assert_eq!(body_json(" \r\n", "test").unwrap(), Value::Null);
        assert_eq!(body_json("{}", "test").unwrap(), serde_json::json!({}));
        assert_eq!(
            body_json("<html>", "test").unwrap_err().kind,
            ErrorKind::FailedPrecondition
        );
    }
}
