use bytes::Bytes;
use reqwest::{Client, ClientBuilder, Method};
use std::{collections::HashMap, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{TimeoutPair, TimeoutsConfig},
    errors::{EngineBuildError, TransportError},
    types::TimeoutTier,
};

/// Longest body excerpt kept in [`TransportError::UnexpectedStatus`].
const STATUS_BODY_EXCERPT: usize = 256;

/// A request encoded once and re-sent unchanged on every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub method: Method,
    /// Full target URL, including any encoded query. Doubles as the cache key.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl WireRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::GET, url: url.into(), headers: Vec::new(), body: Bytes::new() }
    }

    #[must_use]
    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self { method: Method::POST, url: url.into(), headers: Vec::new(), body: body.into() }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns `true` if a header with this name is present (case-insensitive).
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}

/// A response as read off the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, Vec<String>>,
    pub body: String,
}

impl RawResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-success status into [`TransportError::UnexpectedStatus`].
    ///
    /// # Errors
    ///
    /// Returns the status error with a truncated body excerpt.
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::UnexpectedStatus(self.status, excerpt(&self.body)))
        }
    }
}

/// Truncates `text` to the status excerpt length on a char boundary.
pub(crate) fn excerpt(text: &str) -> String {
    if text.len() <= STATUS_BODY_EXCERPT {
        return text.to_string();
    }
    let mut end = STATUS_BODY_EXCERPT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}

/// Collects response headers into a multi-valued map.
pub(crate) fn collect_headers(
    headers: &reqwest::header::HeaderMap,
) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::with_capacity(headers.keys_len());
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

/// Shared HTTP client with one connection pool per timeout tier.
///
/// The connect timeout is fixed per pool; the read timeout is applied per request.
#[derive(Debug, Clone)]
pub struct HttpClient {
    short: Client,
    long: Client,
    timeouts: TimeoutsConfig,
}

impl HttpClient {
    /// Creates a client for the given timeout tiers.
    ///
    /// # Errors
    ///
    /// Returns an error if an underlying reqwest client fails to build.
    pub fn new(timeouts: &TimeoutsConfig) -> Result<Self, EngineBuildError> {
        Ok(Self {
            short: Self::build_client(timeouts.short)?,
            long: Self::build_client(timeouts.long)?,
            timeouts: timeouts.clone(),
        })
    }

    fn build_client(pair: TimeoutPair) -> Result<Client, EngineBuildError> {
        ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .connect_timeout(pair.connect())
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                EngineBuildError::HttpClientInit(e.to_string())
            })
    }

    #[must_use]
    pub fn timeouts(&self) -> &TimeoutsConfig {
        &self.timeouts
    }

    /// Read timeout of a tier.
    #[must_use]
    pub fn read_timeout(&self, tier: TimeoutTier) -> Duration {
        self.timeouts.for_tier(tier).read()
    }

    /// Sends `request` once under `tier`, racing it against `cancel`.
    ///
    /// Any HTTP status is returned as a [`RawResponse`]; callers decide what counts
    /// as failure.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Cancelled`] if `cancel` fires first
    /// - [`TransportError::Timeout`] if the connect or read deadline elapses
    /// - [`TransportError::Connectivity`] if the host cannot be reached
    pub async fn execute(
        &self,
        request: &WireRequest,
        tier: TimeoutTier,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        let client = match tier {
            TimeoutTier::Short => &self.short,
            TimeoutTier::Long => &self.long,
        };

        let mut builder = client
            .request(request.method.clone(), &request.url)
            .timeout(self.read_timeout(tier));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            // Bytes::clone() is O(1); every attempt resends the same buffer
            builder = builder.body(request.body.clone());
        }

        let exchange = async {
            let response = builder.send().await.map_err(|e| TransportError::from_reqwest(&e))?;
            let status = response.status().as_u16();
            let headers = collect_headers(response.headers());
            let body = response.text().await.map_err(|e| TransportError::from_reqwest(&e))?;
            Ok::<_, TransportError>(RawResponse { status, headers, body })
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TransportError::Cancelled),
            result = exchange => result,
        };

        match &result {
            Ok(response) => tracing::trace!(
                method = %request.method,
                status = response.status,
                tier = tier.as_str(),
                "http exchange completed"
            ),
            Err(e) => tracing::trace!(
                method = %request.method,
                tier = tier.as_str(),
                error = %e,
                "http exchange failed"
            ),
        }

        result
    }
}
