use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::http_client::{collect_headers, WireRequest};
use crate::{
    config::{FallbackConfig, TimeoutPair, TimeoutsConfig},
    document,
    errors::{EngineBuildError, TransportError},
    types::{InvocationResult, TimeoutTier},
};

/// Best-effort second chance for a failed GET.
#[async_trait]
pub trait FallbackFetcher: Send + Sync + std::fmt::Debug {
    /// Fetches `request.url` once with the request's headers, bounded by `tier`.
    async fn fetch(
        &self,
        request: &WireRequest,
        tier: TimeoutTier,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult, TransportError>;
}

/// Browser-like fetcher that tolerates what a strict client rejects.
///
/// Follows redirects, accepts any certificate, ignores error status codes,
/// decodes the body lossily and drops `<script>` and `<style>` blocks from the
/// normalized payload. The verbatim payload keeps the body as received.
#[derive(Debug, Clone)]
pub struct LenientFetcher {
    short: Client,
    long: Client,
    timeouts: TimeoutsConfig,
}

impl LenientFetcher {
    /// # Errors
    ///
    /// Returns an error if an underlying reqwest client fails to build.
    pub fn new(
        config: &FallbackConfig,
        timeouts: &TimeoutsConfig,
    ) -> Result<Self, EngineBuildError> {
        Ok(Self {
            short: Self::build_client(config, timeouts.short)?,
            long: Self::build_client(config, timeouts.long)?,
            timeouts: timeouts.clone(),
        })
    }

    fn build_client(
        config: &FallbackConfig,
        pair: TimeoutPair,
    ) -> Result<Client, EngineBuildError> {
        ClientBuilder::new()
            .use_rustls_tls()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::limited(20))
            .user_agent(config.user_agent.as_str())
            .connect_timeout(pair.connect())
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build fallback http client");
                EngineBuildError::HttpClientInit(e.to_string())
            })
    }

    /// Read timeout of a tier.
    #[must_use]
    pub fn read_timeout(&self, tier: TimeoutTier) -> Duration {
        self.timeouts.for_tier(tier).read()
    }
}

#[async_trait]
impl FallbackFetcher for LenientFetcher {
    async fn fetch(
        &self,
        request: &WireRequest,
        tier: TimeoutTier,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult, TransportError> {
        let client = match tier {
            TimeoutTier::Short => &self.short,
            TimeoutTier::Long => &self.long,
        };

        let mut builder = client.get(&request.url).timeout(self.read_timeout(tier));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let exchange = async {
            let response = builder.send().await.map_err(|e| TransportError::from_reqwest(&e))?;
            let status = response.status().as_u16();
            let headers = collect_headers(response.headers());
            let bytes = response.bytes().await.map_err(|e| TransportError::from_reqwest(&e))?;
            Ok::<_, TransportError>((status, headers, bytes))
        };

        let (status, headers, bytes) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = exchange => result?,
        };

        if status >= 400 {
            tracing::debug!(status, "fallback fetch returned error status, keeping body");
        }

        let raw = String::from_utf8_lossy(&bytes).into_owned();
        Ok(InvocationResult {
            payload: document::normalize(&strip_active_content(&raw)),
            verbatim_payload: raw,
            response_headers: headers,
            served_from_cache: false,
        })
    }
}

/// Removes `<script>` and `<style>` elements, tags included.
///
/// An unterminated element is dropped through the end of the text.
#[must_use]
pub fn strip_active_content(html: &str) -> String {
    let mut output = String::with_capacity(html.len());
    let lower = html.to_ascii_lowercase();
    let mut cursor = 0;

    while cursor < html.len() {
        let next = ["script", "style"]
            .iter()
            .filter_map(|tag| find_open_tag(&lower, cursor, tag).map(|pos| (pos, *tag)))
            .min_by_key(|(pos, _)| *pos);

        let Some((start, tag)) = next else {
            output.push_str(&html[cursor..]);
            break;
        };

        output.push_str(&html[cursor..start]);
        let closing = format!("</{tag}");
        cursor = match lower[start..].find(&closing) {
            Some(offset) => {
                let close_start = start + offset;
                lower[close_start..].find('>').map_or(html.len(), |end| close_start + end + 1)
            }
            None => html.len(),
        };
    }

    output
}

/// Finds `<tag` followed by whitespace, `>` or `/` at or after `from`.
fn find_open_tag(lower: &str, from: usize, tag: &str) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut search = from;
    while let Some(offset) = lower[search..].find(&needle) {
        let start = search + offset;
        let after = lower.as_bytes().get(start + needle.len()).copied();
        if matches!(after, None | Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r')) {
            return Some(start);
        }
        search = start + needle.len();
    }
    None
}
