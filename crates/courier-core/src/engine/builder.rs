//! Builder for constructing an [`InvocationEngine`] with injected collaborators.

use std::sync::Arc;

use super::{InvocationEngine, TransportSet};
use crate::{
    cache::ResultCache,
    config::{AppConfig, TimeoutsConfig},
    errors::EngineBuildError,
    retry::RetryPolicy,
    throttle::HostThrottle,
    transport::{
        FallbackFetcher, HttpClient, HttpGetHandler, HttpPostHandler, LenientFetcher, RpcHandler,
        RpcVersion, TransportHandler,
    },
    types::Protocol,
};

/// Builder for an [`InvocationEngine`].
///
/// Every collaborator can be injected; anything left unset is created from
/// defaults (or from the [`AppConfig`] passed to [`EngineBuilder::from_config`]).
///
/// # Examples
///
/// ```no_run
/// # use courier_core::{config::AppConfig, engine::EngineBuilder};
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AppConfig::load()?;
/// let engine = EngineBuilder::from_config(&config).build()?;
/// # Ok(())
/// # }
/// ```
pub struct EngineBuilder {
    config: AppConfig,
    throttle: Option<Arc<HostThrottle>>,
    cache: Option<ResultCache>,
    retry: Option<RetryPolicy>,
    rpc_v1: Option<Arc<dyn TransportHandler>>,
    rpc_v2: Option<Arc<dyn TransportHandler>>,
    http_get: Option<Arc<dyn TransportHandler>>,
    http_post: Option<Arc<dyn TransportHandler>>,
    fallback: Option<Arc<dyn FallbackFetcher>>,
    fallback_enabled: bool,
}

impl EngineBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&AppConfig::default())
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
            throttle: None,
            cache: None,
            retry: None,
            rpc_v1: None,
            rpc_v2: None,
            http_get: None,
            http_post: None,
            fallback: None,
            fallback_enabled: config.fallback.enabled,
        }
    }

    #[must_use]
    pub fn throttle(mut self, throttle: Arc<HostThrottle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutsConfig) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    /// Replaces the handler for one protocol.
    #[must_use]
    pub fn transport(mut self, protocol: Protocol, handler: Arc<dyn TransportHandler>) -> Self {
        let slot = match protocol {
            Protocol::RpcV1 => &mut self.rpc_v1,
            Protocol::RpcV2 => &mut self.rpc_v2,
            Protocol::HttpGet => &mut self.http_get,
            Protocol::HttpPost => &mut self.http_post,
        };
        *slot = Some(handler);
        self
    }

    /// Sets a custom fallback fetcher and enables the fallback path.
    #[must_use]
    pub fn fallback_fetcher(mut self, fetcher: Arc<dyn FallbackFetcher>) -> Self {
        self.fallback = Some(fetcher);
        self.fallback_enabled = true;
        self
    }

    /// Disables the fallback path; failed GETs go through the retry policy instead.
    #[must_use]
    pub fn disable_fallback(mut self) -> Self {
        self.fallback = None;
        self.fallback_enabled = false;
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an HTTP client fails
    /// to build.
    pub fn build(self) -> Result<InvocationEngine, EngineBuildError> {
        self.config.validate().map_err(EngineBuildError::InvalidConfig)?;

        let mut client = None;
        let timeouts = &self.config.timeouts;
        let transports = TransportSet {
            rpc_v1: handler_or_default(self.rpc_v1, &mut client, timeouts, |c| {
                Arc::new(RpcHandler::new(c, RpcVersion::V1))
            })?,
            rpc_v2: handler_or_default(self.rpc_v2, &mut client, timeouts, |c| {
                Arc::new(RpcHandler::new(c, RpcVersion::V2))
            })?,
            http_get: handler_or_default(self.http_get, &mut client, timeouts, |c| {
                Arc::new(HttpGetHandler::new(c))
            })?,
            http_post: handler_or_default(self.http_post, &mut client, timeouts, |c| {
                Arc::new(HttpPostHandler::new(c))
            })?,
        };

        let fallback = match (self.fallback_enabled, self.fallback) {
            (false, _) => None,
            (true, Some(fetcher)) => Some(fetcher),
            (true, None) => {
                let fetcher: Arc<dyn FallbackFetcher> = Arc::new(LenientFetcher::new(
                    &self.config.fallback,
                    &self.config.timeouts,
                )?);
                Some(fetcher)
            }
        };

        let throttle = self
            .throttle
            .unwrap_or_else(|| Arc::new(HostThrottle::from_config(&self.config.throttle)));
        let cache = self.cache.unwrap_or_else(|| ResultCache::new(&self.config.cache));
        let retry = self.retry.unwrap_or_else(|| RetryPolicy::from_config(&self.config.retry));

        tracing::debug!(
            max_retries = retry.max_retries(),
            fallback = fallback.is_some(),
            cache_disabled = cache.is_disabled(),
            "invocation engine built"
        );

        Ok(InvocationEngine {
            throttle,
            cache,
            transports,
            fallback,
            retry,
        })
    }
}

/// Returns the injected handler, or builds the default one on the shared client.
fn handler_or_default(
    injected: Option<Arc<dyn TransportHandler>>,
    client: &mut Option<Arc<HttpClient>>,
    timeouts: &TimeoutsConfig,
    make: impl FnOnce(Arc<HttpClient>) -> Arc<dyn TransportHandler>,
) -> Result<Arc<dyn TransportHandler>, EngineBuildError> {
    if let Some(handler) = injected {
        return Ok(handler);
    }

    let shared = match client.as_ref() {
        Some(shared) => shared.clone(),
        None => {
            let created = Arc::new(HttpClient::new(timeouts)?);
            *client = Some(created.clone());
            created
        }
    };
    Ok(make(shared))
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
