//! The invocation engine.
//!
//! # Flow
//!
//! ```text
//! invoke(endpoint, request)
//!   -> pick handler (RPC to a plain-HTTP endpoint goes out as POST)
//!   -> encode once
//!   -> GET only: cache lookup, then per-host throttle
//!   -> send under the retry policy (GET with fallback: primary once, fallback once)
//!   -> GET only: asynchronous cache store
//! ```
//!
//! POST and RPC never consult the cache and never wait on the throttle.

pub mod builder;
pub mod resolver;

pub use builder::EngineBuilder;
pub use resolver::{EndpointResolver, StaticResolver};

use std::{future::Future, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cache::ResultCache,
    document,
    errors::{ErrorClass, InvocationError, TransportError},
    retry::{RetryDecision, RetryPolicy},
    throttle::HostThrottle,
    transport::{FallbackFetcher, TransportHandler, WireRequest},
    types::{EndpointDescriptor, InvocationRequest, InvocationResult, Protocol, ProtocolHint},
};

/// One handler per wire encoding.
#[derive(Debug, Clone)]
pub struct TransportSet {
    pub rpc_v1: Arc<dyn TransportHandler>,
    pub rpc_v2: Arc<dyn TransportHandler>,
    pub http_get: Arc<dyn TransportHandler>,
    pub http_post: Arc<dyn TransportHandler>,
}

impl TransportSet {
    #[must_use]
    pub fn handler(&self, protocol: Protocol) -> &Arc<dyn TransportHandler> {
        match protocol {
            Protocol::RpcV1 => &self.rpc_v1,
            Protocol::RpcV2 => &self.rpc_v2,
            Protocol::HttpGet => &self.http_get,
            Protocol::HttpPost => &self.http_post,
        }
    }
}

/// Sends requests to remote endpoints with throttling, caching and retries.
///
/// Cheap to share behind an `Arc`; all state lives in the injected throttle
/// and cache.
#[derive(Debug)]
pub struct InvocationEngine {
    throttle: Arc<HostThrottle>,
    cache: ResultCache,
    transports: TransportSet,
    fallback: Option<Arc<dyn FallbackFetcher>>,
    retry: RetryPolicy,
}

impl InvocationEngine {
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    #[must_use]
    pub fn throttle(&self) -> &Arc<HostThrottle> {
        &self.throttle
    }

    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sends `request` to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Fatal`] when the request cannot be encoded, the
    /// retry budget is spent, a non-retryable error occurs, the fallback fetch
    /// fails, or `cancel` fires.
    pub async fn invoke(
        &self,
        endpoint: &EndpointDescriptor,
        request: InvocationRequest,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult, InvocationError> {
        let protocol = Self::effective_protocol(endpoint, request.protocol);
        let handler = self.transports.handler(protocol);

        let wire = handler
            .encode(endpoint, &request)
            .map_err(|e| Self::fatal(endpoint.address(), 0, &request, e))?;

        debug!(
            endpoint = %endpoint.address(),
            protocol = %protocol,
            tier = request.tier().as_str(),
            "invoking endpoint"
        );

        if protocol == Protocol::HttpGet {
            return self.invoke_get(endpoint, &request, handler.as_ref(), wire, cancel).await;
        }

        let tier = request.tier();
        let wire = &wire;
        self.with_retry(endpoint.address(), &request, cancel, move || {
            handler.send(endpoint, wire, tier, cancel)
        })
        .await
    }

    /// Resolves `reference` and sends `request` to the resulting endpoint.
    ///
    /// Resolution failures go through the retry policy like transport failures.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Fatal`] when resolution or the invocation fails.
    pub async fn invoke_resolved(
        &self,
        resolver: &dyn EndpointResolver,
        reference: &str,
        request: InvocationRequest,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult, InvocationError> {
        let endpoint = self
            .with_retry(reference, &request, cancel, move || resolver.resolve(reference))
            .await?;
        self.invoke(&endpoint, request, cancel).await
    }

    /// RPC aimed at an endpoint without an RPC binding goes out as a plain POST.
    fn effective_protocol(endpoint: &EndpointDescriptor, requested: Protocol) -> Protocol {
        if requested.is_rpc() && endpoint.protocol_hint() == ProtocolHint::PlainHttp {
            debug!(endpoint = %endpoint.address(), "endpoint has no RPC binding, sending as POST");
            Protocol::HttpPost
        } else {
            requested
        }
    }

    async fn invoke_get(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InvocationRequest,
        handler: &dyn TransportHandler,
        wire: WireRequest,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult, InvocationError> {
        let cacheable = request.use_cache && !self.cache.is_disabled();

        if cacheable {
            if let Some(record) = self.cache.lookup(&wire.url).await {
                info!(url = %wire.url, "serving GET from cache");
                return Ok(InvocationResult {
                    payload: document::normalize(&record.value),
                    verbatim_payload: record.value,
                    response_headers: std::collections::HashMap::new(),
                    served_from_cache: true,
                });
            }
        }

        self.throttle
            .acquire(endpoint.host(), cancel)
            .await
            .map_err(|c| Self::fatal(endpoint.address(), 0, request, c.into()))?;

        let tier = request.tier();
        let result = match &self.fallback {
            Some(fallback) => {
                self.get_with_fallback(endpoint, request, handler, &wire, fallback.as_ref(), cancel)
                    .await?
            }
            None => {
                let wire = &wire;
                self.with_retry(endpoint.address(), request, cancel, move || {
                    handler.send(endpoint, wire, tier, cancel)
                })
                .await?
            }
        };

        if cacheable {
            self.cache.store_async(wire.url, result.verbatim_payload.clone());
        }

        Ok(result)
    }

    /// One primary attempt, then at most one fallback fetch.
    async fn get_with_fallback(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InvocationRequest,
        handler: &dyn TransportHandler,
        wire: &WireRequest,
        fallback: &dyn FallbackFetcher,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult, InvocationError> {
        let tier = request.tier();

        let primary = match handler.send(endpoint, wire, tier, cancel).await {
            Ok(result) => return Ok(result),
            Err(e @ (TransportError::Cancelled | TransportError::InvalidRequest(_))) => {
                return Err(Self::fatal(endpoint.address(), 1, request, e));
            }
            Err(e) => e,
        };

        info!(
            url = %wire.url,
            error = %primary,
            class = primary.class().as_str(),
            "primary GET failed, trying fallback fetcher"
        );

        match fallback.fetch(wire, tier, cancel).await {
            Ok(result) => {
                info!(url = %wire.url, "fallback fetcher succeeded");
                Ok(result)
            }
            Err(TransportError::Cancelled) => {
                Err(Self::fatal(endpoint.address(), 2, request, TransportError::Cancelled))
            }
            Err(fallback_error) => {
                warn!(url = %wire.url, error = %fallback_error, "fallback fetcher failed");
                let source = TransportError::Fallback {
                    primary: Box::new(primary),
                    fallback: Box::new(fallback_error),
                };
                Err(Self::fatal(endpoint.address(), 2, request, source))
            }
        }
    }

    /// Runs `attempt` until it succeeds or the retry policy gives up.
    async fn with_retry<T, F, Fut>(
        &self,
        target: &str,
        request: &InvocationRequest,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> Result<T, InvocationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut state = self.retry.start();

        loop {
            debug!(endpoint = %target, attempt = state.attempts_made + 1, "sending attempt");

            let error = match attempt().await {
                Ok(value) => {
                    if state.attempts_made > 0 {
                        info!(
                            endpoint = %target,
                            attempts = state.attempts_made + 1,
                            "succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let class = error.class();
            let message = error.to_string();
            match self.retry.next(&mut state, error) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        endpoint = %target,
                        attempt = state.attempts_made,
                        remaining = state.attempts_remaining,
                        class = class.as_str(),
                        error = %message,
                        delay_ms = delay.map_or(0, |d| d.as_millis()),
                        "attempt failed, retrying"
                    );
                    if let Some(delay) = delay {
                        if !Self::backoff(delay, cancel).await {
                            return Err(Self::fatal(
                                target,
                                state.attempts_made,
                                request,
                                TransportError::Cancelled,
                            ));
                        }
                    }
                }
                RetryDecision::Fail => {
                    let source = state
                        .take_last_error()
                        .unwrap_or_else(|| TransportError::Protocol(message.clone()));
                    if class != ErrorClass::Cancelled {
                        warn!(
                            endpoint = %target,
                            attempts = state.attempts_made,
                            class = class.as_str(),
                            error = %message,
                            "invocation failed"
                        );
                    }
                    return Err(Self::fatal(target, state.attempts_made, request, source));
                }
            }
        }
    }

    /// Sleeps for `delay` unless `cancel` fires first. Returns `false` when cancelled.
    async fn backoff(delay: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    fn fatal(
        target: &str,
        attempts: u32,
        request: &InvocationRequest,
        source: TransportError,
    ) -> InvocationError {
        InvocationError::Fatal {
            endpoint: target.to_string(),
            attempts,
            payload: request.body.to_display_string(),
            source,
        }
    }
}
