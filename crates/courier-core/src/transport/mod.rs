//! Wire encodings.
//!
//! Each [`TransportHandler`] turns an [`InvocationRequest`] into a
//! [`WireRequest`] once, then sends that same encoded request on every
//! attempt. Handlers never retry, throttle or cache; the engine does.

pub mod fallback;
pub mod http;
pub mod http_client;
pub mod rpc;

pub use fallback::{FallbackFetcher, LenientFetcher};
pub use http::{build_get_url, HttpGetHandler, HttpPostHandler};
pub use http_client::{HttpClient, RawResponse, WireRequest};
pub use rpc::{RpcHandler, RpcVersion};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::TransportError,
    types::{EndpointDescriptor, InvocationRequest, InvocationResult, TimeoutTier},
};

/// One wire encoding.
#[async_trait]
pub trait TransportHandler: Send + Sync + std::fmt::Debug {
    /// Encodes `request` for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] when the body cannot be encoded.
    fn encode(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InvocationRequest,
    ) -> Result<WireRequest, TransportError>;

    /// Performs one attempt.
    async fn send(
        &self,
        endpoint: &EndpointDescriptor,
        request: &WireRequest,
        tier: TimeoutTier,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult, TransportError>;
}
