use async_trait::async_trait;

use crate::{
    errors::TransportError,
    types::{EndpointDescriptor, ProtocolHint},
};

/// Turns an endpoint reference into a resolved descriptor.
///
/// Implementations that fetch metadata over the network should report
/// unreachable metadata as [`TransportError::Connectivity`] so resolution is
/// retried like any other connect failure.
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<EndpointDescriptor, TransportError>;
}

/// Resolves bare addresses with a fixed protocol hint.
#[derive(Debug, Clone, Copy)]
pub struct StaticResolver {
    hint: ProtocolHint,
}

impl StaticResolver {
    #[must_use]
    pub fn new(hint: ProtocolHint) -> Self {
        Self { hint }
    }
}

#[async_trait]
impl EndpointResolver for StaticResolver {
    async fn resolve(&self, reference: &str) -> Result<EndpointDescriptor, TransportError> {
        EndpointDescriptor::new(reference, self.hint)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }
}
