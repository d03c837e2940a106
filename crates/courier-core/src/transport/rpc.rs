//! Structured RPC over POST.
//!
//! Requests travel in a JSON envelope:
//!
//! ```json
//! {
//!   "envelope": "1.1",
//!   "header": [{"action": "GetQuote"}, {"to": "http://host/svc"}],
//!   "body": {..}
//! }
//! ```
//!
//! Version 1.1 is sent as `application/json` with an `x-rpc-action` header;
//! version 1.2 as `application/rpc+json`. Responses are unwrapped to their
//! `body`; a `fault` member in the body is a protocol error.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{
    http_client::{excerpt, HttpClient, RawResponse, WireRequest},
    TransportHandler,
};
use crate::{
    document,
    errors::TransportError,
    types::{EndpointDescriptor, Header, InvocationRequest, InvocationResult, Payload, TimeoutTier},
};

/// Addressing header naming the endpoint.
pub const TO_HEADER: &str = "to";
/// Carried header whose value becomes the V1 action transport header.
pub const ACTION_HEADER: &str = "action";

/// Envelope version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcVersion {
    V1,
    V2,
}

impl RpcVersion {
    /// Value of the `envelope` member.
    #[must_use]
    pub fn envelope_tag(&self) -> &'static str {
        match self {
            Self::V1 => "1.1",
            Self::V2 => "1.2",
        }
    }

    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::V1 => "application/json",
            Self::V2 => "application/rpc+json",
        }
    }
}

/// RPC handler for one envelope version.
#[derive(Debug, Clone)]
pub struct RpcHandler {
    client: Arc<HttpClient>,
    version: RpcVersion,
}

impl RpcHandler {
    #[must_use]
    pub fn new(client: Arc<HttpClient>, version: RpcVersion) -> Self {
        Self { client, version }
    }

    #[must_use]
    pub fn version(&self) -> RpcVersion {
        self.version
    }

    /// Builds the request envelope.
    ///
    /// A body that already is a complete envelope of this version is kept as-is,
    /// with the carried headers and the `to` header appended.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] for text bodies that are not documents.
    pub fn build_envelope(
        &self,
        address: &str,
        body: &Payload,
        headers: &[Header],
    ) -> Result<Value, TransportError> {
        let payload = match body {
            Payload::Document(value) => value.clone(),
            Payload::Text(text) => document::parse_document(text).ok_or_else(|| {
                TransportError::InvalidRequest("RPC body must be a JSON document".to_string())
            })?,
            Payload::Empty => Value::Object(Map::new()),
        };

        let mut envelope = if self.is_envelope(&payload) {
            payload
        } else {
            let mut map = Map::with_capacity(3);
            map.insert("envelope".to_string(), Value::String(self.version.envelope_tag().into()));
            map.insert("header".to_string(), Value::Array(Vec::new()));
            map.insert("body".to_string(), payload);
            Value::Object(map)
        };

        let Some(map) = envelope.as_object_mut() else {
            return Err(TransportError::InvalidRequest("envelope must be an object".to_string()));
        };
        let header_section = map.entry("header").or_insert_with(|| Value::Array(Vec::new()));
        if !header_section.is_array() {
            *header_section = Value::Array(vec![header_section.take()]);
        }
        if let Value::Array(section) = header_section {
            section.extend(headers.iter().map(|h| single_member(&h.name, &h.value)));
            section.push(single_member(TO_HEADER, address));
        }

        Ok(envelope)
    }

    fn is_envelope(&self, value: &Value) -> bool {
        value.get("envelope").and_then(Value::as_str) == Some(self.version.envelope_tag())
            && value.get("body").is_some()
    }

    /// Unwraps a response envelope into a result.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Fault`] when the body carries a `fault` member
    /// - [`TransportError::MalformedEnvelope`] when the response is not an envelope
    /// - [`TransportError::UnexpectedStatus`] for error statuses without a fault
    pub fn unwrap_response(response: RawResponse) -> Result<InvocationResult, TransportError> {
        let parsed = serde_json::from_str::<Value>(response.body.trim()).ok();
        let body = parsed.as_ref().and_then(|value| value.get("body"));

        if let Some(fault) = body.and_then(|b| b.get("fault")) {
            return Err(TransportError::Fault(describe_fault(fault)));
        }

        if !response.is_success() {
            return Err(TransportError::UnexpectedStatus(response.status, excerpt(&response.body)));
        }

        let payload = match body {
            Some(value @ (Value::Object(_) | Value::Array(_))) => value.clone(),
            Some(Value::String(text)) => document::normalize(text),
            Some(Value::Null) => document::wrap(""),
            Some(other) => document::wrap(&other.to_string()),
            None => {
                return Err(TransportError::MalformedEnvelope(
                    "response is not an RPC envelope".to_string(),
                ));
            }
        };

        Ok(InvocationResult {
            payload,
            verbatim_payload: response.body,
            response_headers: response.headers,
            served_from_cache: false,
        })
    }
}

fn single_member(name: &str, value: &str) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(name.to_string(), Value::String(value.to_string()));
    Value::Object(map)
}

fn describe_fault(fault: &Value) -> String {
    match fault {
        Value::String(text) => text.clone(),
        Value::Object(map) => match map.get("message").or_else(|| map.get("reason")) {
            Some(Value::String(text)) => text.clone(),
            _ => fault.to_string(),
        },
        other => other.to_string(),
    }
}

#[async_trait]
impl TransportHandler for RpcHandler {
    fn encode(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InvocationRequest,
    ) -> Result<WireRequest, TransportError> {
        let envelope = self.build_envelope(endpoint.address(), &request.body, &request.headers)?;
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| TransportError::InvalidRequest(format!("envelope serialization: {e}")))?;

        let mut wire = WireRequest::post(endpoint.address(), body)
            .with_header("content-type", self.version.content_type());

        if self.version == RpcVersion::V1 {
            let action = request
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(ACTION_HEADER))
                .map(|h| h.value.clone())
                .unwrap_or_default();
            wire = wire.with_header("x-rpc-action", action);
        }

        Ok(wire)
    }

    async fn send(
        &self,
        _endpoint: &EndpointDescriptor,
        request: &WireRequest,
        tier: TimeoutTier,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult, TransportError> {
        let response = self.client.execute(request, tier, cancel).await?;
        Self::unwrap_response(response)
    }
}
