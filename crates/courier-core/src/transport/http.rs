use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{
    http_client::{HttpClient, RawResponse, WireRequest},
    TransportHandler,
};
use crate::{
    document,
    errors::TransportError,
    types::{EndpointDescriptor, InvocationRequest, InvocationResult, Payload, TimeoutTier},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Builds the GET target: the address plus the encoded query, when there is one.
///
/// A text body is taken as a pre-encoded query string. An object body is encoded
/// with form rules; array members repeat their key.
///
/// # Errors
///
/// Returns [`TransportError::InvalidRequest`] for document bodies that are not objects.
pub fn build_get_url(address: &str, body: &Payload) -> Result<String, TransportError> {
    let query = match body {
        Payload::Empty => String::new(),
        Payload::Text(text) => text.trim().to_string(),
        Payload::Document(Value::Null) => String::new(),
        Payload::Document(Value::Object(map)) => {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in map {
                match value {
                    Value::Array(items) => {
                        for item in items {
                            serializer.append_pair(key, &query_value(item));
                        }
                    }
                    other => {
                        serializer.append_pair(key, &query_value(other));
                    }
                }
            }
            serializer.finish()
        }
        Payload::Document(_) => {
            return Err(TransportError::InvalidRequest(
                "GET parameters must be an object or a pre-encoded query".to_string(),
            ));
        }
    };

    if query.is_empty() {
        return Ok(address.to_string());
    }

    let separator = if address.ends_with('?') || address.ends_with('&') {
        ""
    } else if address.contains('?') {
        "&"
    } else {
        "?"
    };
    Ok(format!("{address}{separator}{query}"))
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn normalized_result(response: RawResponse) -> InvocationResult {
    InvocationResult {
        payload: document::normalize(&response.body),
        verbatim_payload: response.body,
        response_headers: response.headers,
        served_from_cache: false,
    }
}

/// Plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpGetHandler {
    client: Arc<HttpClient>,
}

impl HttpGetHandler {
    #[must_use]
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransportHandler for HttpGetHandler {
    fn encode(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InvocationRequest,
    ) -> Result<WireRequest, TransportError> {
        let url = build_get_url(endpoint.address(), &request.body)?;
        let mut wire = WireRequest::get(url);
        for header in &request.headers {
            wire = wire.with_header(&header.name, &header.value);
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
        let response = self.client.execute(request, tier, cancel).await?.error_for_status()?;
        Ok(normalized_result(response))
    }
}

/// Plain HTTP POST.
///
/// Document bodies go out as JSON, text bodies as a trimmed form body.
#[derive(Debug, Clone)]
pub struct HttpPostHandler {
    client: Arc<HttpClient>,
}

impl HttpPostHandler {
    #[must_use]
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransportHandler for HttpPostHandler {
    fn encode(
        &self,
        endpoint: &EndpointDescriptor,
        request: &InvocationRequest,
    ) -> Result<WireRequest, TransportError> {
        let (content_type, body) = match &request.body {
            Payload::Document(value) => (JSON_CONTENT_TYPE, value.to_string()),
            Payload::Text(text) => (FORM_CONTENT_TYPE, text.trim().to_string()),
            Payload::Empty => (FORM_CONTENT_TYPE, String::new()),
        };

        let mut wire = WireRequest::post(endpoint.address(), body);
        for header in &request.headers {
            wire = wire.with_header(&header.name, &header.value);
        }
        if !wire.has_header("content-type") {
            wire = wire.with_header("content-type", content_type);
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
        let response = self.client.execute(request, tier, cancel).await?.error_for_status()?;
        Ok(normalized_result(response))
    }
}
