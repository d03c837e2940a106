use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

use crate::errors::{EngineBuildError, TransportError};

/// Wire encoding used for a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Structured RPC over POST, envelope version 1.1.
    RpcV1,
    /// Structured RPC over POST, envelope version 1.2.
    RpcV2,
    /// Plain HTTP GET with an encoded query string.
    HttpGet,
    /// Plain HTTP POST of a form or JSON body.
    HttpPost,
}

impl Protocol {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RpcV1 => "rpc_v1",
            Self::RpcV2 => "rpc_v2",
            Self::HttpGet => "http_get",
            Self::HttpPost => "http_post",
        }
    }

    /// Returns `true` for the structured RPC encodings.
    #[must_use]
    pub fn is_rpc(&self) -> bool {
        matches!(self, Self::RpcV1 | Self::RpcV2)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the endpoint advertises about the encodings it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolHint {
    RpcV1,
    RpcV2,
    /// No RPC binding; only plain HTTP is available.
    PlainHttp,
}

/// A resolved remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    address: Url,
    protocol_hint: ProtocolHint,
}

impl EndpointDescriptor {
    /// Creates a descriptor, validating that `address` is an absolute http(s) URL
    /// with a host.
    ///
    /// # Errors
    ///
    /// Returns [`EngineBuildError::InvalidAddress`] when the address does not parse,
    /// uses another scheme, or has no host.
    pub fn new(address: &str, protocol_hint: ProtocolHint) -> Result<Self, EngineBuildError> {
        let url = Url::parse(address.trim())
            .map_err(|e| EngineBuildError::InvalidAddress(address.to_string(), e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(EngineBuildError::InvalidAddress(
                address.to_string(),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(EngineBuildError::InvalidAddress(
                address.to_string(),
                "missing host".to_string(),
            ));
        }

        Ok(Self { address: url, protocol_hint })
    }

    #[must_use]
    pub fn address(&self) -> &str {
        self.address.as_str()
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.address
    }

    #[must_use]
    pub fn protocol_hint(&self) -> ProtocolHint {
        self.protocol_hint
    }

    /// Host portion of the address, used as the throttle key.
    #[must_use]
    pub fn host(&self) -> &str {
        self.address.host_str().unwrap_or_default()
    }
}

/// Opaque request body.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// A structured document.
    Document(Value),
    /// A raw string, e.g. a pre-encoded query or form body.
    Text(String),
    #[default]
    Empty,
}

impl Payload {
    #[must_use]
    pub fn document(value: Value) -> Self {
        Self::Document(value)
    }

    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Returns `true` when there is nothing to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::Document(Value::Null) => true,
            Self::Document(_) => false,
        }
    }

    /// Renders the payload for diagnostics and error reports.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Document(value) => value.to_string(),
            Self::Text(text) => text.clone(),
            Self::Empty => String::new(),
        }
    }
}

/// One name/value header pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }

    /// Parses a raw `"Name: value"` line.
    ///
    /// Splits at the first colon and trims both halves. Returns `None` for lines
    /// without a colon or with an empty name.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let (name, value) = line.split_once(':')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, value.trim()))
    }
}

/// A single call's inputs. Cloned per retry, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub protocol: Protocol,
    pub body: Payload,
    /// Envelope headers for RPC, transport headers for plain HTTP.
    pub headers: Vec<Header>,
    pub use_cache: bool,
    /// Selects the short timeout tier when set, the long tier otherwise.
    pub use_short_timeout: bool,
}

impl InvocationRequest {
    #[must_use]
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            body: Payload::Empty,
            headers: Vec::new(),
            use_cache: false,
            use_short_timeout: true,
        }
    }

    #[must_use]
    pub fn get() -> Self {
        Self::new(Protocol::HttpGet)
    }

    #[must_use]
    pub fn post() -> Self {
        Self::new(Protocol::HttpPost)
    }

    #[must_use]
    pub fn body(mut self, body: Payload) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Appends headers from raw `"Name: value"` lines, skipping malformed ones.
    #[must_use]
    pub fn raw_headers<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.headers.extend(lines.into_iter().filter_map(|line| Header::parse(line.as_ref())));
        self
    }

    #[must_use]
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    #[must_use]
    pub fn use_short_timeout(mut self, use_short_timeout: bool) -> Self {
        self.use_short_timeout = use_short_timeout;
        self
    }

    #[must_use]
    pub fn tier(&self) -> TimeoutTier {
        if self.use_short_timeout {
            TimeoutTier::Short
        } else {
            TimeoutTier::Long
        }
    }
}

/// One of the two named connect/read timeout pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutTier {
    Short,
    Long,
}

impl TimeoutTier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
        }
    }
}

/// Normalized outcome of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    /// Always a well-formed document.
    pub payload: Value,
    /// Response text exactly as received.
    pub verbatim_payload: String,
    pub response_headers: HashMap<String, Vec<String>>,
    /// `true` when the result came from the cache and no network I/O happened.
    pub served_from_cache: bool,
}

impl InvocationResult {
    /// Returns the first member of the payload's `body` section, or the whole
    /// payload when it has none.
    #[must_use]
    pub fn response_body(&self) -> &Value {
        match self.payload.get("body") {
            Some(Value::Array(items)) => items.first().unwrap_or(&self.payload),
            Some(Value::Object(map)) => map.values().next().unwrap_or(&self.payload),
            Some(other) => other,
            None => &self.payload,
        }
    }

    /// All values of one response header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> &[String] {
        self.response_headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map_or(&[], |(_, values)| values.as_slice())
    }

    /// Deserializes the payload into a caller type.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::MalformedEnvelope`] when the payload does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| TransportError::MalformedEnvelope(format!("payload does not decode: {e}")))
    }
}
