use thiserror::Error;

/// Classification of per-attempt transport failures.
///
/// Each class maps to one retry strategy:
/// - Connectivity failures back off with jitter before retrying
/// - Protocol and timeout failures retry immediately
/// - Invalid requests, cancellation and exhausted fallbacks are never retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Socket, bind or connect failure. The remote side was never reached.
    Connectivity,
    /// Malformed envelope, fault response or unexpected status.
    Protocol,
    /// Connect or read deadline exceeded.
    Timeout,
    /// The request itself cannot be sent (bad URL, unsupported body shape).
    InvalidRequest,
    /// The caller abandoned the invocation.
    Cancelled,
    /// Both the primary transport and the fallback fetcher failed.
    FallbackExhausted,
}

impl ErrorClass {
    /// Returns `true` if another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity | Self::Protocol | Self::Timeout)
    }

    /// Returns a static string representation for log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Protocol => "protocol",
            Self::Timeout => "timeout",
            Self::InvalidRequest => "invalid_request",
            Self::Cancelled => "cancelled",
            Self::FallbackExhausted => "fallback_exhausted",
        }
    }
}

/// Errors raised by a single transport attempt.
///
/// These never reach callers of [`InvocationEngine::invoke`] directly; the retry
/// policy classifies them and the engine surfaces [`InvocationError::Fatal`]
/// once the attempt budget is spent.
///
/// [`InvocationEngine::invoke`]: crate::engine::InvocationEngine::invoke
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// Could not open or bind a connection to the remote host.
    #[error("Connection failed: {0}")]
    Connectivity(String),

    /// Connect or read timeout elapsed.
    #[error("Request timeout")]
    Timeout,

    /// The remote answered with a non-success HTTP status.
    ///
    /// First field is the status code, second a truncated body excerpt.
    #[error("Unexpected HTTP status {0}: {1}")]
    UnexpectedStatus(u16, String),

    /// The response could not be interpreted as the expected envelope.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The remote returned an RPC fault envelope.
    #[error("RPC fault: {0}")]
    Fault(String),

    /// Any other protocol-level failure while exchanging bytes.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The request cannot be dispatched as given.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The invocation was cancelled through its token.
    #[error("Invocation cancelled")]
    Cancelled,

    /// The primary GET failed and the single fallback fetch failed as well.
    #[error("Fallback fetch failed: {fallback} (primary: {primary})")]
    Fallback {
        /// Error from the primary transport.
        primary: Box<TransportError>,
        /// Error from the fallback fetcher.
        fallback: Box<TransportError>,
    },
}

impl TransportError {
    /// Classifies this error for retry decisions.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Connectivity(_) => ErrorClass::Connectivity,
            Self::Timeout => ErrorClass::Timeout,
            Self::UnexpectedStatus(..) |
            Self::MalformedEnvelope(_) |
            Self::Fault(_) |
            Self::Protocol(_) => ErrorClass::Protocol,
            Self::InvalidRequest(_) => ErrorClass::InvalidRequest,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Fallback { .. } => ErrorClass::FallbackExhausted,
        }
    }

    /// Returns `true` if this error is transient and the request may be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.class().is_retryable()
    }

    /// Maps a reqwest failure onto the transport taxonomy.
    ///
    /// Messages are reduced to a category so URLs and addresses embedded in the
    /// underlying error do not leak into logs or caller-facing errors.
    #[must_use]
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connectivity("connection refused or unreachable".to_string())
        } else if error.is_builder() {
            Self::InvalidRequest("request could not be built".to_string())
        } else if error.is_body() {
            Self::Protocol("response body error".to_string())
        } else if error.is_decode() {
            Self::Protocol("response decode error".to_string())
        } else if error.is_redirect() {
            Self::Protocol("too many redirects".to_string())
        } else if error.is_request() {
            Self::Connectivity("request failed".to_string())
        } else {
            Self::Protocol("network error".to_string())
        }
    }
}

/// A wait was abandoned because its cancellation token fired.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

impl From<Cancelled> for TransportError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Failure surfaced to callers of the engine.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum InvocationError {
    /// Retries exhausted or a non-retryable condition was hit.
    ///
    /// Carries the final attempt's error and the request payload for diagnostics.
    #[error("Invocation to {endpoint} failed after {attempts} attempt(s): {source}")]
    Fatal {
        endpoint: String,
        attempts: u32,
        payload: String,
        #[source]
        source: TransportError,
    },
}

impl InvocationError {
    /// Returns the underlying transport error of the final attempt.
    #[must_use]
    pub fn cause(&self) -> &TransportError {
        match self {
            Self::Fatal { source, .. } => source,
        }
    }

    /// Returns the number of transport attempts made before giving up.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fatal { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Fatal { endpoint, .. } => endpoint,
        }
    }

    /// Display form of the request body that failed.
    #[must_use]
    pub fn payload(&self) -> &str {
        match self {
            Self::Fatal { payload, .. } => payload,
        }
    }
}

/// Errors that can occur while assembling an engine or endpoint.
#[derive(Error, Debug)]
pub enum EngineBuildError {
    /// HTTP client initialization failed.
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(String),

    /// The endpoint address is not an absolute http(s) URL.
    #[error("Invalid endpoint address '{0}': {1}")]
    InvalidAddress(String, String),

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
