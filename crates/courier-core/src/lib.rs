//! # Courier Core
//!
//! Resilient invocation of remote endpoints over four wire encodings: two
//! RPC envelope versions, plain HTTP GET and plain HTTP POST.
//!
//! - **[`engine`]**: The [`InvocationEngine`] entry point. Picks a transport,
//!   applies caching and throttling to GETs, and drives the retry policy.
//!
//! - **[`throttle`]**: Per-host minimum spacing between consecutive GETs.
//!
//! - **[`cache`]**: Time-windowed result cache keyed by the full GET URL, with
//!   asynchronous writes and an optional durable backing store.
//!
//! - **[`retry`]**: Error classification and backoff with jitter.
//!
//! - **[`transport`]**: RPC, GET and POST handlers plus the lenient fallback
//!   fetcher used when a GET fails.
//!
//! - **[`config`]**: Layered configuration (defaults, TOML file, environment).
//!
//! ## Invocation Flow
//!
//! ```text
//! invoke(endpoint, request)
//!       │
//!       ▼
//! ┌──────────────┐
//! │ Pick handler │  RPC to a plain-HTTP endpoint ──► POST
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │    Encode    │ ─── Invalid ──► Fatal (0 attempts)
//! └──────┬───────┘
//!        │
//!   GET? ├──────────────────────────────┐
//!        │                              ▼
//!        │                     ┌─────────────────┐
//!        │                     │   Cache lookup  │ ─── Hit ──► Cached result
//!        │                     └────────┬────────┘
//!        │                              ▼
//!        │                     ┌─────────────────┐
//!        │                     │  Host throttle  │
//!        │                     └────────┬────────┘
//!        ▼                              ▼
//! ┌──────────────┐             ┌─────────────────┐
//! │ Retry policy │             │ Primary, then   │
//! │    loop      │             │ fallback once   │
//! └──────┬───────┘             └────────┬────────┘
//!        │                              ▼
//!        │                     ┌─────────────────┐
//!        │                     │ Async cache put │
//!        │                     └────────┬────────┘
//!        ▼                              ▼
//!             InvocationResult / Fatal
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod retry;
pub mod throttle;
pub mod transport;
pub mod types;

pub use engine::{EngineBuilder, InvocationEngine};
pub use errors::{ErrorClass, InvocationError, TransportError};
pub use types::{
    EndpointDescriptor, InvocationRequest, InvocationResult, Payload, Protocol, ProtocolHint,
};
