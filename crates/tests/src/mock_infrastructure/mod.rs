//! Mock Infrastructure for Testing the Invocation Engine
//!
//! ## Components
//!
//! - `EndpointMockBuilder`: Wraps mockito with helpers for plain HTTP and RPC envelope responses
//! - Test helpers for engine configuration and endpoint descriptors
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{fast_config, EndpointMockBuilder};
//!
//! let mut mock = EndpointMockBuilder::new().await;
//! mock.mock_get("/quote", "{\"price\":1}", 1);
//!
//! let engine = EngineBuilder::from_config(&fast_config()).build()?;
//! ```

pub mod endpoint_mock;

pub use endpoint_mock::{rpc_response, EndpointMockBuilder};
pub use test_helpers::*;
