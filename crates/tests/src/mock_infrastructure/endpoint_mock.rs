//! Mockito wrapper with helpers for plain HTTP and RPC envelope endpoints.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

/// Wraps `body` in a response envelope.
#[must_use]
pub fn rpc_response(envelope: &str, body: &Value) -> String {
    json!({
        "envelope": envelope,
        "header": [],
        "body": body
    })
    .to_string()
}

/// Builder for mock endpoints.
///
/// Every helper registers the expected number of hits; [`Self::assert_all`]
/// verifies them.
pub struct EndpointMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl EndpointMockBuilder {
    /// Creates a builder with a fresh mockito server.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    /// Returns the base URL of the mock server.
    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Returns the full URL of `path` on the mock server.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{path}", self.server.url())
    }

    /// Direct access for one-off mocks.
    pub fn server(&mut self) -> &mut ServerGuard {
        &mut self.server
    }

    /// Mocks a GET returning `body` with status 200, matching any query.
    pub async fn mock_get(&mut self, path: &str, body: &str, hits: usize) -> &mut Self {
        self.mock_get_status(path, 200, body, hits).await
    }

    /// Mocks a GET returning `body` with `status`, matching any query.
    pub async fn mock_get_status(
        &mut self,
        path: &str,
        status: usize,
        body: &str,
        hits: usize,
    ) -> &mut Self {
        let mock = self
            .server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(body)
            .expect(hits)
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Mocks a POST whose body satisfies `body_matcher`.
    pub async fn mock_post(
        &mut self,
        path: &str,
        body_matcher: Matcher,
        response: &str,
        hits: usize,
    ) -> &mut Self {
        let mock = self
            .server
            .mock("POST", path)
            .match_body(body_matcher)
            .with_status(200)
            .with_body(response)
            .expect(hits)
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Mocks an RPC endpoint accepting envelopes of version `envelope` and answering with `body`.
    pub async fn mock_rpc(
        &mut self,
        path: &str,
        envelope: &str,
        body: &Value,
        hits: usize,
    ) -> &mut Self {
        let mock = self
            .server
            .mock("POST", path)
            .match_body(Matcher::PartialJson(json!({"envelope": envelope})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(rpc_response(envelope, body))
            .expect(hits)
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Mocks an RPC endpoint answering every envelope with a fault.
    pub async fn mock_rpc_fault(&mut self, path: &str, message: &str, hits: usize) -> &mut Self {
        let mock = self
            .server
            .mock("POST", path)
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(rpc_response(
                "1.1",
                &json!({"fault": {"code": "Server", "message": message}}),
            ))
            .expect(hits)
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Asserts every registered mock received its expected number of hits.
    pub async fn assert_all(&self) {
        for mock in &self.mocks {
            mock.assert_async().await;
        }
    }
}
