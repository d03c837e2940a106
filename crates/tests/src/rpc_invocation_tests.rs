//! Integration tests for RPC envelope invocations.

use crate::mock_infrastructure::{
    engine_without_fallback, rpc_endpoint, rpc_response, EndpointMockBuilder,
};
use courier_core::{types::Payload, InvocationRequest, Protocol, ProtocolHint, TransportError};
use mockito::Matcher;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_v1_envelope_on_the_wire() {
    let mut mock = EndpointMockBuilder::new().await;
    let url = mock.url_for("/svc");
    let service = mock
        .server()
        .mock("POST", "/svc")
        .match_header("content-type", "application/json")
        .match_header("x-rpc-action", "GetQuote")
        .match_body(Matcher::Json(json!({
            "envelope": "1.1",
            "header": [{"action": "GetQuote"}, {"to": url}],
            "body": {"symbol": "ACME"}
        })))
        .with_body(rpc_response("1.1", &json!({"price": 12.5})))
        .create_async()
        .await;

    let engine = engine_without_fallback();
    let request = InvocationRequest::new(Protocol::RpcV1)
        .body(Payload::document(json!({"symbol": "ACME"})))
        .header("action", "GetQuote");

    let result = engine
        .invoke(&rpc_endpoint(&url, ProtocolHint::RpcV1), request, &CancellationToken::new())
        .await
        .unwrap();

    service.assert_async().await;
    assert_eq!(result.payload, json!({"price": 12.5}));
    assert!(result.verbatim_payload.contains("\"envelope\""));
}

#[tokio::test]
async fn test_v2_content_type() {
    let mut mock = EndpointMockBuilder::new().await;
    let service = mock
        .server()
        .mock("POST", "/svc2")
        .match_header("content-type", "application/rpc+json")
        .match_body(Matcher::PartialJson(json!({"envelope": "1.2", "body": {"id": 7}})))
        .with_body(rpc_response("1.2", &json!({"ok": true})))
        .create_async()
        .await;

    let engine = engine_without_fallback();
    let request = InvocationRequest::new(Protocol::RpcV2).body(Payload::document(json!({"id": 7})));

    let result = engine
        .invoke(
            &rpc_endpoint(&mock.url_for("/svc2"), ProtocolHint::RpcV2),
            request,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    service.assert_async().await;
    assert_eq!(result.payload, json!({"ok": true}));
}

#[tokio::test]
async fn test_scalar_response_body_is_wrapped() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_rpc("/count", "1.1", &json!(42), 1).await;

    let engine = engine_without_fallback();
    let result = engine
        .invoke(
            &rpc_endpoint(&mock.url_for("/count"), ProtocolHint::RpcV1),
            InvocationRequest::new(Protocol::RpcV1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    mock.assert_all().await;
    assert_eq!(result.payload, json!({"doc": "42"}));
}

#[tokio::test]
async fn test_fault_exhausts_retry_budget() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_rpc_fault("/faulty", "symbol not found", 3).await;

    let engine = engine_without_fallback();
    let err = engine
        .invoke(
            &rpc_endpoint(&mock.url_for("/faulty"), ProtocolHint::RpcV1),
            InvocationRequest::new(Protocol::RpcV1)
                .body(Payload::document(json!({"symbol": "NOPE"}))),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    mock.assert_all().await;
    assert_eq!(err.attempts(), 3);
    match err.cause() {
        TransportError::Fault(message) => assert_eq!(message, "symbol not found"),
        other => panic!("expected fault, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_envelope_response_is_malformed() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_post("/html", Matcher::Any, "<html>maintenance</html>", 3).await;

    let engine = engine_without_fallback();
    let err = engine
        .invoke(
            &rpc_endpoint(&mock.url_for("/html"), ProtocolHint::RpcV1),
            InvocationRequest::new(Protocol::RpcV1),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    mock.assert_all().await;
    assert!(matches!(err.cause(), TransportError::MalformedEnvelope(_)));
}

#[tokio::test]
async fn test_rpc_to_plain_endpoint_sends_bare_post() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_post("/plain", Matcher::Json(json!({"symbol": "ACME"})), "{\"price\":1}", 1).await;

    let engine = engine_without_fallback();
    let request =
        InvocationRequest::new(Protocol::RpcV1).body(Payload::document(json!({"symbol": "ACME"})));

    let result = engine
        .invoke(
            &rpc_endpoint(&mock.url_for("/plain"), ProtocolHint::PlainHttp),
            request,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    mock.assert_all().await;
    assert_eq!(result.payload, json!({"price": 1}));
}

#[tokio::test]
async fn test_rpc_skips_cache_and_throttle() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_rpc("/svc", "1.1", &json!({}), 2).await;

    let engine = engine_without_fallback();
    let endpoint = rpc_endpoint(&mock.url_for("/svc"), ProtocolHint::RpcV1);
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let request = InvocationRequest::new(Protocol::RpcV1).use_cache(true);
        let result = engine.invoke(&endpoint, request, &cancel).await.unwrap();
        assert!(!result.served_from_cache);
    }

    mock.assert_all().await;
    assert!(engine.cache().is_empty());
    assert_eq!(engine.throttle().tracked_hosts(), 0);
}
