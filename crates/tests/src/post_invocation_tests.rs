//! Integration tests for plain HTTP POST invocations.

use crate::mock_infrastructure::{engine_without_fallback, plain_endpoint, EndpointMockBuilder};
use courier_core::{types::Payload, InvocationRequest, TransportError};
use mockito::Matcher;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_post_form_body() {
    let mut mock = EndpointMockBuilder::new().await;
    let form = mock
        .server()
        .mock("POST", "/form")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::Exact("a=1&b=two".to_string()))
        .with_body("{\"stored\":true}")
        .create_async()
        .await;

    let engine = engine_without_fallback();
    let request = InvocationRequest::post().body(Payload::text("  a=1&b=two\n"));

    let result = engine
        .invoke(&plain_endpoint(&mock.url_for("/form")), request, &CancellationToken::new())
        .await
        .unwrap();

    form.assert_async().await;
    assert_eq!(result.payload, json!({"stored": true}));
}

#[tokio::test]
async fn test_post_json_document() {
    let mut mock = EndpointMockBuilder::new().await;
    let create = mock
        .server()
        .mock("POST", "/items")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"name": "widget", "qty": 3})))
        .with_status(201)
        .with_body("created")
        .create_async()
        .await;

    let engine = engine_without_fallback();
    let request =
        InvocationRequest::post().body(Payload::document(json!({"name": "widget", "qty": 3})));

    let result = engine
        .invoke(&plain_endpoint(&mock.url_for("/items")), request, &CancellationToken::new())
        .await
        .unwrap();

    create.assert_async().await;
    assert_eq!(result.payload, json!({"doc": "created"}));
}

#[tokio::test]
async fn test_post_keeps_caller_content_type() {
    let mut mock = EndpointMockBuilder::new().await;
    let xml = mock
        .server()
        .mock("POST", "/xml")
        .match_header("content-type", "text/xml")
        .with_body("<ok/>")
        .create_async()
        .await;

    let engine = engine_without_fallback();
    let request = InvocationRequest::post()
        .body(Payload::text("<order id=\"1\"/>"))
        .header("Content-Type", "text/xml");

    engine
        .invoke(&plain_endpoint(&mock.url_for("/xml")), request, &CancellationToken::new())
        .await
        .unwrap();

    xml.assert_async().await;
}

#[tokio::test]
async fn test_post_is_never_cached() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_post("/submit", Matcher::Any, "{}", 2).await;

    let engine = engine_without_fallback();
    let endpoint = plain_endpoint(&mock.url_for("/submit"));
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let result = engine
            .invoke(&endpoint, InvocationRequest::post().use_cache(true), &cancel)
            .await
            .unwrap();
        assert!(!result.served_from_cache);
    }

    mock.assert_all().await;
    assert!(engine.cache().is_empty());
    assert_eq!(engine.throttle().tracked_hosts(), 0);
}

#[tokio::test]
async fn test_post_client_error_is_retried_as_protocol_failure() {
    let mut mock = EndpointMockBuilder::new().await;
    let rejected = mock
        .server()
        .mock("POST", "/reject")
        .with_status(422)
        .with_body("missing field")
        .expect(3)
        .create_async()
        .await;

    let engine = engine_without_fallback();
    let err = engine
        .invoke(
            &plain_endpoint(&mock.url_for("/reject")),
            InvocationRequest::post(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    rejected.assert_async().await;
    assert_eq!(err.attempts(), 3);
    assert!(matches!(err.cause(), TransportError::UnexpectedStatus(422, _)));
}
