//! Integration tests for the lenient fallback fetch after a failed GET.

use crate::mock_infrastructure::{
    engine_with_fallback, engine_without_fallback, plain_endpoint, unreachable_url,
    wait_for_cache_entries, EndpointMockBuilder,
};
use courier_core::{InvocationRequest, TransportError};
use mockito::Matcher;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_fallback_rescues_error_status() {
    let mut mock = EndpointMockBuilder::new().await;
    // Primary attempt and fallback fetch both land here
    mock.mock_get_status("/flaky", 503, "<p>stale copy</p><script>track()</script>", 2).await;

    let engine = engine_with_fallback();
    let endpoint = plain_endpoint(&mock.url_for("/flaky"));
    let result = engine
        .invoke(&endpoint, InvocationRequest::get(), &CancellationToken::new())
        .await
        .unwrap();

    mock.assert_all().await;
    assert_eq!(result.verbatim_payload, "<p>stale copy</p><script>track()</script>");
    assert_eq!(result.payload, json!({"doc": "<p>stale copy</p>"}));
}

#[tokio::test]
async fn test_fallback_forwards_caller_headers() {
    let mut mock = EndpointMockBuilder::new().await;
    // Only requests carrying the caller's header match, primary and fallback alike
    let guarded = mock
        .server()
        .mock("GET", "/guarded")
        .match_query(Matcher::Any)
        .match_header("x-token", "abc")
        .with_status(503)
        .with_body("<p>members only</p>")
        .expect(2)
        .create_async()
        .await;

    let engine = engine_with_fallback();
    let endpoint = plain_endpoint(&mock.url_for("/guarded"));
    let request = InvocationRequest::get().header("x-token", "abc");
    let result = engine.invoke(&endpoint, request, &CancellationToken::new()).await.unwrap();

    guarded.assert_async().await;
    assert_eq!(result.payload, json!({"doc": "<p>members only</p>"}));
}

#[tokio::test]
async fn test_fallback_result_is_cached() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_get_status("/flaky", 500, "{\"v\":2}", 2).await;

    let engine = engine_with_fallback();
    let endpoint = plain_endpoint(&mock.url_for("/flaky"));
    let cancel = CancellationToken::new();

    engine.invoke(&endpoint, InvocationRequest::get().use_cache(true), &cancel).await.unwrap();
    wait_for_cache_entries(&engine, 1).await;

    let cached =
        engine.invoke(&endpoint, InvocationRequest::get().use_cache(true), &cancel).await.unwrap();
    assert!(cached.served_from_cache);
    assert_eq!(cached.payload, json!({"v": 2}));

    mock.assert_all().await;
}

#[tokio::test]
async fn test_fallback_failure_is_fatal() {
    let engine = engine_with_fallback();
    let err = engine
        .invoke(
            &plain_endpoint(&unreachable_url()),
            InvocationRequest::get(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), 2);
    match err.cause() {
        TransportError::Fallback { primary, fallback } => {
            assert!(matches!(**primary, TransportError::Connectivity(_)));
            assert!(matches!(**fallback, TransportError::Connectivity(_)));
        }
        other => panic!("expected fallback failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_without_fallback_get_uses_retry_policy() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_get_status("/down", 503, "busy", 3).await;

    let engine = engine_without_fallback();
    let err = engine
        .invoke(
            &plain_endpoint(&mock.url_for("/down")),
            InvocationRequest::get(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    mock.assert_all().await;
    assert_eq!(err.attempts(), 3);
    assert!(matches!(err.cause(), TransportError::UnexpectedStatus(503, _)));
}
