//! Integration tests for GET invocations: query encoding, caching and throttling.

use crate::mock_infrastructure::{
    engine_without_fallback, fast_config, plain_endpoint, wait_for_cache_entries,
    EndpointMockBuilder,
};
use courier_core::{types::Payload, EngineBuilder, InvocationRequest};
use mockito::Matcher;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_get_encodes_object_parameters() {
    let mut mock = EndpointMockBuilder::new().await;
    let quote = mock
        .server()
        .mock("GET", "/quote")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("s".into(), "ACME CORP".into()),
            Matcher::UrlEncoded("f".into(), "a".into()),
            Matcher::UrlEncoded("f".into(), "b".into()),
        ]))
        .with_body("{\"price\":12.5}")
        .create_async()
        .await;

    let engine = engine_without_fallback();
    let request = InvocationRequest::get()
        .body(Payload::document(json!({"s": "ACME CORP", "f": ["a", "b"]})));

    let result = engine
        .invoke(&plain_endpoint(&mock.url_for("/quote")), request, &CancellationToken::new())
        .await
        .unwrap();

    quote.assert_async().await;
    assert_eq!(result.payload, json!({"price": 12.5}));
    assert!(!result.served_from_cache);
}

#[tokio::test]
async fn test_get_text_body_is_appended_as_query() {
    let mut mock = EndpointMockBuilder::new().await;
    let search = mock
        .server()
        .mock("GET", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("q".into(), "rust".into()),
        ]))
        .with_body("[1,2,3]")
        .create_async()
        .await;

    let engine = engine_without_fallback();
    let request = InvocationRequest::get().body(Payload::text(" q=rust "));

    let result = engine
        .invoke(
            &plain_endpoint(&mock.url_for("/search?page=2")),
            request,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    search.assert_async().await;
    assert_eq!(result.payload, json!([1, 2, 3]));
}

#[tokio::test]
async fn test_plain_text_response_is_wrapped() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_get("/count", "42", 1).await;

    let engine = engine_without_fallback();
    let result = engine
        .invoke(
            &plain_endpoint(&mock.url_for("/count")),
            InvocationRequest::get(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    mock.assert_all().await;
    assert_eq!(result.payload, json!({"doc": "42"}));
    assert_eq!(result.verbatim_payload, "42");
}

#[tokio::test]
async fn test_headers_travel_both_ways() {
    let mut mock = EndpointMockBuilder::new().await;
    let page = mock
        .server()
        .mock("GET", "/page")
        .match_header("x-api-key", "secret")
        .with_header("x-rate-remaining", "99")
        .with_body("{}")
        .create_async()
        .await;

    let engine = engine_without_fallback();
    let request = InvocationRequest::get().raw_headers(["X-Api-Key: secret"]);

    let result = engine
        .invoke(&plain_endpoint(&mock.url_for("/page")), request, &CancellationToken::new())
        .await
        .unwrap();

    page.assert_async().await;
    assert_eq!(result.header("X-Rate-Remaining"), ["99".to_string()]);
}

#[tokio::test]
async fn test_cached_get_hits_server_once() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_get("/data", "{\"v\":1}", 1).await;

    let engine = engine_without_fallback();
    let endpoint = plain_endpoint(&mock.url_for("/data"));
    let cancel = CancellationToken::new();
    let request = || InvocationRequest::get().body(Payload::text("k=1")).use_cache(true);

    let first = engine.invoke(&endpoint, request(), &cancel).await.unwrap();
    assert!(!first.served_from_cache);
    wait_for_cache_entries(&engine, 1).await;

    let second = engine.invoke(&endpoint, request(), &cancel).await.unwrap();
    assert!(second.served_from_cache);
    assert_eq!(second.payload, first.payload);
    assert_eq!(second.verbatim_payload, "{\"v\":1}");

    mock.assert_all().await;
}

#[tokio::test]
async fn test_cache_key_includes_query() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_get("/data", "{}", 2).await;

    let engine = engine_without_fallback();
    let endpoint = plain_endpoint(&mock.url_for("/data"));
    let cancel = CancellationToken::new();

    for query in ["k=1", "k=2"] {
        let request = InvocationRequest::get().body(Payload::text(query)).use_cache(true);
        let result = engine.invoke(&endpoint, request, &cancel).await.unwrap();
        assert!(!result.served_from_cache);
    }

    wait_for_cache_entries(&engine, 2).await;
    mock.assert_all().await;
}

#[tokio::test]
async fn test_uncached_get_always_hits_server() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_get("/live", "{}", 2).await;

    let engine = engine_without_fallback();
    let endpoint = plain_endpoint(&mock.url_for("/live"));
    let cancel = CancellationToken::new();

    engine.invoke(&endpoint, InvocationRequest::get(), &cancel).await.unwrap();
    engine.invoke(&endpoint, InvocationRequest::get(), &cancel).await.unwrap();

    mock.assert_all().await;
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn test_same_host_gets_are_spaced() {
    let mut mock = EndpointMockBuilder::new().await;
    mock.mock_get("/paced", "{}", 3).await;

    let mut config = fast_config();
    config.throttle.min_interval_ms = 200;
    let engine = EngineBuilder::from_config(&config).disable_fallback().build().unwrap();
    let endpoint = plain_endpoint(&mock.url_for("/paced"));
    let cancel = CancellationToken::new();

    let start = Instant::now();
    for _ in 0..3 {
        engine.invoke(&endpoint, InvocationRequest::get(), &cancel).await.unwrap();
    }

    assert!(start.elapsed() >= Duration::from_millis(400));
    assert_eq!(engine.throttle().tracked_hosts(), 1);
    mock.assert_all().await;
}
