// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/search_api_tests.rs - End-to-end tests for the HTTP API surface

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use replica_search_node::api::{build_router, AppState, SEARCH_SOURCE_HEADER};
use replica_search_node::search::{
    SearchArbitrator, SearchBackend, SearchError, SearchQuery, SearchResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Primary stand-in that echoes the parsed query back through the response
struct EchoBackend;

#[async_trait]
impl SearchBackend for EchoBackend {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        Ok(SearchResponse {
            results: vec![],
            total_results: 0,
            start_index: query.offset,
            items_per_page: query.limit,
        })
    }

    fn name(&self) -> &'static str {
        "primary"
    }
}

struct FailingBackend;

#[async_trait]
impl SearchBackend for FailingBackend {
    async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        Err(SearchError::BadStatus { status: 500 })
    }

    fn name(&self) -> &'static str {
        "primary"
    }
}

fn router_with(primary: Arc<dyn SearchBackend>) -> axum::Router {
    let arbitrator = Arc::new(SearchArbitrator::new(primary, None));
    build_router(AppState::new(
        arbitrator,
        reqwest::Client::new(),
        vec![],
        Duration::from_secs(5),
    ))
}

async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_search_tags_winning_source() {
    let router = router_with(Arc::new(EchoBackend));
    let response = router
        .oneshot(
            Request::get("/search?s=bunny&limit=5&offset=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(SEARCH_SOURCE_HEADER).unwrap(),
        "primary"
    );
    let json = body_json(response.into_body()).await;
    assert_eq!(json["itemsPerPage"], 5);
    assert_eq!(json["startIndex"], 10);
    assert_eq!(json["objects"], serde_json::json!([]));
}

#[tokio::test]
async fn test_search_tolerates_malformed_pagination() {
    let router = router_with(Arc::new(EchoBackend));
    let response = router
        .oneshot(
            Request::get("/search?s=bunny&limit=bogus&offset=")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Unparseable limit/offset fall back to defaults instead of failing.
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["itemsPerPage"], 20);
    assert_eq!(json["startIndex"], 0);
}

#[tokio::test]
async fn test_search_exhaustion_is_bad_gateway() {
    let router = router_with(Arc::new(FailingBackend));
    let response = router
        .oneshot(Request::get("/search?s=bunny").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["error_type"], "search_failed");
}

#[tokio::test]
async fn test_health_reports_replica_state() {
    let router = router_with(Arc::new(EchoBackend));
    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["local_replica"], false);
}

#[tokio::test]
async fn test_object_metadata_rejects_bad_info_hash() {
    let router = router_with(Arc::new(EchoBackend));
    let response = router
        .oneshot(
            Request::get("/object/not-a-hash/metadata")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["error_type"], "invalid_request");
}

#[tokio::test]
async fn test_object_metadata_without_mirrors_is_unavailable() {
    let router = router_with(Arc::new(EchoBackend));
    let response = router
        .oneshot(
            Request::get("/object/00112233445566778899aabbccddeeff00112233/metadata")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
