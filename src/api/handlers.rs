// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request handlers
//!
//! `/search` runs the dual-source arbitration and tags the response with
//! the winning source. `/object/:info_hash/metadata` relays object metadata
//! from whichever mirror answers first. `/health` reports liveness.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL,
    CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE,
};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use super::errors::ApiError;
use super::AppState;
use crate::fetch::{join_mirror_url, FetchError};
use crate::search::SearchQuery;
use crate::version::VERSION;

/// Response header naming the search source that answered
pub const SEARCH_SOURCE_HEADER: &str = "x-search-source";

/// Relayed metadata is immutable per info-hash, so let clients cache it.
const METADATA_CACHE_CONTROL: &str = "public, max-age=600, immutable";

/// Request headers forwarded to metadata mirrors
const FORWARDED_REQUEST_HEADERS: [HeaderName; 4] =
    [ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, RANGE];

/// Response headers relayed back from the winning mirror
const RELAYED_RESPONSE_HEADERS: [HeaderName; 3] = [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_RANGE];

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub local_replica: bool,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: VERSION,
        local_replica: state.arbitrator.has_local_replica(),
    })
}

/// GET /search?s=term&limit=N&offset=M
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    let deadline = Instant::now() + state.request_timeout;
    let arbitrated = state.arbitrator.search(&query, Some(deadline)).await?;

    let mut response = Json(arbitrated.response).into_response();
    response.headers_mut().insert(
        SEARCH_SOURCE_HEADER,
        HeaderValue::from_static(arbitrated.source),
    );
    Ok(response)
}

/// GET /object/:info_hash/metadata
pub async fn object_metadata(
    State(state): State<AppState>,
    Path(info_hash): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let decoded = hex::decode(&info_hash)
        .map_err(|_| ApiError::InvalidRequest(format!("invalid info hash {:?}", info_hash)))?;
    if decoded.len() != 20 {
        return Err(ApiError::InvalidRequest(format!(
            "info hash must be 20 bytes, got {}",
            decoded.len()
        )));
    }

    let path = format!("{}/metadata", info_hash);
    let candidates: Vec<Url> = state
        .metadata_base_urls
        .iter()
        .filter_map(|base| join_mirror_url(base, &path))
        .collect();

    let mut forwarded = HeaderMap::new();
    for name in FORWARDED_REQUEST_HEADERS {
        if let Some(value) = headers.get(&name) {
            forwarded.insert(name, value.clone());
        }
    }

    let upstream = state
        .fetcher
        .first_acceptable(&candidates, forwarded, |r| r.status().is_success())
        .await
        .map_err(|e| match e {
            FetchError::NoCandidates => {
                ApiError::Unavailable("no metadata mirrors configured".to_string())
            }
            other => ApiError::Unavailable(other.to_string()),
        })?;

    debug!(
        "relaying object metadata for {} from {} ({})",
        info_hash,
        upstream.url(),
        upstream.status()
    );

    // Relay the winning response as-is, body streaming straight through.
    let status = upstream.status();
    let mut relayed = HeaderMap::new();
    for name in RELAYED_RESPONSE_HEADERS {
        if let Some(value) = upstream.headers().get(&name) {
            relayed.insert(name, value.clone());
        }
    }
    if status.is_success() {
        relayed.insert(
            CACHE_CONTROL,
            HeaderValue::from_static(METADATA_CACHE_CONTROL),
        );
    }

    Ok((status, relayed, Body::from_stream(upstream.bytes_stream())).into_response())
}
