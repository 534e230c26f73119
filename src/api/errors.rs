// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::search::SearchError;

/// JSON body every error response carries
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable machine-readable error tag
    pub error_type: &'static str,
    /// Human-readable description
    pub message: String,
}

/// Errors a request handler can surface to the client
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request itself is malformed
    #[error("{0}")]
    InvalidRequest(String),

    /// Every search source failed or was unreachable
    #[error("search failed: {0}")]
    Search(#[from] SearchError),

    /// No upstream mirror could serve the request
    #[error("no upstream source available: {0}")]
    Unavailable(String),
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            // A blown latency budget is a gateway timeout; any other
            // search failure means the upstreams let us down.
            ApiError::Search(SearchError::Cancelled) => {
                (StatusCode::GATEWAY_TIMEOUT, "search_timeout")
            }
            ApiError::Search(_) => (StatusCode::BAD_GATEWAY, "search_failed"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        debug!("request failed with {}: {}", status, self);
        let body = ErrorResponse {
            error_type,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
