// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP API
//!
//! Thin axum layer over the search arbitrator and the mirror-backed object
//! metadata relay. Handlers translate between HTTP and the domain types;
//! all policy lives below this module.

pub mod errors;
pub mod handlers;

use axum::routing::get;
use axum::Router;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;
use url::Url;

use crate::fetch::RaceFetcher;
use crate::search::SearchArbitrator;

pub use errors::ApiError;
pub use handlers::SEARCH_SOURCE_HEADER;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    /// Dual-source search entry point
    pub arbitrator: Arc<SearchArbitrator>,
    /// Mirror race fetcher for object metadata
    pub fetcher: RaceFetcher,
    /// Mirror roots serving object metadata
    pub metadata_base_urls: Arc<Vec<Url>>,
    /// Per-request latency budget
    pub request_timeout: Duration,
}

impl AppState {
    /// Assemble the handler state
    pub fn new(
        arbitrator: Arc<SearchArbitrator>,
        client: Client,
        metadata_base_urls: Vec<Url>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            arbitrator,
            fetcher: RaceFetcher::new(client),
            metadata_base_urls: Arc::new(metadata_base_urls),
            request_timeout,
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/search", get(handlers::search))
        .route("/object/:info_hash/metadata", get(handlers::object_metadata))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until `shutdown` fires
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("search API listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
