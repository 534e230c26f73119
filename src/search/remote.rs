// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Primary remote search client
//!
//! Queries the primary search service over HTTP. Responses in the
//! client/server error class are treated as unavailability so the arbitrator
//! can fall back to the local index; redirects are followed by the client.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::backend::SearchBackend;
use super::types::{SearchError, SearchQuery, SearchResponse};

/// Source tag for the primary remote service
pub const PRIMARY_SOURCE_KEY: &str = "primary";

/// Client for the primary remote search service
pub struct RemoteSearchClient {
    endpoint: Url,
    client: Client,
}

impl RemoteSearchClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `endpoint` - full URL of the remote search endpoint
    /// * `client` - shared HTTP client
    pub fn new(endpoint: Url, client: Client) -> Self {
        Self { endpoint, client }
    }
}

#[async_trait]
impl SearchBackend for RemoteSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        debug!("querying primary search service for {:?}", query.term);
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("s", query.term.as_str()),
                ("limit", &query.limit.to_string()),
                ("offset", &query.offset.to_string()),
            ])
            .send()
            .await?;

        // Accept 1xx, 2xx and 3xx responses only.
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(SearchError::BadStatus {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<SearchResponse>().await?)
    }

    fn name(&self) -> &'static str {
        PRIMARY_SOURCE_KEY
    }
}
