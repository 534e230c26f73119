// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Search backend trait definition

use async_trait::async_trait;

use super::types::{SearchQuery, SearchResponse, SearchError};

/// Trait implemented by every source the arbitrator can race
///
/// A backend either answers acceptably (`Ok`) or is treated as unavailable
/// for that race (`Err`); partial or error-status answers are never surfaced
/// as successes.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Resolve a search query against this source
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError>;

    /// Source tag used in logs and the response source header
    fn name(&self) -> &'static str;
}
