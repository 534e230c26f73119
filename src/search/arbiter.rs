// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Search arbitration
//!
//! Races the primary remote service against the local index replica for
//! every query. The primary is preferred: it gets a bounded head start
//! before the local outcome is consulted, so this is a documented preference
//! order rather than a strict latency race. Individual source failures are
//! swallowed and logged; only total exhaustion reaches the caller.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::backend::SearchBackend;
use super::types::{SearchError, SearchQuery, SearchResponse};

/// How long the primary source may take before the local outcome is used,
/// when the caller supplies no deadline of its own
const MAX_PRIMARY_WAIT: Duration = Duration::from_secs(5);

/// An accepted response plus the source that produced it
#[derive(Debug)]
pub struct ArbitratedResponse {
    /// The accepted response body
    pub response: SearchResponse,
    /// Tag of the source that answered (`primary` or `local_index`)
    pub source: &'static str,
}

/// Races the primary search service against the local index replica
pub struct SearchArbitrator {
    primary: Arc<dyn SearchBackend>,
    local: Option<Arc<dyn SearchBackend>>,
}

impl SearchArbitrator {
    /// Create a new arbitrator
    ///
    /// # Arguments
    /// * `primary` - the remote search service
    /// * `local` - the local index engine, or `None` for pass-through mode
    pub fn new(primary: Arc<dyn SearchBackend>, local: Option<Arc<dyn SearchBackend>>) -> Self {
        Self { primary, local }
    }

    /// Whether a local replica is configured
    pub fn has_local_replica(&self) -> bool {
        self.local.is_some()
    }

    /// Resolve a query against both sources under the given deadline.
    ///
    /// The primary answer wins if it arrives acceptably within its wait
    /// window; otherwise the local outcome is awaited until the deadline.
    pub async fn search(
        &self,
        query: &SearchQuery,
        deadline: Option<Instant>,
    ) -> Result<ArbitratedResponse, SearchError> {
        // Without a local index, just run the primary as usual.
        let local = match &self.local {
            Some(local) => Arc::clone(local),
            None => {
                let response = self.primary.search(query).await?;
                return Ok(ArbitratedResponse {
                    response,
                    source: self.primary.name(),
                });
            }
        };

        let primary_wait = match deadline {
            None => MAX_PRIMARY_WAIT,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(SearchError::Cancelled);
                }
                // Give the primary half the remaining budget, capped.
                (remaining / 2).min(MAX_PRIMARY_WAIT)
            }
        };

        let primary = Arc::clone(&self.primary);
        let local_name = local.name();
        let primary_query = query.clone();
        let local_query = query.clone();
        let mut primary_task =
            tokio::spawn(async move { primary.search(&primary_query).await });
        let local_task = tokio::spawn(async move { local.search(&local_query).await });

        match tokio::time::timeout(primary_wait, &mut primary_task).await {
            Ok(Ok(Ok(response))) => {
                local_task.abort();
                return Ok(ArbitratedResponse {
                    response,
                    source: self.primary.name(),
                });
            }
            Ok(Ok(Err(e))) => {
                // Ignorable: the local source might still save the day.
                debug!("ignorable error from primary search source: {}", e);
            }
            Ok(Err(e)) => {
                debug!("primary search task failed: {}", e);
            }
            Err(_) => {
                debug!(
                    "primary search source exceeded its {:?} window, \
                     checking local index",
                    primary_wait
                );
                primary_task.abort();
            }
        }

        // The primary failed to answer acceptably; try our luck with the
        // local index before the deadline expires.
        let outcome = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match tokio::time::timeout(remaining, local_task).await {
                    Ok(outcome) => outcome,
                    Err(_) => return Err(SearchError::Cancelled),
                }
            }
            None => local_task.await,
        };

        match outcome {
            Ok(Ok(response)) => Ok(ArbitratedResponse {
                response,
                source: local_name,
            }),
            Ok(Err(e)) => {
                warn!("local index search failed after primary: {}", e);
                Err(SearchError::Exhausted)
            }
            Err(e) => {
                warn!("local index search task failed: {}", e);
                Err(SearchError::Exhausted)
            }
        }
    }
}
