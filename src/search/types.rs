// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types shared by every search source
//!
//! Results have the same JSON shape whether they came from the primary
//! remote service or the local index replica, so callers never need to know
//! which source answered.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Default number of results per page when the caller supplies none
pub const DEFAULT_RESULT_LIMIT: u64 = 20;

/// An incoming search query
///
/// `limit` and `offset` fall back to their defaults when absent or
/// unparseable; bad paging input never produces an error.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    /// The raw search term
    #[serde(rename = "s", default)]
    pub term: String,
    /// Maximum number of results to return
    #[serde(default = "default_limit", deserialize_with = "lenient_limit")]
    pub limit: u64,
    /// Number of results to skip
    #[serde(default, deserialize_with = "lenient_offset")]
    pub offset: u64,
}

fn default_limit() -> u64 {
    DEFAULT_RESULT_LIMIT
}

fn lenient_limit<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RESULT_LIMIT))
}

fn lenient_offset<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
}

/// A single search result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Whether the object is hosted on the replica network
    pub hosted_on_replica: bool,
    /// Hex of the 20-byte info hash
    pub info_hash: String,
    /// Path of the file inside the torrent
    pub torrent_internal_file_path: String,
    /// File size in bytes
    pub file_size: i64,
    /// Name of the containing torrent
    pub torrent_name: String,
    /// Known MIME types for the file
    pub mime_types: Vec<String>,
    /// RFC 3339 upload timestamp
    pub last_modified: String,
    /// Canonical magnet-style link for the hit
    pub replica_link: String,
    /// Number of files in the torrent
    pub torrent_num_files: u32,
    /// Human-readable display name
    pub display_name: String,
    /// Always null
    pub swarm_metadata: Option<String>,
    /// Full-text search rank
    pub upload_search_rank: f64,
    /// Which index produced the result
    pub source_index: String,
}

/// Response body shared by every search source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// The matching results
    #[serde(rename = "objects")]
    pub results: Vec<SearchResult>,
    /// Total number of results in this page
    pub total_results: usize,
    /// Offset the page starts at
    pub start_index: u64,
    /// Page size requested
    pub items_per_page: u64,
}

/// Errors from search backends and the arbitration layer
#[derive(Debug, Error)]
pub enum SearchError {
    /// Transport-level failure reaching a backend
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A backend answered with a client or server error status
    #[error("search backend returned status {status}")]
    BadStatus {
        /// HTTP status code
        status: u16,
    },

    /// The local index replica has not published a snapshot yet
    #[error("local index is not available")]
    IndexNotReady,

    /// The local index query itself failed
    #[error("local index query failed: {0}")]
    Database(#[from] sqlx::Error),

    /// The caller's deadline expired before any source answered acceptably
    #[error("search deadline expired before any source answered")]
    Cancelled,

    /// Every search source failed
    #[error("all search sources failed")]
    Exhausted,
}
