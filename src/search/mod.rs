// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Dual-source search
//!
//! Resolves queries against the primary remote search service and the local
//! index replica, racing the two under a bounded latency budget:
//! - The primary gets a bounded head start on every query
//! - The local replica answers when the primary is slow or unreachable
//! - Individual source failures are invisible to the caller

pub mod arbiter;
pub mod backend;
pub mod local;
pub mod remote;
pub mod types;

pub use arbiter::{ArbitratedResponse, SearchArbitrator};
pub use backend::SearchBackend;
pub use local::{escape_fts5_query, LocalQueryEngine, LOCAL_INDEX_SOURCE_KEY};
pub use remote::{RemoteSearchClient, PRIMARY_SOURCE_KEY};
pub use types::{SearchError, SearchQuery, SearchResponse, SearchResult, DEFAULT_RESULT_LIMIT};
