// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod fetch;
pub mod link;
pub mod replica;
pub mod search;
pub mod version;

pub use api::{build_router, serve, AppState, SEARCH_SOURCE_HEADER};
pub use config::NodeConfig;
pub use fetch::{FetchError, RaceFetcher};
pub use link::LinkBuilder;
pub use replica::{IndexStore, IndexSynchronizer, MirrorDistributor};
pub use search::{
    ArbitratedResponse, LocalQueryEngine, RemoteSearchClient, SearchArbitrator, SearchBackend,
    SearchError, SearchQuery, SearchResponse, SearchResult,
};
