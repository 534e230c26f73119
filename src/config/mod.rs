// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration
//!
//! All settings come from environment variables with sensible defaults.
//! The local index replica is optional: when `INDEX_DIR` is unset the node
//! serves the primary search service only.

use std::env;
use std::path::PathBuf;

use url::Url;

const DEFAULT_PRIMARY_SEARCH_URL: &str = "http://127.0.0.1:9090/search";

/// Configuration for the search node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Port the HTTP API listens on
    pub api_port: u16,
    /// Endpoint of the primary remote search service
    pub primary_search_url: Url,
    /// Mirror roots for object metadata fetches, raced per request
    pub metadata_base_urls: Vec<Url>,
    /// Mirror roots serving local index snapshots
    pub index_mirror_urls: Vec<Url>,
    /// Webseed roots embedded into result links
    pub webseed_base_urls: Vec<Url>,
    /// Directory holding replicated index snapshots; `None` disables the
    /// local replica entirely (pass-through mode)
    pub index_dir: Option<PathBuf>,
    /// How often the synchronizer checks for a new index snapshot
    pub index_poll_interval_secs: u64,
    /// Per-request search deadline
    pub search_timeout_secs: u64,
}

impl NodeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            api_port: env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            primary_search_url: env::var("PRIMARY_SEARCH_URL")
                .ok()
                .and_then(|v| Url::parse(&v).ok())
                .unwrap_or_else(default_primary_search_url),
            metadata_base_urls: parse_url_list("METADATA_BASE_URLS"),
            index_mirror_urls: parse_url_list("INDEX_MIRROR_URLS"),
            webseed_base_urls: parse_url_list("WEBSEED_BASE_URLS"),
            index_dir: env::var("INDEX_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            index_poll_interval_secs: env::var("INDEX_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            search_timeout_secs: env::var("SEARCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.index_poll_interval_secs == 0 {
            return Err("Index poll interval must be greater than 0".to_string());
        }
        if self.search_timeout_secs == 0 {
            return Err("Search timeout must be greater than 0".to_string());
        }
        if self.index_dir.is_some() && self.index_mirror_urls.is_empty() {
            return Err(
                "INDEX_MIRROR_URLS must be set when INDEX_DIR is configured".to_string(),
            );
        }
        Ok(())
    }

    /// Whether the local index replica is enabled
    pub fn local_replica_enabled(&self) -> bool {
        self.index_dir.is_some()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_port: 8080,
            primary_search_url: default_primary_search_url(),
            metadata_base_urls: vec![],
            index_mirror_urls: vec![],
            webseed_base_urls: vec![],
            index_dir: None,
            index_poll_interval_secs: 3600,
            search_timeout_secs: 15,
        }
    }
}

fn default_primary_search_url() -> Url {
    Url::parse(DEFAULT_PRIMARY_SEARCH_URL).expect("default primary search url is valid")
}

/// Parse a comma-separated list of URLs from an environment variable,
/// skipping entries that fail to parse.
fn parse_url_list(var: &str) -> Vec<Url> {
    env::var(var)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| Url::parse(s).ok())
                .collect()
        })
        .unwrap_or_default()
}
