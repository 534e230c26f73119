// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Result link construction
//!
//! Builds the magnet-style link embedded in every search result. The link
//! carries the info hash, a display name, the exact-source token for the
//! upload prefix, and webseed URLs derived from the configured mirror roots.

use url::form_urlencoded;
use url::Url;

/// Builds canonical result links for search hits
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    webseed_base_urls: Vec<Url>,
}

impl LinkBuilder {
    /// Create a new link builder
    ///
    /// # Arguments
    /// * `webseed_base_urls` - mirror roots used as webseeds in result links
    pub fn new(webseed_base_urls: Vec<Url>) -> Self {
        Self { webseed_base_urls }
    }

    /// Produce the canonical result link for a search hit.
    ///
    /// Uploads are single-file torrents, hence the fixed `so=0` selector.
    pub fn create_link(&self, info_hash_hex: &str, prefix: &str, file_path: &str) -> String {
        let mut params = form_urlencoded::Serializer::new(String::new());
        params.append_pair("dn", file_path);
        params.append_pair("xs", &format!("replica:{}", prefix));
        params.append_pair("so", "0");
        for base in &self.webseed_base_urls {
            params.append_pair(
                "ws",
                &format!(
                    "{}/{}/data/{}",
                    base.as_str().trim_end_matches('/'),
                    prefix,
                    file_path
                ),
            );
        }
        format!("magnet:?xt=urn:btih:{}&{}", info_hash_hex, params.finish())
    }
}
