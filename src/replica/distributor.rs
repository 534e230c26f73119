// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Content distribution contract
//!
//! The synchronizer only depends on a two-call contract: name the latest
//! index version, and stream its bytes. The mirror-backed implementation
//! races the configured mirror roots for both calls; a DHT-backed one would
//! satisfy the same trait.

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::HeaderMap;
use std::fmt;
use std::io;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use url::Url;

use crate::fetch::{join_mirror_url, FetchError, RaceFetcher};

/// Opaque 20-byte token naming one version of the distributed index.
/// Equal identifiers imply identical payloads.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ContentId([u8; 20]);

impl ContentId {
    /// Parse an identifier from its hex form
    pub fn from_hex(s: &str) -> Result<Self, DistributorError> {
        let bytes = hex::decode(s.trim())
            .map_err(|_| DistributorError::InvalidIdentifier(s.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| DistributorError::InvalidIdentifier(s.to_string()))?;
        Ok(Self(bytes))
    }

    /// The raw identifier bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self)
    }
}

/// Errors from the content distribution layer
#[derive(Debug, Error)]
pub enum DistributorError {
    /// No mirror produced the requested content
    #[error("fetching from content mirrors: {0}")]
    Fetch(#[from] FetchError),

    /// The selected mirror answered with an error status
    #[error("content mirror returned status {status}")]
    BadStatus {
        /// HTTP status code
        status: u16,
    },

    /// The advertised identifier is not a 20-byte hex token
    #[error("invalid content identifier {0:?}")]
    InvalidIdentifier(String),

    /// Reading the mirror response failed
    #[error("reading mirror response: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Byte stream of one index snapshot payload
pub type PayloadReader = Box<dyn AsyncRead + Send + Unpin>;

/// Narrow contract the synchronizer pulls index snapshots through
#[async_trait]
pub trait ContentDistributor: Send + Sync {
    /// Identifier of the latest available index snapshot
    async fn fetch_latest_identifier(&self) -> Result<ContentId, DistributorError>;

    /// Byte stream of the payload named by `id`
    async fn fetch_payload(&self, id: &ContentId) -> Result<PayloadReader, DistributorError>;
}

/// Distributor backed by redundant HTTP mirrors
///
/// Mirrors serve `index/latest` (hex identifier) and
/// `index/<hex>.sqlite` (snapshot payload) under each configured root.
pub struct MirrorDistributor {
    fetcher: RaceFetcher,
    mirror_urls: Vec<Url>,
}

impl MirrorDistributor {
    /// Create a distributor over the given mirror roots
    pub fn new(fetcher: RaceFetcher, mirror_urls: Vec<Url>) -> Self {
        Self {
            fetcher,
            mirror_urls,
        }
    }

    fn candidate_urls(&self, path: &str) -> Vec<Url> {
        self.mirror_urls
            .iter()
            .filter_map(|base| join_mirror_url(base, path))
            .collect()
    }

    async fn race(&self, path: &str) -> Result<reqwest::Response, DistributorError> {
        let urls = self.candidate_urls(path);
        let response = self
            .fetcher
            .first_acceptable(&urls, HeaderMap::new(), |r| r.status().is_success())
            .await?;
        if !response.status().is_success() {
            return Err(DistributorError::BadStatus {
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ContentDistributor for MirrorDistributor {
    async fn fetch_latest_identifier(&self) -> Result<ContentId, DistributorError> {
        let response = self.race("index/latest").await?;
        let body = response.text().await?;
        ContentId::from_hex(&body)
    }

    async fn fetch_payload(&self, id: &ContentId) -> Result<PayloadReader, DistributorError> {
        let response = self.race(&format!("index/{}.sqlite", id)).await?;
        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(stream)))
    }
}
