// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! N-way candidate racing
//!
//! Issues the same request against several redundant mirror URLs at once and
//! returns the first response that passes an acceptance predicate, cancelling
//! the rest. Used for object metadata and index snapshot fetches, where any
//! single mirror may be down without the request having to fail.

use rand::Rng;
use reqwest::header::HeaderMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Errors from a candidate race
#[derive(Debug, Error)]
pub enum FetchError {
    /// The race was started with an empty candidate list
    #[error("no candidate urls specified")]
    NoCandidates,

    /// All candidates were cancelled before any completed
    #[error("race cancelled before any candidate completed")]
    Cancelled,

    /// The selected candidate failed at the transport level
    #[error("candidate request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// One outcome slot per competing candidate
struct RaceOutcome {
    index: usize,
    result: Result<reqwest::Response, reqwest::Error>,
}

/// Races GET requests across redundant mirror URLs
#[derive(Clone)]
pub struct RaceFetcher {
    client: reqwest::Client,
}

impl RaceFetcher {
    /// Create a new fetcher sharing the given HTTP client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `urls` concurrently and return the first response for which
    /// `accept` returns true. Losing candidates are cancelled as soon as a
    /// winner is selected.
    ///
    /// If every candidate completes without an accepted response, one
    /// rejected outcome is returned, chosen uniformly at random. Callers must
    /// handle that the returned response may carry a non-success status.
    pub async fn first_acceptable<F>(
        &self,
        urls: &[Url],
        headers: HeaderMap,
        accept: F,
    ) -> Result<reqwest::Response, FetchError>
    where
        F: Fn(&reqwest::Response) -> bool,
    {
        if urls.is_empty() {
            return Err(FetchError::NoCandidates);
        }
        debug!("racing {} candidate urls", urls.len());

        let root = CancellationToken::new();
        // Cancels every in-flight candidate if the caller stops waiting.
        let _root_guard = root.clone().drop_guard();

        // Capacity covers every candidate so senders never block.
        let (tx, mut rx) = mpsc::channel::<RaceOutcome>(urls.len());
        let mut tokens = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().cloned().enumerate() {
            let token = root.child_token();
            tokens.push(token.clone());
            let client = self.client.clone();
            let headers = headers.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = tokio::select! {
                    _ = token.cancelled() => return,
                    r = client.get(url).headers(headers).send() => r,
                };
                let _ = tx.send(RaceOutcome { index, result }).await;
            });
        }
        drop(tx);

        let mut rejected: Vec<RaceOutcome> = Vec::new();
        while let Some(outcome) = rx.recv().await {
            match &outcome.result {
                Ok(response) if accept(response) => {
                    debug!("selected response from candidate {}", outcome.index);
                    for (i, token) in tokens.iter().enumerate() {
                        if i != outcome.index {
                            token.cancel();
                        }
                    }
                    // Unused responses are dropped as their tasks finish.
                    return outcome.result.map_err(FetchError::Transport);
                }
                Ok(response) => {
                    debug!(
                        "candidate {} rejected with status {}",
                        outcome.index,
                        response.status()
                    );
                    rejected.push(outcome);
                }
                Err(e) => {
                    debug!("candidate {} failed: {}", outcome.index, e);
                    rejected.push(outcome);
                }
            }
        }

        if rejected.is_empty() {
            return Err(FetchError::Cancelled);
        }
        // Nothing was accepted. Return a rejected result chosen at random so
        // the caller still gets an answer rather than nothing.
        warn!("no candidate url produced an acceptable response");
        let i = rand::thread_rng().gen_range(0..rejected.len());
        rejected
            .swap_remove(i)
            .result
            .map_err(FetchError::Transport)
    }
}

/// Join a mirror base URL with a relative path, tolerating trailing slashes.
pub(crate) fn join_mirror_url(base: &Url, path: &str) -> Option<Url> {
    Url::parse(&format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
    .ok()
}
