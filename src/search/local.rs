// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local index query engine
//!
//! Serves search queries from the currently published snapshot of the
//! replicated FTS5 index. Each query opens its own read-only connection, so
//! concurrent queries never contend and the synchronizer never has to wait
//! on a reader to publish a new snapshot.

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Row};
use std::path::Path;
use tracing::{debug, warn};

use crate::link::LinkBuilder;
use crate::replica::sync::SnapshotReceiver;

use super::backend::SearchBackend;
use super::types::{SearchError, SearchQuery, SearchResponse, SearchResult};

/// Source tag for the local index replica
pub const LOCAL_INDEX_SOURCE_KEY: &str = "local_index";

/// Query engine over the replicated local index
pub struct LocalQueryEngine {
    snapshot: SnapshotReceiver,
    link_builder: LinkBuilder,
}

impl LocalQueryEngine {
    /// Create a new engine reading snapshots published by the synchronizer
    pub fn new(snapshot: SnapshotReceiver, link_builder: LinkBuilder) -> Self {
        Self {
            snapshot,
            link_builder,
        }
    }

    async fn query_index(
        &self,
        index_path: &Path,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, SearchError> {
        debug!("opening local index {}", index_path.display());
        let options = SqliteConnectOptions::new()
            .filename(index_path)
            .read_only(true);
        let mut conn = SqliteConnection::connect_with(&options).await?;

        let rows = sqlx::query(
            "SELECT prefix, creation_date, info_hash, info_name, path, length, rank \
             FROM upload_fts(?) LIMIT ? OFFSET ?",
        )
        .bind(escape_fts5_query(&query.term))
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&mut conn)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            match self.map_row(&row) {
                Ok(result) => results.push(result),
                Err(e) => {
                    // A malformed row must not abort the whole query.
                    warn!("skipping unmappable local index row: {}", e);
                }
            }
        }
        Ok(results)
    }

    fn map_row(&self, row: &sqlx::sqlite::SqliteRow) -> Result<SearchResult, sqlx::Error> {
        let prefix: String = row.try_get("prefix")?;
        let creation_date: i64 = row.try_get("creation_date")?;
        let info_hash: String = row.try_get("info_hash")?;
        let info_name: String = row.try_get("info_name")?;
        let path: String = row.try_get("path")?;
        let length: i64 = row.try_get("length")?;
        let rank: f64 = row.try_get("rank")?;

        let decoded = hex::decode(&info_hash).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        if decoded.len() != 20 {
            return Err(sqlx::Error::Decode(
                format!("info hash {:?} is not 20 bytes", info_hash).into(),
            ));
        }
        let last_modified = DateTime::from_timestamp(creation_date, 0)
            .ok_or_else(|| {
                sqlx::Error::Decode(format!("creation date {} out of range", creation_date).into())
            })?
            .to_rfc3339();

        Ok(SearchResult {
            hosted_on_replica: true,
            replica_link: self.link_builder.create_link(&info_hash, &prefix, &path),
            info_hash,
            torrent_internal_file_path: path.clone(),
            file_size: length,
            torrent_name: info_name,
            mime_types: vec![],
            last_modified,
            torrent_num_files: 1,
            display_name: path,
            swarm_metadata: None,
            upload_search_rank: rank,
            source_index: "replica".to_string(),
        })
    }
}

#[async_trait]
impl SearchBackend for LocalQueryEngine {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        // Block until the synchronizer has published at least one snapshot;
        // the arbitrator bounds this wait with the request deadline.
        let mut snapshot = self.snapshot.clone();
        let index_path = {
            let current = snapshot
                .wait_for(|s| s.is_some())
                .await
                .map_err(|_| SearchError::IndexNotReady)?;
            match current.as_ref() {
                Some(snapshot) => snapshot.path.clone(),
                None => return Err(SearchError::IndexNotReady),
            }
        };

        let results = self.query_index(&index_path, query).await?;
        Ok(SearchResponse {
            total_results: results.len(),
            results,
            start_index: query.offset,
            items_per_page: query.limit,
        })
    }

    fn name(&self) -> &'static str {
        LOCAL_INDEX_SOURCE_KEY
    }
}

/// Escape a raw search term for embedding in FTS5 query syntax.
///
/// The term is decomposed into alphanumeric tokens, each token is quoted
/// with internal quotes doubled, and the tokens are rejoined with spaces.
/// Embedded quotes or punctuation can therefore never escape the phrase.
pub fn escape_fts5_query(term: &str) -> String {
    term.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::sync::IndexSnapshot;
    use chrono::Utc;
    use std::path::PathBuf;
    use tokio::sync::watch;

    #[test]
    fn test_escape_plain_term() {
        assert_eq!(escape_fts5_query("bunnyfoofoo"), r#""bunnyfoofoo""#);
    }

    #[test]
    fn test_escape_embedded_quote() {
        assert_eq!(escape_fts5_query(r#"bunny"foofoo"#), r#""bunny" "foofoo""#);
    }

    #[test]
    fn test_escape_multiple_quotes() {
        assert_eq!(
            escape_fts5_query(r#"bunny"foo"foo"#),
            r#""bunny" "foo" "foo""#
        );
    }

    #[test]
    fn test_escape_punctuation_and_whitespace() {
        assert_eq!(escape_fts5_query("big bad,wolf!"), r#""big" "bad" "wolf""#);
    }

    async fn make_fixture_index(path: &Path) {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::query(
            "CREATE VIRTUAL TABLE upload_fts USING \
             fts5(prefix, creation_date, info_hash, info_name, path, length)",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        for (info_hash, info_name) in [
            ("00112233445566778899aabbccddeeff00112233", "bunny.mp4"),
            ("zz-not-hex", "bunny-broken.mp4"),
            ("ffeeddccbbaa99887766554433221100ffeeddcc", "unrelated.bin"),
        ] {
            sqlx::query(
                "INSERT INTO upload_fts (prefix, creation_date, info_hash, info_name, path, length) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind("prefix1")
            .bind(1660740254i64)
            .bind(info_hash)
            .bind(info_name)
            .bind(format!("dir/{}", info_name))
            .bind(1234i64)
            .execute(&mut conn)
            .await
            .unwrap();
        }
        conn.close().await.unwrap();
    }

    fn engine_for(path: PathBuf) -> (watch::Sender<Option<IndexSnapshot>>, LocalQueryEngine) {
        let (tx, rx) = watch::channel(Some(IndexSnapshot {
            path,
            published_at: Utc::now(),
        }));
        (tx, LocalQueryEngine::new(rx, LinkBuilder::new(vec![])))
    }

    #[tokio::test]
    async fn test_query_maps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.sqlite");
        make_fixture_index(&path).await;

        let (_tx, engine) = engine_for(path);
        let response = engine
            .search(&SearchQuery {
                term: "bunny.mp4".to_string(),
                limit: 20,
                offset: 0,
            })
            .await
            .unwrap();

        // The malformed info-hash row matches the term too, but is skipped.
        assert_eq!(response.results.len(), 1);
        let hit = &response.results[0];
        assert!(hit.hosted_on_replica);
        assert_eq!(hit.torrent_name, "bunny.mp4");
        assert_eq!(hit.torrent_internal_file_path, "dir/bunny.mp4");
        assert_eq!(hit.file_size, 1234);
        assert_eq!(hit.source_index, "replica");
        assert!(hit.replica_link.contains(&hit.info_hash));
        assert!(hit.last_modified.starts_with("2022-08-17"));
        assert_eq!(response.total_results, 1);
        assert_eq!(response.items_per_page, 20);
    }

    #[tokio::test]
    async fn test_query_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.sqlite");
        make_fixture_index(&path).await;

        let (_tx, engine) = engine_for(path);
        let response = engine
            .search(&SearchQuery {
                term: "dir".to_string(),
                limit: 1,
                offset: 0,
            })
            .await
            .unwrap();
        assert!(response.results.len() <= 1);
    }
}
