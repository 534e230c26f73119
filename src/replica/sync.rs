// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Background index synchronization
//!
//! A long-lived task polls the content distributor for a new index version,
//! downloads it fully to a staging file, atomically installs it under the
//! published naming convention, swaps the shared current-snapshot handle,
//! and collects superseded files. Failed cycles retry on half the normal
//! interval; cycles never overlap.

use chrono::{DateTime, Utc};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::distributor::{ContentDistributor, ContentId, DistributorError};
use super::store::{IndexStore, TEMP_DOWNLOAD_PREFIX};

/// One immutable, fully-downloaded copy of the local search index
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    /// Path of the snapshot database file
    pub path: PathBuf,
    /// When the snapshot became current
    pub published_at: DateTime<Utc>,
}

/// Read side of the shared current-snapshot handle.
///
/// Written exactly once per publish by the synchronizer; any number of
/// concurrent queries read it without blocking the writer.
pub type SnapshotReceiver = watch::Receiver<Option<IndexSnapshot>>;

/// Errors that abort one synchronization cycle
#[derive(Debug, Error)]
pub enum SyncError {
    /// The content distribution layer failed
    #[error("content distributor: {0}")]
    Distributor(#[from] DistributorError),

    /// Staging or installing the snapshot failed
    #[error("index file io: {0}")]
    Io(#[from] io::Error),
}

/// Result of one successful synchronization cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The latest identifier matches the last synchronized one
    NoChange,
    /// A new snapshot was downloaded and published
    Published,
}

/// Keeps the local index replica up to date in the background
pub struct IndexSynchronizer {
    distributor: Arc<dyn ContentDistributor>,
    store: IndexStore,
    poll_interval: Duration,
    current_tx: watch::Sender<Option<IndexSnapshot>>,
    last_synced: Option<ContentId>,
}

impl IndexSynchronizer {
    /// Create a synchronizer and the snapshot handle queries read from
    pub fn new(
        distributor: Arc<dyn ContentDistributor>,
        store: IndexStore,
        poll_interval: Duration,
    ) -> (Self, SnapshotReceiver) {
        let (current_tx, current_rx) = watch::channel(None);
        (
            Self {
                distributor,
                store,
                poll_interval,
                current_tx,
                last_synced: None,
            },
            current_rx,
        )
    }

    /// Run the synchronization loop on its own task until `shutdown` fires
    pub fn spawn(mut self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(&mut self, shutdown: CancellationToken) {
        // Become usable before the first network round-trip completes.
        if let Err(e) = self.adopt_existing_snapshot() {
            warn!("scanning index directory for existing snapshots: {}", e);
        }

        loop {
            let cycle = tokio::select! {
                _ = shutdown.cancelled() => return,
                outcome = tokio::time::timeout(self.poll_interval, self.run_cycle()) => outcome,
            };
            let sleep_for = match cycle {
                Ok(Ok(CycleOutcome::NoChange)) => {
                    debug!(
                        "no new index since {:?}, checking again in {:?}",
                        self.last_synced, self.poll_interval
                    );
                    self.poll_interval
                }
                Ok(Ok(CycleOutcome::Published)) => {
                    info!("local index up to date, checking again in {:?}", self.poll_interval);
                    self.poll_interval
                }
                Ok(Err(e)) => {
                    // Ignorable: retry on a shortened interval.
                    debug!("ignorable error while synchronizing local index: {}", e);
                    self.poll_interval / 2
                }
                Err(_) => {
                    debug!("index synchronization cycle timed out");
                    self.poll_interval / 2
                }
            };
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    /// Publish the latest fully-downloaded snapshot already on disk, if any,
    /// and clean up whatever else the previous run left behind.
    fn adopt_existing_snapshot(&self) -> io::Result<()> {
        let latest = self.store.latest_index()?;
        self.store.delete_unused_index_files(latest.as_deref())?;
        if let Some(name) = latest {
            let path = self.store.dir().join(&name);
            info!("adopting previously downloaded local index {}", path.display());
            self.current_tx.send_replace(Some(IndexSnapshot {
                path,
                published_at: Utc::now(),
            }));
        }
        Ok(())
    }

    /// One synchronization cycle: check, download, publish, collect.
    async fn run_cycle(&mut self) -> Result<CycleOutcome, SyncError> {
        debug!("checking for a new local index snapshot");
        let id = self.distributor.fetch_latest_identifier().await?;
        if self.last_synced == Some(id) {
            return Ok(CycleOutcome::NoChange);
        }
        info!("downloading local index snapshot {}", id);

        // Stage in the index directory so the final rename stays on one
        // filesystem. The temp path cleans itself up if the copy fails.
        let mut reader = self.distributor.fetch_payload(&id).await?;
        let staged = tempfile::Builder::new()
            .prefix(TEMP_DOWNLOAD_PREFIX)
            .tempfile_in(self.store.dir())?
            .into_temp_path();
        let mut file = tokio::fs::File::create(&staged).await?;
        tokio::io::copy(&mut reader, &mut file).await?;
        file.sync_all().await?;
        drop(file);

        let published_at = Utc::now();
        let file_name = IndexStore::published_file_name(published_at);
        let path = self.store.install(&staged, &file_name)?;

        // Swap the handle only after the file is complete and in place, so
        // no reader can ever observe a partially written snapshot.
        self.current_tx.send_replace(Some(IndexSnapshot {
            path: path.clone(),
            published_at,
        }));
        self.last_synced = Some(id);
        info!("published local index snapshot {}", path.display());

        if let Err(e) = self.store.delete_unused_index_files(Some(&file_name)) {
            warn!("collecting superseded index files: {}", e);
        }
        Ok(CycleOutcome::Published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::replica::distributor::PayloadReader;
    use crate::replica::store::INDEX_FILENAME_PREFIX;

    struct FakeDistributor {
        id: Mutex<ContentId>,
        payload: Vec<u8>,
        payload_fetches: AtomicUsize,
        fail_identifier: bool,
    }

    impl FakeDistributor {
        fn new(id_hex: &str, payload: &[u8]) -> Self {
            Self {
                id: Mutex::new(ContentId::from_hex(id_hex).unwrap()),
                payload: payload.to_vec(),
                payload_fetches: AtomicUsize::new(0),
                fail_identifier: false,
            }
        }
    }

    #[async_trait]
    impl ContentDistributor for FakeDistributor {
        async fn fetch_latest_identifier(&self) -> Result<ContentId, DistributorError> {
            if self.fail_identifier {
                return Err(DistributorError::InvalidIdentifier("down".to_string()));
            }
            Ok(*self.id.lock().unwrap())
        }

        async fn fetch_payload(&self, _id: &ContentId) -> Result<PayloadReader, DistributorError> {
            self.payload_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(std::io::Cursor::new(self.payload.clone())))
        }
    }

    const ID_A: &str = "00112233445566778899aabbccddeeff00112233";
    const ID_B: &str = "ffeeddccbbaa99887766554433221100ffeeddcc";

    #[tokio::test]
    async fn test_first_cycle_publishes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let distributor = Arc::new(FakeDistributor::new(ID_A, b"index bytes"));
        let (mut sync, rx) = IndexSynchronizer::new(
            distributor.clone(),
            IndexStore::new(dir.path().to_path_buf()),
            Duration::from_secs(60),
        );

        assert!(rx.borrow().is_none());
        let outcome = sync.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Published);

        let snapshot = rx.borrow().clone().unwrap();
        assert!(snapshot
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(INDEX_FILENAME_PREFIX));
        assert_eq!(fs::read(&snapshot.path).unwrap(), b"index bytes");
    }

    #[tokio::test]
    async fn test_unchanged_identifier_downloads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let distributor = Arc::new(FakeDistributor::new(ID_A, b"index bytes"));
        let (mut sync, _rx) = IndexSynchronizer::new(
            distributor.clone(),
            IndexStore::new(dir.path().to_path_buf()),
            Duration::from_secs(60),
        );

        assert_eq!(sync.run_cycle().await.unwrap(), CycleOutcome::Published);
        assert_eq!(sync.run_cycle().await.unwrap(), CycleOutcome::NoChange);
        assert_eq!(distributor.payload_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_new_identifier_supersedes_old_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let distributor = Arc::new(FakeDistributor::new(ID_A, b"v1"));
        let (mut sync, rx) = IndexSynchronizer::new(
            distributor.clone(),
            IndexStore::new(dir.path().to_path_buf()),
            Duration::from_secs(60),
        );

        sync.run_cycle().await.unwrap();
        let first = rx.borrow().clone().unwrap();

        // Publishing happens at second granularity; make sure the second
        // snapshot gets a later name.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        *distributor.id.lock().unwrap() = ContentId::from_hex(ID_B).unwrap();
        assert_eq!(sync.run_cycle().await.unwrap(), CycleOutcome::Published);

        let second = rx.borrow().clone().unwrap();
        assert_ne!(first.path, second.path);
        assert!(!first.path.exists());
        assert!(second.path.exists());

        let store = IndexStore::new(dir.path().to_path_buf());
        assert_eq!(store.list_all_indexes().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_identifier_fetch_aborts_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut distributor = FakeDistributor::new(ID_A, b"index bytes");
        distributor.fail_identifier = true;
        let (mut sync, rx) = IndexSynchronizer::new(
            Arc::new(distributor),
            IndexStore::new(dir.path().to_path_buf()),
            Duration::from_secs(60),
        );

        assert!(sync.run_cycle().await.is_err());
        assert!(rx.borrow().is_none());
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_startup_adopts_latest_snapshot_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "replica-local-index-20220629-090105.sqlite",
            "replica-local-index-20220817-124414.sqlite",
            "replica-local-index-20220629-090105.sqlite-wal",
        ] {
            fs::write(dir.path().join(name), b"old").unwrap();
        }

        let (sync, rx) = IndexSynchronizer::new(
            Arc::new(FakeDistributor::new(ID_A, b"unused")),
            IndexStore::new(dir.path().to_path_buf()),
            Duration::from_secs(60),
        );
        sync.adopt_existing_snapshot().unwrap();

        let adopted = rx.borrow().clone().unwrap();
        assert_eq!(
            adopted.path.file_name().unwrap().to_string_lossy(),
            "replica-local-index-20220817-124414.sqlite"
        );
        // Everything except the adopted snapshot was collected.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
