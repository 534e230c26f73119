// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local index replication
//!
//! Everything needed to keep a read-only replica of the search index on
//! disk: the directory layout and naming convention ([`store`]), the
//! mirror-backed download path ([`distributor`]), and the background loop
//! that ties them together and publishes snapshots ([`sync`]).

pub mod distributor;
pub mod store;
pub mod sync;

pub use distributor::{ContentDistributor, ContentId, DistributorError, MirrorDistributor};
pub use store::{IndexStore, INDEX_FILENAME_PREFIX, TEMP_DOWNLOAD_PREFIX};
pub use sync::{IndexSnapshot, IndexSynchronizer, SnapshotReceiver, SyncError};
