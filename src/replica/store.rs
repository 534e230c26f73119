// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local index directory management
//!
//! Published snapshots are named `replica-local-index-<timestamp>.sqlite`;
//! their `-wal`/`-shm` sidecars share the prefix. Both "find latest" and
//! "collect garbage" depend on this convention, and in-progress downloads
//! use a disjoint temp prefix so they are never collected mid-write.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Filename prefix of published index snapshots
pub const INDEX_FILENAME_PREFIX: &str = "replica-local-index";

/// Filename prefix of in-progress downloads, disjoint from the above
pub const TEMP_DOWNLOAD_PREFIX: &str = "index-download-";

/// Matches complete snapshot database files.
fn db_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!("{}-.*sqlite$", regex::escape(INDEX_FILENAME_PREFIX)))
            .expect("snapshot filename regex is valid")
    })
}

/// Matches database files and their sidecar files.
fn related_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!("{}-.*sqlite", regex::escape(INDEX_FILENAME_PREFIX)))
            .expect("snapshot filename regex is valid")
    })
}

/// Manages the on-disk directory of index snapshot files
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    /// Create a store over the given directory
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The managed directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name a snapshot published at `at` gets
    pub fn published_file_name(at: DateTime<Utc>) -> String {
        format!(
            "{}-{}.sqlite",
            INDEX_FILENAME_PREFIX,
            at.format("%Y%m%d-%H%M%S")
        )
    }

    /// List the base names of all complete snapshot files
    pub fn list_all_indexes(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if db_file_regex().is_match(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Base name of the latest snapshot, if any
    pub fn latest_index(&self) -> io::Result<Option<String>> {
        let mut names = self.list_all_indexes()?;
        names.sort();
        Ok(names.pop())
    }

    /// Delete every snapshot-related file that does not belong to
    /// `current`. Deletion is best-effort; the current snapshot and its
    /// sidecars are never touched, and neither are temp downloads (their
    /// prefix does not match the convention).
    pub fn delete_unused_index_files(&self, current: Option<&str>) -> io::Result<()> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !related_file_regex().is_match(&name) {
                continue;
            }
            if let Some(current) = current {
                if name.starts_with(current) {
                    // This file belongs to the current index.
                    continue;
                }
            }
            debug!("removing unused index file {}", name);
            let _ = fs::remove_file(entry.path());
        }
        Ok(())
    }

    /// Move a completed download into the directory under its final name.
    ///
    /// Rename first; a copy+delete fallback covers moves across
    /// filesystems, where rename fails with `EXDEV`.
    pub fn install(&self, staged: &Path, file_name: &str) -> io::Result<PathBuf> {
        let dest = self.dir.join(file_name);
        if fs::rename(staged, &dest).is_err() {
            fs::copy(staged, &dest)?;
            fs::remove_file(staged)?;
        }
        Ok(dest)
    }
}
