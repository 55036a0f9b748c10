//! # Partition Disk Manager
//!
//! Adds the partition artifacts on top of [`BlobDisk`]: the
//! `partitions.json` key declaration, the `partitions/` hash-key directory,
//! and the per-hash-key chain files that own page chains. Page files
//! themselves still live under `pages/` and stay registered in
//! `pages.json`, so full scans need no partition awareness.
//!
//! The blob manager is shared by `Arc`; chain mutations take its metadata
//! lock so a hash-key chain rewrite and the page-list rewrite it implies
//! happen under one critical section.

use std::sync::Arc;

use eyre::Result;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::disk::{fatal, io, layout, BlobDisk, PageItem, PathLayout};
use crate::schema::{Format, PageData, Partition};

/// Contents of one `partitions/<hashkey>.json` chain file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashKeyChain {
    #[serde(rename = "fileNames")]
    pub file_names: Vec<String>,
}

/// Disk manager for partitioned blobs.
#[derive(Debug)]
pub struct PartitionDisk {
    layout: PathLayout,
    blob: Arc<BlobDisk>,
}

impl PartitionDisk {
    pub fn new(layout: PathLayout, blob: Arc<BlobDisk>) -> Self {
        Self { layout, blob }
    }

    // ------------------------------------------------------------------
    // partition scaffold
    // ------------------------------------------------------------------

    /// Creates a partitioned blob: format, partition declaration and
    /// hash-key directory, then the shared pages/indexes scaffold. Any
    /// failure rolls the whole blob directory back.
    pub fn create_partition(
        &self,
        db: &str,
        blob: &str,
        format: &Format,
        partition: &Partition,
    ) -> Result<()> {
        io::create_dir(&self.layout.blob_dir(db, blob))?;
        let scaffold = self
            .blob
            .create_format_file(db, blob, format)
            .and_then(|()| self.create_partitions_scaffold(db, blob, partition))
            .and_then(|()| self.blob.create_pages_scaffold(db, blob))
            .and_then(|()| self.blob.create_indexes_scaffold(db, blob));
        if let Err(err) = scaffold {
            warn!("failed to create partition {db}/{blob}, rolling back: {err:#}");
            if let Err(rollback_err) = self.blob.delete_blob(db, blob) {
                fatal(
                    &format!("removing half-built partition {db}/{blob}"),
                    &rollback_err,
                );
            }
            return Err(err);
        }
        Ok(())
    }

    fn create_partitions_scaffold(&self, db: &str, blob: &str, partition: &Partition) -> Result<()> {
        io::create_json(&self.layout.partitions_file(db, blob), partition)?;
        io::create_dir(&self.layout.partitions_dir(db, blob))
    }

    pub fn partition(&self, db: &str, blob: &str) -> Result<Partition> {
        io::read_json(&self.layout.partitions_file(db, blob))
    }

    /// A blob is partitioned exactly when its `partitions.json` exists.
    pub fn is_partition(&self, db: &str, blob: &str) -> bool {
        io::exists(&self.layout.partitions_file(db, blob))
    }

    // ------------------------------------------------------------------
    // hash-key directory
    // ------------------------------------------------------------------

    /// Creates an empty chain file for a hash key seen for the first time.
    pub fn create_hash_key_item(&self, db: &str, blob: &str, hash_key: &str) -> Result<()> {
        io::create_json(
            &self.layout.hash_key_file(db, blob, hash_key),
            &HashKeyChain::default(),
        )
    }

    pub fn hash_key_chain(&self, db: &str, blob: &str, hash_key: &str) -> Result<HashKeyChain> {
        io::read_json(&self.layout.hash_key_file(db, blob, hash_key))
    }

    fn write_hash_key_chain(
        &self,
        db: &str,
        blob: &str,
        hash_key: &str,
        chain: &HashKeyChain,
    ) -> Result<()> {
        io::write_json(&self.layout.hash_key_file(db, blob, hash_key), chain)
    }

    /// Hash-key file names under `partitions/`, verbatim (`<hashkey>.json`).
    pub fn list_hash_key_files(&self, db: &str, blob: &str) -> Result<Vec<String>> {
        io::list_file_names(&self.layout.partitions_dir(db, blob))
    }

    // ------------------------------------------------------------------
    // hash-key page chains
    // ------------------------------------------------------------------

    /// Allocates a page file owned by a hash key: the new page is appended
    /// to the hash-key chain and to the blob's `pages.json`. Failures roll
    /// back whatever part already landed.
    pub fn create_hash_key_page(&self, db: &str, blob: &str, hash_key: &str) -> Result<PageItem> {
        let _guard = self.blob.lock_meta();
        let mut chain = self.hash_key_chain(db, blob, hash_key)?;
        let mut page_items = self.blob.page_items(db, blob)?;

        let item = PageItem {
            file_name: layout::new_page_name(),
        };
        let page_path = self.layout.blob_file(db, blob, &item.file_name);
        io::create_json(&page_path, &PageData::default())?;

        chain.file_names.push(item.file_name.clone());
        if let Err(err) = self.write_hash_key_chain(db, blob, hash_key, &chain) {
            warn!(
                "failed to chain page {} under hash key {hash_key} in {db}/{blob}, rolling back: {err:#}",
                item.file_name
            );
            if let Err(rollback_err) = io::remove_file(&page_path) {
                fatal(
                    &format!("removing orphan page {} in {db}/{blob}", item.file_name),
                    &rollback_err,
                );
            }
            return Err(err);
        }

        page_items.push(item.clone());
        if let Err(err) = self.blob.write_pages_file(db, blob, &page_items) {
            warn!(
                "failed to register page {} in {db}/{blob}, rolling back: {err:#}",
                item.file_name
            );
            chain.file_names.pop();
            let unchain = self.write_hash_key_chain(db, blob, hash_key, &chain);
            if let Err(rollback_err) = unchain.and_then(|()| io::remove_file(&page_path)) {
                fatal(
                    &format!("unchaining page {} in {db}/{blob}", item.file_name),
                    &rollback_err,
                );
            }
            return Err(err);
        }
        Ok(item)
    }

    /// Removes a page from its hash-key chain, then from `pages.json` and
    /// disk via the blob manager's page deletion.
    pub fn delete_partition_page(
        &self,
        db: &str,
        blob: &str,
        hash_key: &str,
        file_name: &str,
    ) -> Result<()> {
        let _guard = self.blob.lock_meta();
        let mut chain = self.hash_key_chain(db, blob, hash_key)?;
        let position = chain
            .file_names
            .iter()
            .position(|name| name == file_name)
            .ok_or_else(|| {
                crate::error::not_found(format!(
                    "page {file_name} under hash key {hash_key} in blob {db}/{blob}"
                ))
            })?;
        chain.file_names.remove(position);
        self.write_hash_key_chain(db, blob, hash_key, &chain)?;

        if let Err(err) = self.blob.delete_page_locked(db, blob, file_name) {
            warn!(
                "failed to delete chained page {file_name} in {db}/{blob}, restoring chain: {err:#}"
            );
            chain.file_names.push(file_name.to_string());
            if let Err(rollback_err) = self.write_hash_key_chain(db, blob, hash_key, &chain) {
                fatal(
                    &format!("restoring chain entry {file_name} under {hash_key} in {db}/{blob}"),
                    &rollback_err,
                );
            }
            return Err(err);
        }
        Ok(())
    }
}
