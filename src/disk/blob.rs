//! # Blob Disk Manager
//!
//! Owns the on-disk life-cycle of a blob: the scaffold (`format.json`,
//! `pages.json` + `pages/`, `indexes.json` + `indexes/`), the page files,
//! and the index files.
//!
//! ## Rollback policy
//!
//! Multi-file sequences always restore the pre-call state on failure:
//!
//! - blob creation deletes the half-built blob directory,
//! - page/index-file creation removes the orphan file when registering it
//!   in the parent artifact fails,
//! - page/index-file deletion restores the parent entry when unlinking the
//!   file fails after the parent was rewritten.
//!
//! A rollback that itself fails aborts the process: the metadata artifacts
//! no longer agree with the directory contents and nothing above this layer
//! can fix that.
//!
//! ## Locking
//!
//! A single mutex serializes every read-modify-write of `pages.json` and
//! `indexes.json` (and, through [`PartitionDisk`](crate::disk::PartitionDisk),
//! of hash-key chain files). Scan workers delete emptied pages in parallel;
//! without the lock two workers would race on the page list and one removal
//! would be lost. The lock is per-operation infrastructure only; writers of
//! the *same blob across operations* are still assumed to be serialized
//! externally.

use eyre::Result;
use log::{info, warn};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::disk::{fatal, io, layout, PathLayout};
use crate::schema::{Format, IndexData, PageData};

/// One entry of `pages.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageItem {
    #[serde(rename = "fileName")]
    pub file_name: String,
}

/// One prefix's chain of index files inside `indexes.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixChain {
    #[serde(rename = "fileNames")]
    pub file_names: Vec<String>,
}

pub type PrefixChains = hashbrown::HashMap<String, PrefixChain>;

/// Disk manager for blob directories, page files, and index files.
#[derive(Debug)]
pub struct BlobDisk {
    layout: PathLayout,
    meta_lock: Mutex<()>,
}

impl BlobDisk {
    pub fn new(layout: PathLayout) -> Self {
        Self {
            layout,
            meta_lock: Mutex::new(()),
        }
    }

    pub(crate) fn lock_meta(&self) -> MutexGuard<'_, ()> {
        self.meta_lock.lock()
    }

    // ------------------------------------------------------------------
    // blob scaffold
    // ------------------------------------------------------------------

    /// Creates the blob directory and its scaffold. On any scaffold
    /// failure the whole directory is rolled back and the original error
    /// surfaces.
    pub fn create_blob(&self, db: &str, blob: &str, format: &Format) -> Result<()> {
        io::create_dir(&self.layout.blob_dir(db, blob))?;
        let scaffold = self
            .create_format_file(db, blob, format)
            .and_then(|()| self.create_pages_scaffold(db, blob))
            .and_then(|()| self.create_indexes_scaffold(db, blob));
        if let Err(err) = scaffold {
            warn!("failed to create blob {db}/{blob}, rolling back: {err:#}");
            if let Err(rollback_err) = self.delete_blob(db, blob) {
                fatal(&format!("removing half-built blob {db}/{blob}"), &rollback_err);
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn delete_blob(&self, db: &str, blob: &str) -> Result<()> {
        info!("deleting blob {db}/{blob}");
        io::remove_dir_all(&self.layout.blob_dir(db, blob))
    }

    pub fn blob_exists(&self, db: &str, blob: &str) -> bool {
        io::exists(&self.layout.blob_dir(db, blob))
    }

    pub(crate) fn create_format_file(&self, db: &str, blob: &str, format: &Format) -> Result<()> {
        io::create_json(&self.layout.format_file(db, blob), format)
    }

    pub(crate) fn create_pages_scaffold(&self, db: &str, blob: &str) -> Result<()> {
        io::create_json(&self.layout.pages_file(db, blob), &Vec::<PageItem>::new())?;
        io::create_dir(&self.layout.pages_dir(db, blob))
    }

    pub(crate) fn create_indexes_scaffold(&self, db: &str, blob: &str) -> Result<()> {
        io::create_json(&self.layout.indexes_file(db, blob), &PrefixChains::default())?;
        io::create_dir(&self.layout.indexes_dir(db, blob))
    }

    // ------------------------------------------------------------------
    // metadata artifacts
    // ------------------------------------------------------------------

    pub fn format(&self, db: &str, blob: &str) -> Result<Format> {
        io::read_json(&self.layout.format_file(db, blob))
    }

    pub fn page_items(&self, db: &str, blob: &str) -> Result<Vec<PageItem>> {
        io::read_json(&self.layout.pages_file(db, blob))
    }

    pub fn prefix_chains(&self, db: &str, blob: &str) -> Result<PrefixChains> {
        io::read_json(&self.layout.indexes_file(db, blob))
    }

    pub(crate) fn write_pages_file(&self, db: &str, blob: &str, items: &[PageItem]) -> Result<()> {
        io::write_json(&self.layout.pages_file(db, blob), &items)
    }

    pub(crate) fn write_prefix_chains(
        &self,
        db: &str,
        blob: &str,
        chains: &PrefixChains,
    ) -> Result<()> {
        io::write_json(&self.layout.indexes_file(db, blob), chains)
    }

    // ------------------------------------------------------------------
    // page files
    // ------------------------------------------------------------------

    /// Allocates an empty page file and registers it at the end of
    /// `pages.json`.
    pub fn create_page(&self, db: &str, blob: &str) -> Result<PageItem> {
        let _guard = self.lock_meta();
        self.create_page_locked(db, blob)
    }

    fn create_page_locked(&self, db: &str, blob: &str) -> Result<PageItem> {
        let mut items = self.page_items(db, blob)?;
        let item = PageItem {
            file_name: layout::new_page_name(),
        };
        let page_path = self.layout.blob_file(db, blob, &item.file_name);
        io::create_json(&page_path, &PageData::default())?;
        items.push(item.clone());
        if let Err(err) = self.write_pages_file(db, blob, &items) {
            warn!(
                "failed to register page {} in {db}/{blob}, rolling back: {err:#}",
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
        Ok(item)
    }

    pub fn page_data(&self, db: &str, blob: &str, file_name: &str) -> Result<PageData> {
        io::read_json(&self.layout.blob_file(db, blob, file_name))
    }

    pub fn write_page_data(
        &self,
        db: &str,
        blob: &str,
        file_name: &str,
        data: &PageData,
    ) -> Result<()> {
        io::write_json(&self.layout.blob_file(db, blob, file_name), data)
    }

    /// Unregisters a page from `pages.json` and unlinks its file. When the
    /// unlink fails the registration is restored.
    pub fn delete_page(&self, db: &str, blob: &str, file_name: &str) -> Result<()> {
        let _guard = self.lock_meta();
        self.delete_page_locked(db, blob, file_name)
    }

    pub(crate) fn delete_page_locked(&self, db: &str, blob: &str, file_name: &str) -> Result<()> {
        let mut items = self.page_items(db, blob)?;
        let position = items
            .iter()
            .position(|item| item.file_name == file_name)
            .ok_or_else(|| {
                crate::error::not_found(format!("page {file_name} in blob {db}/{blob}"))
            })?;
        let removed = items.remove(position);
        self.write_pages_file(db, blob, &items)?;
        if let Err(err) = io::remove_file(&self.layout.blob_file(db, blob, file_name)) {
            warn!("failed to unlink page {file_name} in {db}/{blob}, restoring entry: {err:#}");
            items.push(removed);
            if let Err(rollback_err) = self.write_pages_file(db, blob, &items) {
                fatal(
                    &format!("restoring page entry {file_name} in {db}/{blob}"),
                    &rollback_err,
                );
            }
            return Err(err);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // index files
    // ------------------------------------------------------------------

    /// Allocates an empty index file and appends it to the prefix's chain,
    /// creating the chain if this is the prefix's first file. Returns the
    /// new file's blob-relative name.
    pub fn create_index_file(&self, db: &str, blob: &str, prefix: &str) -> Result<String> {
        let _guard = self.lock_meta();
        let mut chains = self.prefix_chains(db, blob)?;
        let file_name = layout::new_index_name();
        let index_path = self.layout.blob_file(db, blob, &file_name);
        io::create_json(&index_path, &IndexData::default())?;
        chains
            .entry(prefix.to_string())
            .or_default()
            .file_names
            .push(file_name.clone());
        if let Err(err) = self.write_prefix_chains(db, blob, &chains) {
            warn!(
                "failed to register index file {file_name} in {db}/{blob}, rolling back: {err:#}"
            );
            if let Err(rollback_err) = io::remove_file(&index_path) {
                fatal(
                    &format!("removing orphan index file {file_name} in {db}/{blob}"),
                    &rollback_err,
                );
            }
            return Err(err);
        }
        Ok(file_name)
    }

    pub fn index_data(&self, db: &str, blob: &str, file_name: &str) -> Result<IndexData> {
        io::read_json(&self.layout.blob_file(db, blob, file_name))
    }

    pub fn write_index_data(
        &self,
        db: &str,
        blob: &str,
        file_name: &str,
        data: &IndexData,
    ) -> Result<()> {
        io::write_json(&self.layout.blob_file(db, blob, file_name), data)
    }

    /// Removes an index file from its prefix chain and unlinks it. A chain
    /// left empty is dropped from `indexes.json` entirely.
    pub fn delete_index_file(&self, db: &str, blob: &str, file_name: &str) -> Result<()> {
        let _guard = self.lock_meta();
        let mut chains = self.prefix_chains(db, blob)?;
        let prefix = chains
            .iter()
            .find(|(_, chain)| chain.file_names.iter().any(|name| name == file_name))
            .map(|(prefix, _)| prefix.clone())
            .ok_or_else(|| {
                crate::error::not_found(format!("index file {file_name} in blob {db}/{blob}"))
            })?;
        let chain = chains.get_mut(&prefix).expect("prefix was just found");
        chain.file_names.retain(|name| name != file_name);
        if chain.file_names.is_empty() {
            chains.remove(&prefix);
        }
        self.write_prefix_chains(db, blob, &chains)?;
        if let Err(err) = io::remove_file(&self.layout.blob_file(db, blob, file_name)) {
            warn!(
                "failed to unlink index file {file_name} in {db}/{blob}, restoring entry: {err:#}"
            );
            chains
                .entry(prefix)
                .or_default()
                .file_names
                .push(file_name.to_string());
            if let Err(rollback_err) = self.write_prefix_chains(db, blob, &chains) {
                fatal(
                    &format!("restoring index entry {file_name} in {db}/{blob}"),
                    &rollback_err,
                );
            }
            return Err(err);
        }
        Ok(())
    }
}
