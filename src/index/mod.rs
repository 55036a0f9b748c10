//! # Index Engine
//!
//! A prefix-sharded index from record id to the page file holding the
//! record. Ids shard by their first
//! [`INDEX_PREFIX_LENGTH`](crate::config::INDEX_PREFIX_LENGTH) characters;
//! each prefix owns an ordered *chain* of index files listed in
//! `indexes.json`, and new entries always land in the chain's tail.
//!
//! ## Growth
//!
//! During a batched insert the tail of each touched prefix is loaded once.
//! When a tail crosses `max_entries` it is flushed and a fresh file is
//! appended to the chain; the in-memory bucket is dropped so later ids of
//! the same prefix reload from the new, empty tail. A tail is therefore
//! never more than one entry over the cap.
//!
//! ## Shrinkage
//!
//! Batched deletes rewrite each touched chain file once; a file left empty
//! is removed from the chain (and the chain from `indexes.json`) through
//! the blob manager's rollback-safe deletion.

use std::sync::Arc;

use eyre::Result;
use hashbrown::HashMap;

use crate::config::{INDEX_PREFIX_LENGTH, MAX_INDEX_SIZE};
use crate::disk::BlobDisk;
use crate::schema::IndexData;

/// Shards an id by its leading characters.
pub(crate) fn id_prefix(record_id: &str) -> &str {
    &record_id[..INDEX_PREFIX_LENGTH.min(record_id.len())]
}

/// Batched operations over a blob's prefix-sharded id index.
#[derive(Debug)]
pub struct IndexEngine {
    disk: Arc<BlobDisk>,
    max_entries: usize,
}

impl IndexEngine {
    pub fn new(disk: Arc<BlobDisk>) -> Self {
        Self::with_max_entries(disk, MAX_INDEX_SIZE)
    }

    /// Overrides the per-file entry cap; boundary tests and tuned
    /// deployments use this, everything else sticks with the default.
    pub fn with_max_entries(disk: Arc<BlobDisk>, max_entries: usize) -> Self {
        Self { disk, max_entries }
    }

    /// Inserts a batch of `record id → page file` entries.
    pub fn add_entries(&self, db: &str, blob: &str, batch: &IndexData) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let chains = self.disk.prefix_chains(db, blob)?;
        let mut tails: HashMap<String, String> = chains
            .iter()
            .filter_map(|(prefix, chain)| {
                chain
                    .file_names
                    .last()
                    .map(|tail| (prefix.clone(), tail.clone()))
            })
            .collect();
        let mut buckets: HashMap<String, IndexData> = HashMap::new();

        for (record_id, page_file) in batch {
            let prefix = id_prefix(record_id).to_string();
            if !buckets.contains_key(&prefix) {
                let data = match tails.get(&prefix) {
                    Some(tail) => self.disk.index_data(db, blob, tail)?,
                    None => {
                        let tail = self.disk.create_index_file(db, blob, &prefix)?;
                        tails.insert(prefix.clone(), tail);
                        IndexData::default()
                    }
                };
                buckets.insert(prefix.clone(), data);
            }
            let bucket = buckets.get_mut(&prefix).expect("bucket was just ensured");
            bucket.insert(record_id.clone(), page_file.clone());

            if bucket.len() > self.max_entries {
                let tail = tails.get(&prefix).expect("tail exists for loaded bucket");
                self.disk.write_index_data(db, blob, tail, bucket)?;
                let new_tail = self.disk.create_index_file(db, blob, &prefix)?;
                tails.insert(prefix.clone(), new_tail);
                buckets.remove(&prefix);
            }
        }

        for (prefix, bucket) in &buckets {
            let tail = tails.get(prefix).expect("tail exists for loaded bucket");
            self.disk.write_index_data(db, blob, tail, bucket)?;
        }
        Ok(())
    }

    /// Walks the id's prefix chain in order and returns the first hit as
    /// `(index file, page file)`.
    pub fn find_entry(&self, db: &str, blob: &str, record_id: &str) -> Result<Option<(String, String)>> {
        let chains = self.disk.prefix_chains(db, blob)?;
        let Some(chain) = chains.get(id_prefix(record_id)) else {
            return Ok(None);
        };
        for file_name in &chain.file_names {
            let data = self.disk.index_data(db, blob, file_name)?;
            if let Some(page_file) = data.get(record_id) {
                return Ok(Some((file_name.clone(), page_file.clone())));
            }
        }
        Ok(None)
    }

    /// Removes a batch of ids. Each touched chain file is loaded and
    /// rewritten once; files left empty are deleted. Ids without an index
    /// entry are ignored.
    pub fn remove_ids(&self, db: &str, blob: &str, record_ids: &[String]) -> Result<()> {
        if record_ids.is_empty() {
            return Ok(());
        }
        let mut by_prefix: HashMap<&str, Vec<&str>> = HashMap::new();
        for record_id in record_ids {
            by_prefix
                .entry(id_prefix(record_id))
                .or_default()
                .push(record_id.as_str());
        }

        let chains = self.disk.prefix_chains(db, blob)?;
        for (prefix, ids) in by_prefix {
            let Some(chain) = chains.get(prefix) else {
                continue;
            };
            let mut remaining = ids.len();
            for file_name in &chain.file_names {
                if remaining == 0 {
                    break;
                }
                let mut data = self.disk.index_data(db, blob, file_name)?;
                let before = data.len();
                for id in &ids {
                    if data.remove(*id).is_some() {
                        remaining -= 1;
                    }
                }
                if data.len() == before {
                    continue;
                }
                if data.is_empty() {
                    self.disk.delete_index_file(db, blob, file_name)?;
                } else {
                    self.disk.write_index_data(db, blob, file_name, &data)?;
                }
            }
        }
        Ok(())
    }
}
