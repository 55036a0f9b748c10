//! # Partition Store
//!
//! Operations on partitioned blobs. Inserts hash every record's partition
//! columns and group records by hash key, so each group lands in the page
//! chain owned by its key; two records with different hash keys never
//! share a page. Scans prune the hash-key directory before touching any
//! page: a partition search value hashes to the same 28-byte segment the
//! insert produced, and the segment's fixed offset inside the hash-key
//! file name makes pruning a byte-slice comparison.

use std::sync::Arc;

use eyre::Result;
use hashbrown::HashMap;
use uuid::Uuid;

use crate::config::MAX_PAGE_SIZE;
use crate::disk::{layout, BlobDisk, HashKeyChain, PartitionDisk};
use crate::error::{is_not_found, not_found};
use crate::filter::{Filter, FilterItem};
use crate::index::IndexEngine;
use crate::schema::{
    coerce_value, format_record, format_update_record, hash_segment, render_value, Blob, Format,
    IndexData, PageData, Partition, Record, HASH_SEGMENT_LEN,
};
use crate::store::{
    collect_worker, commit_index_removal, corrupt_index, merge_results, update_worker,
    InsertedPages, RecordSet, ScanExecutor,
};

/// Operation surface for partitioned blobs.
#[derive(Debug)]
pub struct PartitionStore {
    disk: Arc<PartitionDisk>,
    blob_disk: Arc<BlobDisk>,
    index: IndexEngine,
    executor: ScanExecutor,
    max_page_size: usize,
}

impl PartitionStore {
    pub fn new(disk: Arc<PartitionDisk>, blob_disk: Arc<BlobDisk>) -> Self {
        Self {
            index: IndexEngine::new(Arc::clone(&blob_disk)),
            executor: ScanExecutor::new(),
            disk,
            blob_disk,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    /// Overrides the sizing caps and scan fan-out.
    pub fn with_limits(
        disk: Arc<PartitionDisk>,
        blob_disk: Arc<BlobDisk>,
        max_page_size: usize,
        max_index_size: usize,
        fanout: usize,
    ) -> Self {
        Self {
            index: IndexEngine::with_max_entries(Arc::clone(&blob_disk), max_index_size),
            executor: ScanExecutor::with_fanout(fanout),
            disk,
            blob_disk,
            max_page_size: max_page_size.max(1),
        }
    }

    // ------------------------------------------------------------------
    // life-cycle
    // ------------------------------------------------------------------

    pub fn create_partition(
        &self,
        db: &str,
        blob: &str,
        format: &Format,
        partition: &Partition,
    ) -> Result<Blob> {
        let declaration = Blob::new(blob, format.clone()).with_partition(partition.clone());
        declaration.validate()?;
        self.disk.create_partition(db, blob, format, partition)?;
        Ok(declaration)
    }

    pub fn is_partition(&self, db: &str, blob: &str) -> bool {
        self.disk.is_partition(db, blob)
    }

    // ------------------------------------------------------------------
    // inserts
    // ------------------------------------------------------------------

    /// Bulk insert: coerce, hash, group by hash key, then fill each key's
    /// chain. Ids are assigned in input order before grouping, so the
    /// reported last id belongs to the last input record.
    pub fn add_records(&self, db: &str, blob: &str, records: &[Record]) -> Result<InsertedPages> {
        let mut outcome = InsertedPages::default();
        if records.is_empty() {
            return Ok(outcome);
        }
        let format = self.blob_disk.format(db, blob)?;
        let partition = self.disk.partition(db, blob)?;

        let mut groups: HashMap<String, Vec<(String, Record)>> = HashMap::new();
        let mut last_record_id = None;
        for record in records {
            let coerced = format_record(&format, record)?;
            let hash_key = partition.hash_key(&coerced)?;
            let record_id = Uuid::new_v4().to_string();
            last_record_id = Some(record_id.clone());
            groups.entry(hash_key).or_default().push((record_id, coerced));
        }

        for (hash_key, group) in &groups {
            self.add_partitioned_records(db, blob, hash_key, group, &mut outcome)?;
        }
        outcome.last_record_id = last_record_id;
        Ok(outcome)
    }

    fn add_partitioned_records(
        &self,
        db: &str,
        blob: &str,
        hash_key: &str,
        group: &[(String, Record)],
        outcome: &mut InsertedPages,
    ) -> Result<()> {
        let chain = match self.disk.hash_key_chain(db, blob, hash_key) {
            Ok(chain) => chain,
            Err(err) if is_not_found(&err) => {
                self.disk.create_hash_key_item(db, blob, hash_key)?;
                HashKeyChain::default()
            }
            Err(err) => return Err(err),
        };
        let mut current = match chain.file_names.last() {
            Some(name) => name.clone(),
            None => self.disk.create_hash_key_page(db, blob, hash_key)?.file_name,
        };
        let mut page_map = self.blob_disk.page_data(db, blob, &current)?;
        let mut accumulator = IndexData::default();

        for (record_id, record) in group {
            if page_map.len() >= self.max_page_size {
                self.blob_disk.write_page_data(db, blob, &current, &page_map)?;
                current = self.disk.create_hash_key_page(db, blob, hash_key)?.file_name;
                page_map = PageData::default();
            }
            page_map.insert(record_id.clone(), record.clone());
            accumulator.insert(record_id.clone(), current.clone());
            outcome.track(&current, record_id.clone(), record.clone());
        }
        self.blob_disk.write_page_data(db, blob, &current, &page_map)?;
        self.index.add_entries(db, blob, &accumulator)
    }

    // ------------------------------------------------------------------
    // partition-pruned scans
    // ------------------------------------------------------------------

    pub fn get_records_by_partition(
        &self,
        db: &str,
        blob: &str,
        partition_search: &Record,
        items: &[FilterItem],
    ) -> Result<RecordSet> {
        let format = self.blob_disk.format(db, blob)?;
        let filter = Filter::compile(items, &format)?;
        let mut total = RecordSet::default();
        for hash_key in self.pruned_hash_keys(db, blob, &format, partition_search)? {
            let chain = self.disk.hash_key_chain(db, blob, &hash_key)?;
            let results = self.executor.run(&chain.file_names, |page| {
                collect_worker(&self.blob_disk, db, blob, page, &filter)
            });
            merge_results(&mut total, results);
        }
        Ok(total)
    }

    pub fn update_records_by_partition(
        &self,
        db: &str,
        blob: &str,
        patch: &Record,
        partition_search: &Record,
        items: &[FilterItem],
    ) -> Result<RecordSet> {
        let format = self.blob_disk.format(db, blob)?;
        let patch = format_update_record(&format, patch)?;
        let filter = Filter::compile(items, &format)?;
        let mut total = RecordSet::default();
        for hash_key in self.pruned_hash_keys(db, blob, &format, partition_search)? {
            let chain = self.disk.hash_key_chain(db, blob, &hash_key)?;
            let results = self.executor.run(&chain.file_names, |page| {
                update_worker(&self.blob_disk, db, blob, page, &filter, &patch)
            });
            merge_results(&mut total, results);
        }
        Ok(total)
    }

    /// Filtered delete over the pruned hash keys. Workers that empty a
    /// page remove it from both the hash-key chain and the page list; each
    /// batch's victims leave the index before the next batch starts.
    pub fn delete_records_by_partition(
        &self,
        db: &str,
        blob: &str,
        partition_search: &Record,
        items: &[FilterItem],
    ) -> Result<RecordSet> {
        let format = self.blob_disk.format(db, blob)?;
        let filter = Filter::compile(items, &format)?;
        let mut total = RecordSet::default();
        for hash_key in self.pruned_hash_keys(db, blob, &format, partition_search)? {
            let chain = self.disk.hash_key_chain(db, blob, &hash_key)?;
            for batch in chain.file_names.chunks(self.executor.fanout()) {
                let results = self.executor.run_batch(batch, &|page| {
                    self.delete_worker(db, blob, &hash_key, page, &filter)
                });
                let removed_ids: Vec<String> = results
                    .iter()
                    .flat_map(|(_, removed)| removed.keys().cloned())
                    .collect();
                self.index.remove_ids(db, blob, &removed_ids)?;
                merge_results(&mut total, results);
            }
        }
        Ok(total)
    }

    fn delete_worker(
        &self,
        db: &str,
        blob: &str,
        hash_key: &str,
        page: &str,
        filter: &Filter,
    ) -> Result<RecordSet> {
        let data = self.blob_disk.page_data(db, blob, page)?;
        let mut kept = PageData::default();
        let mut removed = RecordSet::default();
        for (record_id, record) in data {
            if filter.matches(&record)? {
                removed.insert(record_id, record);
            } else {
                kept.insert(record_id, record);
            }
        }
        if removed.is_empty() {
            return Ok(removed);
        }
        if kept.is_empty() {
            self.disk.delete_partition_page(db, blob, hash_key, page)?;
        } else {
            self.blob_disk.write_page_data(db, blob, page, &kept)?;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // point operations
    // ------------------------------------------------------------------

    /// Point delete. When the record's page empties, its hash key is
    /// recomputed from the deleted record to clean the chain.
    pub fn delete_record_by_index(&self, db: &str, blob: &str, record_id: &str) -> Result<Record> {
        let partition = self.disk.partition(db, blob)?;
        let (index_file, page_file) = self
            .index
            .find_entry(db, blob, record_id)?
            .ok_or_else(|| not_found(format!("record {record_id} in blob {db}/{blob}")))?;
        let mut page = self.blob_disk.page_data(db, blob, &page_file)?;
        let record = page
            .remove(record_id)
            .ok_or_else(|| corrupt_index(record_id, &page_file))?;
        let mut index_map = self.blob_disk.index_data(db, blob, &index_file)?;
        index_map.remove(record_id);

        if page.is_empty() {
            let hash_key = partition.hash_key(&record)?;
            self.disk.delete_partition_page(db, blob, &hash_key, &page_file)?;
        } else {
            self.blob_disk.write_page_data(db, blob, &page_file, &page)?;
        }
        commit_index_removal(&self.blob_disk, db, blob, &index_file, &index_map);
        Ok(record)
    }

    // ------------------------------------------------------------------
    // pruning
    // ------------------------------------------------------------------

    /// Hash keys whose file names survive the partition search: for every
    /// searched partition key, the 28-byte slot at that key's declared
    /// position must match the search value's segment byte for byte.
    /// Search values are coerced through the column type first, so they
    /// render exactly like the stored values that produced the hash keys.
    fn pruned_hash_keys(
        &self,
        db: &str,
        blob: &str,
        format: &Format,
        partition_search: &Record,
    ) -> Result<Vec<String>> {
        let partition = self.disk.partition(db, blob)?;
        let mut required: Vec<Option<String>> = Vec::with_capacity(partition.keys.len());
        for key in &partition.keys {
            match partition_search.get(key) {
                Some(value) => {
                    let stored = coerce_value(value, format.require(key)?)?;
                    required.push(Some(hash_segment(&render_value(&stored)?)));
                }
                None => required.push(None),
            }
        }

        let mut survivors = Vec::new();
        'files: for file_name in self.disk.list_hash_key_files(db, blob)? {
            let hash_key = layout::hash_key_from_file_name(&file_name);
            for (position, expected) in required.iter().enumerate() {
                let Some(expected) = expected else { continue };
                let start = position * HASH_SEGMENT_LEN;
                let end = start + HASH_SEGMENT_LEN;
                if hash_key.len() < end || &hash_key[start..end] != expected.as_str() {
                    continue 'files;
                }
            }
            survivors.push(hash_key.to_string());
        }
        Ok(survivors)
    }
}
