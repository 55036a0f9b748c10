//! # Blob Store
//!
//! Operations on unpartitioned blobs: bulk and single inserts, indexed
//! point reads/updates/deletes, and filtered parallel scans with update or
//! delete.
//!
//! ## Insert path
//!
//! A bulk insert coerces every record first, then fills the current last
//! page, opening a fresh page whenever the next record would push the page
//! past the record cap. Page contents flush page-by-page; the id → page
//! accumulator lands in the index engine at the end. Inserting `n` records
//! into an empty blob therefore produces exactly `⌈n / cap⌉` pages.
//!
//! ## Delete path
//!
//! Filtered deletes fan out per batch; each worker rewrites its page (or
//! deletes it outright when it empties), and the owning thread strips the
//! batch's ids from the index before the next batch starts. A point delete
//! that has already mutated its page treats any index rewrite failure as
//! fatal, since the index would otherwise point at a record that no longer
//! exists.

use std::sync::Arc;

use eyre::Result;
use uuid::Uuid;

use crate::config::MAX_PAGE_SIZE;
use crate::disk::BlobDisk;
use crate::error::not_found;
use crate::filter::{Filter, FilterItem};
use crate::index::IndexEngine;
use crate::schema::{format_record, format_update_record, Blob, Format, IndexData, PageData, Record};
use crate::store::{
    collect_worker, commit_index_removal, corrupt_index, merge_results, update_worker,
    InsertedPages, RecordSet, ScanExecutor,
};

/// Operation surface for unpartitioned blobs.
#[derive(Debug)]
pub struct BlobStore {
    disk: Arc<BlobDisk>,
    index: IndexEngine,
    executor: ScanExecutor,
    max_page_size: usize,
}

impl BlobStore {
    pub fn new(disk: Arc<BlobDisk>) -> Self {
        Self {
            index: IndexEngine::new(Arc::clone(&disk)),
            executor: ScanExecutor::new(),
            disk,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    /// Overrides the sizing caps and scan fan-out.
    pub fn with_limits(
        disk: Arc<BlobDisk>,
        max_page_size: usize,
        max_index_size: usize,
        fanout: usize,
    ) -> Self {
        Self {
            index: IndexEngine::with_max_entries(Arc::clone(&disk), max_index_size),
            executor: ScanExecutor::with_fanout(fanout),
            disk,
            max_page_size: max_page_size.max(1),
        }
    }

    // ------------------------------------------------------------------
    // blob life-cycle
    // ------------------------------------------------------------------

    pub fn create_blob(&self, db: &str, blob: &str, format: &Format) -> Result<Blob> {
        let declaration = Blob::new(blob, format.clone());
        declaration.validate()?;
        self.disk.create_blob(db, blob, format)?;
        Ok(declaration)
    }

    pub fn delete_blob(&self, db: &str, blob: &str) -> Result<()> {
        if !self.disk.blob_exists(db, blob) {
            return Err(not_found(format!("blob {db}/{blob}")));
        }
        self.disk.delete_blob(db, blob)
    }

    pub fn blob_exists(&self, db: &str, blob: &str) -> bool {
        self.disk.blob_exists(db, blob)
    }

    // ------------------------------------------------------------------
    // inserts
    // ------------------------------------------------------------------

    pub fn add_record(&self, db: &str, blob: &str, record: &Record) -> Result<InsertedPages> {
        self.add_records(db, blob, std::slice::from_ref(record))
    }

    /// Bulk insert. Ids are assigned in input order and the whole batch is
    /// coerced before any page is touched, so a bad record rejects the
    /// batch without leaving unindexed data behind.
    pub fn add_records(&self, db: &str, blob: &str, records: &[Record]) -> Result<InsertedPages> {
        let mut outcome = InsertedPages::default();
        if records.is_empty() {
            return Ok(outcome);
        }
        let format = self.disk.format(db, blob)?;
        let coerced: Vec<Record> = records
            .iter()
            .map(|record| format_record(&format, record))
            .collect::<Result<_>>()?;

        let mut page_items = self.disk.page_items(db, blob)?;
        let mut current = match page_items.pop() {
            Some(item) => item.file_name,
            None => self.disk.create_page(db, blob)?.file_name,
        };
        let mut page_map = self.disk.page_data(db, blob, &current)?;
        let mut accumulator = IndexData::default();

        for record in coerced {
            if page_map.len() >= self.max_page_size {
                self.disk.write_page_data(db, blob, &current, &page_map)?;
                current = self.disk.create_page(db, blob)?.file_name;
                page_map = PageData::default();
            }
            let record_id = Uuid::new_v4().to_string();
            page_map.insert(record_id.clone(), record.clone());
            accumulator.insert(record_id.clone(), current.clone());
            outcome.track(&current, record_id, record);
        }
        self.disk.write_page_data(db, blob, &current, &page_map)?;
        self.index.add_entries(db, blob, &accumulator)?;
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // point operations
    // ------------------------------------------------------------------

    pub fn get_record_by_index(&self, db: &str, blob: &str, record_id: &str) -> Result<Record> {
        let (_, page_file) = self.locate(db, blob, record_id)?;
        let page = self.disk.page_data(db, blob, &page_file)?;
        page.get(record_id)
            .cloned()
            .ok_or_else(|| corrupt_index(record_id, &page_file))
    }

    pub fn update_record_by_index(
        &self,
        db: &str,
        blob: &str,
        record_id: &str,
        patch: &Record,
    ) -> Result<Record> {
        let format = self.disk.format(db, blob)?;
        let patch = format_update_record(&format, patch)?;
        let (_, page_file) = self.locate(db, blob, record_id)?;
        let mut page = self.disk.page_data(db, blob, &page_file)?;
        let record = page
            .get_mut(record_id)
            .ok_or_else(|| corrupt_index(record_id, &page_file))?;
        for (column, value) in &patch {
            record.insert(column.clone(), value.clone());
        }
        let merged = record.clone();
        self.disk.write_page_data(db, blob, &page_file, &page)?;
        Ok(merged)
    }

    pub fn delete_record_by_index(&self, db: &str, blob: &str, record_id: &str) -> Result<Record> {
        let (index_file, page_file) = self.locate(db, blob, record_id)?;
        let mut page = self.disk.page_data(db, blob, &page_file)?;
        let record = page
            .remove(record_id)
            .ok_or_else(|| corrupt_index(record_id, &page_file))?;
        let mut index_map = self.disk.index_data(db, blob, &index_file)?;
        index_map.remove(record_id);

        if page.is_empty() {
            self.disk.delete_page(db, blob, &page_file)?;
        } else {
            self.disk.write_page_data(db, blob, &page_file, &page)?;
        }
        commit_index_removal(&self.disk, db, blob, &index_file, &index_map);
        Ok(record)
    }

    fn locate(&self, db: &str, blob: &str, record_id: &str) -> Result<(String, String)> {
        self.index
            .find_entry(db, blob, record_id)?
            .ok_or_else(|| not_found(format!("record {record_id} in blob {db}/{blob}")))
    }

    // ------------------------------------------------------------------
    // filtered scans
    // ------------------------------------------------------------------

    pub fn get_records_full_scan(
        &self,
        db: &str,
        blob: &str,
        items: &[FilterItem],
    ) -> Result<RecordSet> {
        let format = self.disk.format(db, blob)?;
        let filter = Filter::compile(items, &format)?;
        let pages = self.page_names(db, blob)?;
        let results = self
            .executor
            .run(&pages, |page| collect_worker(&self.disk, db, blob, page, &filter));
        let mut total = RecordSet::default();
        merge_results(&mut total, results);
        Ok(total)
    }

    pub fn update_records(
        &self,
        db: &str,
        blob: &str,
        patch: &Record,
        items: &[FilterItem],
    ) -> Result<RecordSet> {
        let format = self.disk.format(db, blob)?;
        let patch = format_update_record(&format, patch)?;
        let filter = Filter::compile(items, &format)?;
        let pages = self.page_names(db, blob)?;
        let results = self.executor.run(&pages, |page| {
            update_worker(&self.disk, db, blob, page, &filter, &patch)
        });
        let mut total = RecordSet::default();
        merge_results(&mut total, results);
        Ok(total)
    }

    /// Filtered delete. Batches run in parallel; the index entries of each
    /// batch's victims are removed before the next batch starts.
    pub fn delete_records(&self, db: &str, blob: &str, items: &[FilterItem]) -> Result<RecordSet> {
        let format = self.disk.format(db, blob)?;
        let filter = Filter::compile(items, &format)?;
        let pages = self.page_names(db, blob)?;
        let mut total = RecordSet::default();
        for batch in pages.chunks(self.executor.fanout()) {
            let results = self
                .executor
                .run_batch(batch, &|page| self.delete_worker(db, blob, page, &filter));
            let removed_ids: Vec<String> = results
                .iter()
                .flat_map(|(_, removed)| removed.keys().cloned())
                .collect();
            self.index.remove_ids(db, blob, &removed_ids)?;
            merge_results(&mut total, results);
        }
        Ok(total)
    }

    fn delete_worker(&self, db: &str, blob: &str, page: &str, filter: &Filter) -> Result<RecordSet> {
        let data = self.disk.page_data(db, blob, page)?;
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
            self.disk.delete_page(db, blob, page)?;
        } else {
            self.disk.write_page_data(db, blob, page, &kept)?;
        }
        Ok(removed)
    }

    fn page_names(&self, db: &str, blob: &str) -> Result<Vec<String>> {
        Ok(self
            .disk
            .page_items(db, blob)?
            .into_iter()
            .map(|item| item.file_name)
            .collect())
    }
}
