//! # Store Layer
//!
//! The operation surface of the engine: database life-cycle ([`DbStore`]),
//! unpartitioned blob operations ([`BlobStore`]), partitioned blob
//! operations ([`PartitionStore`]), and the shared [`ScanExecutor`] they
//! fan scans out with.

pub mod blob;
pub mod db;
pub mod partition;
pub mod scan;

pub use blob::BlobStore;
pub use db::DbStore;
pub use partition::PartitionStore;
pub use scan::ScanExecutor;

use eyre::Result;

use crate::disk::BlobDisk;
use crate::filter::Filter;
use crate::schema::{IndexData, PageData, Record};

/// Flattened scan result: record id → record.
pub type RecordSet = PageData;

/// Outcome of a bulk insert: the pages that received records, the records
/// written to each (keyed by assigned id), and the id of the last input
/// record.
#[derive(Debug, Default)]
pub struct InsertedPages {
    pub pages: hashbrown::HashMap<String, RecordSet>,
    pub last_record_id: Option<String>,
}

impl InsertedPages {
    pub(crate) fn track(&mut self, page_file: &str, record_id: String, record: Record) {
        self.pages
            .entry_ref(page_file)
            .or_default()
            .insert(record_id.clone(), record);
        self.last_record_id = Some(record_id);
    }

    /// Total records inserted across all pages.
    pub fn record_count(&self) -> usize {
        self.pages.values().map(|records| records.len()).sum()
    }
}

pub(crate) fn merge_results(total: &mut RecordSet, results: Vec<(String, RecordSet)>) {
    for (_, records) in results {
        total.extend(records);
    }
}

/// Read-only per-page action: collect the records the filter accepts.
pub(crate) fn collect_worker(
    disk: &BlobDisk,
    db: &str,
    blob: &str,
    page: &str,
    filter: &Filter,
) -> Result<RecordSet> {
    let data = disk.page_data(db, blob, page)?;
    let mut hits = RecordSet::default();
    for (record_id, record) in data {
        if filter.matches(&record)? {
            hits.insert(record_id, record);
        }
    }
    Ok(hits)
}

/// Index-file rewrite after its page has already been mutated; failure is
/// fatal because the index would dangle.
pub(crate) fn commit_index_removal(
    disk: &BlobDisk,
    db: &str,
    blob: &str,
    index_file: &str,
    index_map: &IndexData,
) {
    let result = if index_map.is_empty() {
        disk.delete_index_file(db, blob, index_file)
    } else {
        disk.write_index_data(db, blob, index_file, index_map)
    };
    if let Err(err) = result {
        crate::disk::fatal(
            &format!("updating index file {index_file} in {db}/{blob} after page mutation"),
            &err,
        );
    }
}

pub(crate) fn corrupt_index(record_id: &str, page_file: &str) -> eyre::Report {
    eyre::eyre!("index entry for record {record_id} points at {page_file} but the record is missing")
}

/// Mutating per-page action: merge the patch into accepted records and
/// rewrite the page if anything changed.
pub(crate) fn update_worker(
    disk: &BlobDisk,
    db: &str,
    blob: &str,
    page: &str,
    filter: &Filter,
    patch: &Record,
) -> Result<RecordSet> {
    let mut data = disk.page_data(db, blob, page)?;
    let mut updated = RecordSet::default();
    for (record_id, record) in data.iter_mut() {
        if filter.matches(record)? {
            for (column, value) in patch {
                record.insert(column.clone(), value.clone());
            }
            updated.insert(record_id.clone(), record.clone());
        }
    }
    if !updated.is_empty() {
        disk.write_page_data(db, blob, page, &data)?;
    }
    Ok(updated)
}
