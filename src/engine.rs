//! # Engine Facade
//!
//! Owns the disk managers and stores and exposes the full operation
//! surface behind one handle. Callers resolve operations by `(db, blob)`;
//! the facade probes `partitions.json` to route mutating and scan calls to
//! the partitioned or unpartitioned store.
//!
//! ```ignore
//! use blobdb::{Engine, Format, KeyType};
//!
//! let engine = Engine::open("./data")?;
//! engine.create_db("app")?;
//!
//! let mut format = Format::new();
//! format.insert("full_name", KeyType::String);
//! format.insert("age", KeyType::Int);
//! engine.create_blob("app", "users", &format)?;
//!
//! let outcome = engine.add_record("app", "users", &record)?;
//! let id = outcome.last_record_id.unwrap();
//! let fetched = engine.get_record_by_index("app", "users", &id)?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Result, WrapErr};

use crate::config::{MAX_INDEX_SIZE, MAX_PAGE_SIZE, SEARCH_THREAD_COUNT};
use crate::disk::{BlobDisk, DbDisk, PartitionDisk, PathLayout};
use crate::error::validation;
use crate::filter::FilterItem;
use crate::schema::{Blob, Format, Partition, Record};
use crate::store::{BlobStore, DbStore, InsertedPages, PartitionStore, RecordSet};

/// Configures and opens an [`Engine`].
#[derive(Debug)]
pub struct EngineBuilder {
    data_root: PathBuf,
    max_page_size: usize,
    max_index_size: usize,
    scan_fanout: usize,
}

impl EngineBuilder {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            max_page_size: MAX_PAGE_SIZE,
            max_index_size: MAX_INDEX_SIZE,
            scan_fanout: SEARCH_THREAD_COUNT,
        }
    }

    pub fn max_page_size(mut self, records: usize) -> Self {
        self.max_page_size = records;
        self
    }

    pub fn max_index_size(mut self, entries: usize) -> Self {
        self.max_index_size = entries;
        self
    }

    pub fn scan_fanout(mut self, workers: usize) -> Self {
        self.scan_fanout = workers;
        self
    }

    /// Creates the data root if needed and wires up the stores.
    pub fn open(self) -> Result<Engine> {
        std::fs::create_dir_all(&self.data_root).wrap_err_with(|| {
            format!("failed to create data root '{}'", self.data_root.display())
        })?;
        let layout = PathLayout::new(&self.data_root);
        let blob_disk = Arc::new(BlobDisk::new(layout.clone()));
        let partition_disk = Arc::new(PartitionDisk::new(layout.clone(), Arc::clone(&blob_disk)));
        Ok(Engine {
            dbs: DbStore::new(DbDisk::new(layout)),
            blobs: BlobStore::with_limits(
                Arc::clone(&blob_disk),
                self.max_page_size,
                self.max_index_size,
                self.scan_fanout,
            ),
            partitions: PartitionStore::with_limits(
                Arc::clone(&partition_disk),
                blob_disk,
                self.max_page_size,
                self.max_index_size,
                self.scan_fanout,
            ),
            partition_disk,
        })
    }
}

/// The storage engine: every boundary operation behind one handle.
#[derive(Debug)]
pub struct Engine {
    dbs: DbStore,
    blobs: BlobStore,
    partitions: PartitionStore,
    partition_disk: Arc<PartitionDisk>,
}

impl Engine {
    /// Opens an engine over `data_root` with the default caps.
    pub fn open(data_root: impl Into<PathBuf>) -> Result<Engine> {
        EngineBuilder::new(data_root).open()
    }

    pub fn builder(data_root: impl Into<PathBuf>) -> EngineBuilder {
        EngineBuilder::new(data_root)
    }

    // ------------------------------------------------------------------
    // databases
    // ------------------------------------------------------------------

    pub fn create_db(&self, db: &str) -> Result<()> {
        self.dbs.create_db(db)
    }

    pub fn delete_db(&self, db: &str) -> Result<()> {
        self.dbs.delete_db(db)
    }

    pub fn db_exists(&self, db: &str) -> bool {
        self.dbs.db_exists(db)
    }

    // ------------------------------------------------------------------
    // blobs
    // ------------------------------------------------------------------

    pub fn create_blob(&self, db: &str, blob: &str, format: &Format) -> Result<Blob> {
        self.blobs.create_blob(db, blob, format)
    }

    pub fn create_partition(
        &self,
        db: &str,
        blob: &str,
        format: &Format,
        partition: &Partition,
    ) -> Result<Blob> {
        self.partitions.create_partition(db, blob, format, partition)
    }

    pub fn delete_blob(&self, db: &str, blob: &str) -> Result<()> {
        self.blobs.delete_blob(db, blob)
    }

    pub fn blob_exists(&self, db: &str, blob: &str) -> bool {
        self.blobs.blob_exists(db, blob)
    }

    pub fn is_partition(&self, db: &str, blob: &str) -> bool {
        self.partition_disk.is_partition(db, blob)
    }

    // ------------------------------------------------------------------
    // records
    // ------------------------------------------------------------------

    pub fn add_record(&self, db: &str, blob: &str, record: &Record) -> Result<InsertedPages> {
        self.add_records(db, blob, std::slice::from_ref(record))
    }

    /// Routes to the hash-key insert path for partitioned blobs.
    pub fn add_records(&self, db: &str, blob: &str, records: &[Record]) -> Result<InsertedPages> {
        if self.is_partition(db, blob) {
            self.partitions.add_records(db, blob, records)
        } else {
            self.blobs.add_records(db, blob, records)
        }
    }

    pub fn get_record_by_index(&self, db: &str, blob: &str, record_id: &str) -> Result<Record> {
        self.blobs.get_record_by_index(db, blob, record_id)
    }

    pub fn get_records_full_scan(
        &self,
        db: &str,
        blob: &str,
        filter: &[FilterItem],
    ) -> Result<RecordSet> {
        self.blobs.get_records_full_scan(db, blob, filter)
    }

    pub fn get_records_by_partition(
        &self,
        db: &str,
        blob: &str,
        partition_search: &Record,
        filter: &[FilterItem],
    ) -> Result<RecordSet> {
        self.require_partition(db, blob)?;
        self.partitions
            .get_records_by_partition(db, blob, partition_search, filter)
    }

    /// Point updates rewrite a page in place and never touch chain
    /// metadata, so one path serves both layouts.
    pub fn update_record_by_index(
        &self,
        db: &str,
        blob: &str,
        record_id: &str,
        patch: &Record,
    ) -> Result<Record> {
        self.blobs.update_record_by_index(db, blob, record_id, patch)
    }

    pub fn update_records(
        &self,
        db: &str,
        blob: &str,
        patch: &Record,
        filter: &[FilterItem],
    ) -> Result<RecordSet> {
        self.blobs.update_records(db, blob, patch, filter)
    }

    pub fn update_records_by_partition(
        &self,
        db: &str,
        blob: &str,
        patch: &Record,
        partition_search: &Record,
        filter: &[FilterItem],
    ) -> Result<RecordSet> {
        self.require_partition(db, blob)?;
        self.partitions
            .update_records_by_partition(db, blob, patch, partition_search, filter)
    }

    /// Point deletes must clean hash-key chains on partitioned blobs, so
    /// this routes by layout.
    pub fn delete_record_by_index(&self, db: &str, blob: &str, record_id: &str) -> Result<Record> {
        if self.is_partition(db, blob) {
            self.partitions.delete_record_by_index(db, blob, record_id)
        } else {
            self.blobs.delete_record_by_index(db, blob, record_id)
        }
    }

    pub fn delete_records(&self, db: &str, blob: &str, filter: &[FilterItem]) -> Result<RecordSet> {
        if self.is_partition(db, blob) {
            self.partitions
                .delete_records_by_partition(db, blob, &Record::new(), filter)
        } else {
            self.blobs.delete_records(db, blob, filter)
        }
    }

    pub fn delete_records_by_partition(
        &self,
        db: &str,
        blob: &str,
        partition_search: &Record,
        filter: &[FilterItem],
    ) -> Result<RecordSet> {
        self.require_partition(db, blob)?;
        self.partitions
            .delete_records_by_partition(db, blob, partition_search, filter)
    }

    fn require_partition(&self, db: &str, blob: &str) -> Result<()> {
        if !self.is_partition(db, blob) {
            return Err(validation(format!("blob {db}/{blob} is not partitioned")));
        }
        Ok(())
    }
}
