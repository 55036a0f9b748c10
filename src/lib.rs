//! # blobdb - Document Database Storage Engine
//!
//! blobdb is the storage core of a small document database. Records are
//! JSON documents organized into named *databases* containing named *blobs*
//! (tables). Each blob declares a column *format*; records are keyed by
//! server-assigned UUIDs, stored in JSON page files, reachable through a
//! prefix-sharded id index, and optionally *partitioned* so that records
//! route to physically separate page chains by a content hash of selected
//! columns.
//!
//! ## Quick Start
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
//! format.insert("active", KeyType::Bool);
//! engine.create_blob("app", "users", &format)?;
//!
//! let outcome = engine.add_record("app", "users", &record)?;
//! let id = outcome.last_record_id.unwrap();
//! let user = engine.get_record_by_index("app", "users", &id)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Engine (facade/router)       │
//! ├──────────────┬──────────────────────┤
//! │  BlobStore   │   PartitionStore     │
//! ├──────────────┴─────┬────────────────┤
//! │    IndexEngine     │  ScanExecutor  │
//! ├────────────────────┴────────────────┤
//! │     Schema  │  Filter  (validation) │
//! ├─────────────────────────────────────┤
//! │   BlobDisk / PartitionDisk / DbDisk │
//! ├─────────────────────────────────────┤
//! │     FileIO + PathLayout (one file   │
//! │        at a time, JSON on disk)     │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## On-Disk Layout
//!
//! ```text
//! data_root/
//! ├── app/                        # database
//! │   └── users/                  # blob
//! │       ├── format.json         # column → keyType
//! │       ├── pages.json          # ordered page list
//! │       ├── indexes.json        # id-prefix → index-file chains
//! │       ├── partitions.json     # partition keys (partitioned only)
//! │       ├── pages/<uuid>.json   # record id → record
//! │       ├── indexes/<uuid>.json # record id → page file
//! │       └── partitions/<hashkey>.json   # per-hash-key page chains
//! ```
//!
//! ## Consistency Model
//!
//! Atomicity is per file. Multi-file sequences (blob creation, page
//! allocation, page deletion) roll back their partial state on failure; a
//! rollback that itself fails aborts the process. There is no
//! cross-operation write serialization; the deployment is expected to
//! allow at most one mutating operation per blob at a time.
//!
//! ## Module Overview
//!
//! - [`engine`]: the facade that owns the stores and routes by layout
//! - [`store`]: blob/partition operation surfaces and the scan executor
//! - [`index`]: prefix-sharded id → page index
//! - [`schema`]: formats, partitions, name rules, record coercion
//! - [`filter`]: compiled typed predicates
//! - [`disk`]: path layout, file IO, and artifact life-cycles
//! - [`config`]: engine constants
//! - [`error`]: typed failure classification for the boundary

pub mod config;
pub mod disk;
pub mod engine;
pub mod error;
pub mod filter;
pub mod index;
pub mod schema;
pub mod store;

pub use engine::{Engine, EngineBuilder};
pub use error::{classify, ErrorKind, StorageError};
pub use filter::{Filter, FilterItem};
pub use index::IndexEngine;
pub use schema::{Blob, Format, FormatItem, KeyType, Partition, Record};
pub use store::{BlobStore, DbStore, InsertedPages, PartitionStore, RecordSet, ScanExecutor};
