//! # Engine Constants
//!
//! All sizing and naming limits for the storage engine live here. Import
//! them from this module rather than redefining locally.
//!
//! ## Relationships
//!
//! ```text
//! MAX_PAGE_SIZE (512,000 records)
//!       │
//!       └─> a bulk insert opens a new page file before this many records
//!           would be exceeded; ⌈n / MAX_PAGE_SIZE⌉ pages hold n records
//!
//! MAX_INDEX_SIZE (502,400 entries)
//!       │
//!       └─> an index file spills to a fresh chain tail after crossing this
//!           count, so no file ever holds more than MAX_INDEX_SIZE + 1
//!
//! INDEX_PREFIX_LENGTH (2 hex chars)
//!       │
//!       └─> shards the id index into at most 256 prefix chains; must stay
//!           shorter than the 36-byte canonical UUID form
//!
//! SEARCH_THREAD_COUNT (5)
//!       │
//!       └─> upper bound on concurrently open page files during a scan
//! ```
//!
//! Deployments may tune these, but data written under one set of values must
//! remain readable under another; every constant here bounds growth, none
//! describes existing file contents.

/// Soft cap on records per page file. Inserts never reject because of this
/// cap; a new page is opened before it would be exceeded.
pub const MAX_PAGE_SIZE: usize = 512_000;

/// Entries per index file before the chain grows a new tail.
pub const MAX_INDEX_SIZE: usize = 502_400;

/// Scan fan-out: workers launched per batch over page files.
pub const SEARCH_THREAD_COUNT: usize = 5;

/// Record-id prefix length used to shard the id index.
pub const INDEX_PREFIX_LENGTH: usize = 2;

/// Byte limit for database and column names.
pub const KEY_MAX_LENGTH: usize = 45;

/// Byte limit for blob names.
pub const BLOB_MAX_LENGTH: usize = 25;

/// Human description of the identifier rule, used in validation errors.
pub const IDENT_RULE: &str = "lowercase letters and underscores";

const _: () = assert!(SEARCH_THREAD_COUNT > 0);
const _: () = assert!(INDEX_PREFIX_LENGTH > 0 && INDEX_PREFIX_LENGTH < 36);
const _: () = assert!(BLOB_MAX_LENGTH <= KEY_MAX_LENGTH);
const _: () = assert!(MAX_PAGE_SIZE > 0 && MAX_INDEX_SIZE > 0);
