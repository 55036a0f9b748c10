//! Path layout: the single place that knows where every artifact lives.
//!
//! ```text
//! <dataRoot>/
//! ├── <db>/
//! │   └── <blob>/
//! │       ├── format.json          # column format
//! │       ├── pages.json           # ordered page list
//! │       ├── indexes.json         # prefix → index-file chains
//! │       ├── partitions.json      # partition keys (partitioned only)
//! │       ├── pages/<uuid>.json    # record pages
//! │       ├── indexes/<uuid>.json  # id → page mappings
//! │       └── partitions/<hashkey>.json   # per-hash-key page chains
//! ```
//!
//! Page and index files are referred to throughout the engine by their
//! blob-relative names (`pages/<uuid>.json`), which is also exactly what
//! the metadata artifacts store.

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const FORMAT_FILE: &str = "format.json";
pub const PAGES_FILE: &str = "pages.json";
pub const INDEXES_FILE: &str = "indexes.json";
pub const PARTITIONS_FILE: &str = "partitions.json";

pub const PAGES_DIR: &str = "pages";
pub const INDEXES_DIR: &str = "indexes";
pub const PARTITIONS_DIR: &str = "partitions";

const JSON_EXT: &str = ".json";

/// Maps logical identifiers to paths under one data root.
#[derive(Debug, Clone)]
pub struct PathLayout {
    data_root: PathBuf,
}

impl PathLayout {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn db_dir(&self, db: &str) -> PathBuf {
        self.data_root.join(db)
    }

    pub fn blob_dir(&self, db: &str, blob: &str) -> PathBuf {
        self.data_root.join(db).join(blob)
    }

    /// Resolves a blob-relative file name (e.g. `pages/<uuid>.json`).
    pub fn blob_file(&self, db: &str, blob: &str, relative: &str) -> PathBuf {
        self.blob_dir(db, blob).join(relative)
    }

    pub fn format_file(&self, db: &str, blob: &str) -> PathBuf {
        self.blob_file(db, blob, FORMAT_FILE)
    }

    pub fn pages_file(&self, db: &str, blob: &str) -> PathBuf {
        self.blob_file(db, blob, PAGES_FILE)
    }

    pub fn indexes_file(&self, db: &str, blob: &str) -> PathBuf {
        self.blob_file(db, blob, INDEXES_FILE)
    }

    pub fn partitions_file(&self, db: &str, blob: &str) -> PathBuf {
        self.blob_file(db, blob, PARTITIONS_FILE)
    }

    pub fn pages_dir(&self, db: &str, blob: &str) -> PathBuf {
        self.blob_file(db, blob, PAGES_DIR)
    }

    pub fn indexes_dir(&self, db: &str, blob: &str) -> PathBuf {
        self.blob_file(db, blob, INDEXES_DIR)
    }

    pub fn partitions_dir(&self, db: &str, blob: &str) -> PathBuf {
        self.blob_file(db, blob, PARTITIONS_DIR)
    }

    pub fn hash_key_file(&self, db: &str, blob: &str, hash_key: &str) -> PathBuf {
        self.blob_file(db, blob, &hash_key_name(hash_key))
    }
}

/// Mints a fresh blob-relative page file name.
pub fn new_page_name() -> String {
    format!("{PAGES_DIR}/{}{JSON_EXT}", Uuid::new_v4())
}

/// Mints a fresh blob-relative index file name.
pub fn new_index_name() -> String {
    format!("{INDEXES_DIR}/{}{JSON_EXT}", Uuid::new_v4())
}

/// Blob-relative name of a hash-key chain file.
pub fn hash_key_name(hash_key: &str) -> String {
    format!("{PARTITIONS_DIR}/{hash_key}{JSON_EXT}")
}

/// Strips the `.json` suffix from a hash-key file name listed on disk.
pub fn hash_key_from_file_name(file_name: &str) -> &str {
    file_name.strip_suffix(JSON_EXT).unwrap_or(file_name)
}
