//! # Blob Schema Module
//!
//! Declares the shape of blob data: the column format, the optional
//! partition definition, and the validation and coercion rules applied to
//! every record crossing the engine boundary.
//!
//! ## Overview
//!
//! - [`Format`]: column name → declared [`KeyType`]; immutable once a blob
//!   is created
//! - [`Partition`]: ordered list of columns whose hashed values route
//!   records to hash-key page chains
//! - [`Blob`]: a named format with an optional partition, validated as a
//!   unit at create time
//! - [`format_record`] / [`format_update_record`]: wire-value coercion for
//!   inserts (exact column set) and patches (any subset)
//!
//! ## Name conventions
//!
//! Database, blob, and column names are snake case: lowercase ASCII
//! letters and underscores. Database and column names may be up to
//! [`KEY_MAX_LENGTH`](crate::config::KEY_MAX_LENGTH) bytes, blob names up
//! to [`BLOB_MAX_LENGTH`](crate::config::BLOB_MAX_LENGTH).

mod format;
mod partition;
mod record;

pub use format::{Format, FormatItem, KeyType};
pub use partition::{Partition, HASH_SEGMENT_LEN};
pub use record::{format_record, format_update_record};

pub(crate) use partition::hash_segment;
pub(crate) use record::{coerce_int, coerce_value, render_value};

use eyre::Result;

use crate::config::{BLOB_MAX_LENGTH, IDENT_RULE, KEY_MAX_LENGTH};
use crate::error::validation;

/// A single record as it travels through the engine: column name → value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// In-memory contents of one page file: record id → record.
pub type PageData = hashbrown::HashMap<String, Record>;

/// In-memory contents of one index file: record id → page file name.
pub type IndexData = hashbrown::HashMap<String, String>;

/// A blob declaration: name, column format, optional partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub name: String,
    pub format: Format,
    pub partition: Option<Partition>,
}

impl Blob {
    pub fn new(name: impl Into<String>, format: Format) -> Self {
        Self {
            name: name.into(),
            format,
            partition: None,
        }
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Validates the blob name, every column name, and (when present) that
    /// each partition key names a format column.
    pub fn validate(&self) -> Result<()> {
        check_blob_name(&self.name)?;
        self.format.validate()?;
        if let Some(partition) = &self.partition {
            partition.validate(&self.format)?;
        }
        Ok(())
    }
}

fn is_ident(name: &str) -> bool {
    name.bytes().all(|b| b == b'_' || b.is_ascii_lowercase())
}

fn check_ident(kind: &str, name: &str, max_len: usize) -> Result<()> {
    if name.len() > max_len {
        return Err(validation(format!(
            "{kind} name '{name}' exceeds {max_len} bytes"
        )));
    }
    if !is_ident(name) {
        return Err(validation(format!(
            "{kind} name '{name}' must use {IDENT_RULE}"
        )));
    }
    Ok(())
}

pub fn check_db_name(name: &str) -> Result<()> {
    check_ident("database", name, KEY_MAX_LENGTH)
}

pub fn check_blob_name(name: &str) -> Result<()> {
    check_ident("blob", name, BLOB_MAX_LENGTH)
}

pub fn check_column_name(name: &str) -> Result<()> {
    check_ident("column", name, KEY_MAX_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idents_accept_snake_case() {
        assert!(check_db_name("app_main").is_ok());
        assert!(check_blob_name("users").is_ok());
        assert!(check_column_name("full_name").is_ok());
    }

    #[test]
    fn idents_reject_uppercase_digits_and_dashes() {
        assert!(check_db_name("App").is_err());
        assert!(check_blob_name("users2").is_err());
        assert!(check_column_name("full-name").is_err());
    }

    #[test]
    fn blob_names_are_capped_tighter_than_columns() {
        let long = "a".repeat(BLOB_MAX_LENGTH + 1);
        assert!(check_blob_name(&long).is_err());
        assert!(check_column_name(&long).is_ok());
    }

    #[test]
    fn blob_validation_covers_partition_keys() {
        let mut format = Format::new();
        format.insert("category", KeyType::String);
        let blob = Blob::new("logs", format)
            .with_partition(Partition::new(vec!["missing".to_string()]));
        assert!(blob.validate().is_err());
    }
}
