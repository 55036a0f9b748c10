//! Partition declarations and hash-key computation.
//!
//! A partition is an ordered list of format columns. Every record hashes to
//! a *hash key*: the concatenation of one 28-byte segment per partition
//! column, each segment the URL-safe base64 of the SHA-1 digest of the
//! stored value's textual rendering. Records sharing a hash key share a
//! page chain; the fixed segment width lets partition searches prune
//! hash-key files by byte-slice comparison without decoding anything.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use eyre::Result;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::validation;
use crate::schema::{render_value, Format, Record};

/// Width of one hash-key segment: base64 of a 20-byte SHA-1 digest.
pub const HASH_SEGMENT_LEN: usize = 28;

/// The `partitions.json` artifact: ordered partition-key columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub keys: Vec<String>,
}

impl Partition {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    /// Every partition key must name a declared format column.
    pub fn validate(&self, format: &Format) -> Result<()> {
        for key in &self.keys {
            if !format.contains(key) {
                return Err(validation(format!(
                    "partition key '{key}' is not declared in the format"
                )));
            }
        }
        Ok(())
    }

    /// Hash key for a coerced record: per-column segments concatenated in
    /// declaration order.
    pub fn hash_key(&self, record: &Record) -> Result<String> {
        let mut hash_key = String::with_capacity(self.keys.len() * HASH_SEGMENT_LEN);
        for key in &self.keys {
            hash_key.push_str(&self.segment(key, record)?);
        }
        Ok(hash_key)
    }

    /// One column's 28-byte segment.
    pub fn segment(&self, key: &str, record: &Record) -> Result<String> {
        let value = record
            .get(key)
            .ok_or_else(|| validation(format!("partition key '{key}' not found in record")))?;
        Ok(hash_segment(&render_value(value)?))
    }
}

pub(crate) fn hash_segment(rendered: &str) -> String {
    URL_SAFE.encode(Sha1::digest(rendered.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::KeyType;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn segments_are_exactly_28_bytes() {
        assert_eq!(hash_segment("B").len(), HASH_SEGMENT_LEN);
        assert_eq!(hash_segment("").len(), HASH_SEGMENT_LEN);
        assert_eq!(hash_segment("a much longer rendering").len(), HASH_SEGMENT_LEN);
    }

    #[test]
    fn hash_key_concatenates_in_declaration_order() {
        let partition = Partition::new(vec!["category".into(), "region".into()]);
        let rec = record(json!({"category": "B", "region": "eu"}));
        let key = partition.hash_key(&rec).unwrap();
        assert_eq!(key.len(), 2 * HASH_SEGMENT_LEN);
        assert_eq!(&key[..HASH_SEGMENT_LEN], hash_segment("B"));
        assert_eq!(&key[HASH_SEGMENT_LEN..], hash_segment("eu"));
    }

    #[test]
    fn equal_values_share_a_hash_key() {
        let partition = Partition::new(vec!["category".into()]);
        let a = partition.hash_key(&record(json!({"category": "A"}))).unwrap();
        let b = partition.hash_key(&record(json!({"category": "A"}))).unwrap();
        let c = partition.hash_key(&record(json!({"category": "C"}))).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn missing_partition_column_is_an_error() {
        let partition = Partition::new(vec!["category".into()]);
        assert!(partition.hash_key(&record(json!({"other": 1}))).is_err());
    }

    #[test]
    fn validate_requires_format_columns() {
        let mut format = Format::new();
        format.insert("category", KeyType::String);
        let good = Partition::new(vec!["category".into()]);
        let bad = Partition::new(vec!["region".into()]);
        assert!(good.validate(&format).is_ok());
        assert!(bad.validate(&format).is_err());
    }

    #[test]
    fn partitions_json_wire_shape() {
        let partition = Partition::new(vec!["category".into()]);
        let json = serde_json::to_value(&partition).unwrap();
        assert_eq!(json, json!({"keys": ["category"]}));
    }
}
