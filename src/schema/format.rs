//! Column format declarations and their on-disk `format.json` shape.

use eyre::Result;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::validation;
use crate::schema::check_column_name;

/// Declared type of a column. Serialized lowercase, matching the
/// `{"keyType": "..."}` wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    String,
    Int,
    Bool,
    Date,
    DateTime,
    Float,
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyType::String => "string",
            KeyType::Int => "int",
            KeyType::Bool => "bool",
            KeyType::Date => "date",
            KeyType::DateTime => "datetime",
            KeyType::Float => "float",
        };
        f.write_str(name)
    }
}

/// One column's declaration inside `format.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatItem {
    #[serde(rename = "keyType")]
    pub key_type: KeyType,
}

/// A blob's column format: column name → declared type. Immutable after
/// blob creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Format {
    columns: HashMap<String, FormatItem>,
}

impl Format {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column. Returns false (and leaves the format unchanged) if
    /// the column is already declared.
    pub fn insert(&mut self, column: impl Into<String>, key_type: KeyType) -> bool {
        let column = column.into();
        if self.columns.contains_key(&column) {
            return false;
        }
        self.columns.insert(column, FormatItem { key_type });
        true
    }

    pub fn key_type(&self, column: &str) -> Option<KeyType> {
        self.columns.get(column).map(|item| item.key_type)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, KeyType)> + '_ {
        self.columns
            .iter()
            .map(|(name, item)| (name.as_str(), item.key_type))
    }

    /// Checks every column name against the identifier conventions.
    /// Duplicate columns cannot exist (map-backed) and unknown types cannot
    /// be constructed, so names are the only thing left to validate.
    pub fn validate(&self) -> Result<()> {
        for (name, _) in self.columns.iter() {
            check_column_name(name)?;
        }
        Ok(())
    }

    /// Validation error naming the column, for coercion call sites.
    pub(crate) fn require(&self, column: &str) -> Result<KeyType> {
        self.key_type(column)
            .ok_or_else(|| validation(format!("column '{column}' is not declared in the format")))
    }
}

impl FromIterator<(String, KeyType)> for Format {
    fn from_iter<T: IntoIterator<Item = (String, KeyType)>>(iter: T) -> Self {
        let mut format = Format::new();
        for (column, key_type) in iter {
            format.insert(column, key_type);
        }
        format
    }
}
