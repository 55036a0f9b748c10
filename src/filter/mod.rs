//! # Filter Module
//!
//! Typed predicate evaluation over records. A filter is a conjunction of
//! `{key, op, value}` items; compiling it against a blob format coerces
//! every comparand once into its typed form, so evaluation over thousands
//! of records never re-parses wire values.
//!
//! ## Operators by column type
//!
//! | type       | operators                                        |
//! |------------|--------------------------------------------------|
//! | `string`   | `=`, `CONTAINS`, `PREFIX`, `SUFFIX` (case-insensitive) |
//! | `date`     | the string operators, plus `=`, `>`, `>=`, `<`, `<=` on parsed dates |
//! | `int`, `float` | `=`, `>`, `>=`, `<`, `<=`                    |
//! | `datetime` | `=`, `>`, `>=`, `<`, `<=` against a Unix-second comparand |
//! | `bool`     | `=`                                              |
//!
//! An empty filter matches every record. Comparand coercion failures are
//! filter errors surfaced at compile time; a stored value that fails to
//! parse during evaluation simply does not match (for dates) or surfaces a
//! corrupt-record error (for numerics and booleans).

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use eyre::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::error::validation;
use crate::schema::{coerce_int, Format, KeyType, Record};

const DATE_PATTERN: &str = "%Y-%m-%d";
const DATETIME_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// One wire-form predicate, as received from the query layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterItem {
    pub key: String,
    pub op: String,
    pub value: Value,
}

impl FilterItem {
    pub fn new(key: impl Into<String>, op: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            op: op.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    Prefix,
    Suffix,
}

impl Op {
    fn parse(op: &str) -> Result<Op> {
        match op {
            "=" => Ok(Op::Eq),
            ">" => Ok(Op::Gt),
            ">=" => Ok(Op::Ge),
            "<" => Ok(Op::Lt),
            "<=" => Ok(Op::Le),
            "CONTAINS" => Ok(Op::Contains),
            "PREFIX" => Ok(Op::Prefix),
            "SUFFIX" => Ok(Op::Suffix),
            other => Err(validation(format!("unknown operator '{other}'"))),
        }
    }

    fn is_ordered(self) -> bool {
        matches!(self, Op::Eq | Op::Gt | Op::Ge | Op::Lt | Op::Le)
    }

    fn is_textual(self) -> bool {
        matches!(self, Op::Eq | Op::Contains | Op::Prefix | Op::Suffix)
    }

    fn compare<T: PartialOrd>(self, value: &T, comparand: &T) -> bool {
        match self {
            Op::Eq => value == comparand,
            Op::Gt => value > comparand,
            Op::Ge => value >= comparand,
            Op::Lt => value < comparand,
            Op::Le => value <= comparand,
            _ => false,
        }
    }
}

/// A comparand coerced to the typed form its column requires.
#[derive(Debug, Clone, PartialEq)]
enum Comparand {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq)]
struct Predicate {
    key: String,
    op: Op,
    comparand: Comparand,
}

/// A compiled conjunction of predicates, ready for repeated evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    /// Matches every record.
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Compiles wire items against the blob format, coercing each comparand
    /// once. Unknown columns, unsupported operators, and uncoercible
    /// comparands are validation errors.
    pub fn compile(items: &[FilterItem], format: &Format) -> Result<Filter> {
        let mut predicates = Vec::with_capacity(items.len());
        for item in items {
            let key_type = format.require(&item.key)?;
            let op = Op::parse(&item.op)?;
            let comparand = coerce_comparand(&item.value, key_type, op).map_err(|err| {
                validation(format!("filter on '{}': {err}", item.key))
            })?;
            predicates.push(Predicate {
                key: item.key.clone(),
                op,
                comparand,
            });
        }
        Ok(Filter { predicates })
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluates the conjunction against one stored record.
    pub fn matches(&self, record: &Record) -> Result<bool> {
        for predicate in &self.predicates {
            let value = record.get(&predicate.key).ok_or_else(|| {
                validation(format!("'{}' not found in record", predicate.key))
            })?;
            if !evaluate(predicate, value)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn coerce_comparand(value: &Value, key_type: KeyType, op: Op) -> Result<Comparand> {
    match key_type {
        KeyType::String => {
            if !op.is_textual() {
                return Err(op_mismatch(op, key_type));
            }
            Ok(Comparand::Str(require_str(value)?.to_lowercase()))
        }
        KeyType::Date => {
            if op.is_ordered() {
                let text = require_str(value)?;
                let date = NaiveDate::parse_from_str(text, DATE_PATTERN)
                    .map_err(|_| validation(format!("'{text}' is not a YYYY-MM-DD date")))?;
                Ok(Comparand::Date(date))
            } else if op.is_textual() {
                Ok(Comparand::Str(require_str(value)?.to_lowercase()))
            } else {
                Err(op_mismatch(op, key_type))
            }
        }
        KeyType::Int => {
            if !op.is_ordered() {
                return Err(op_mismatch(op, key_type));
            }
            Ok(Comparand::Int(coerce_int(value)?))
        }
        KeyType::Float => {
            if !op.is_ordered() {
                return Err(op_mismatch(op, key_type));
            }
            match value.as_f64() {
                Some(f) if f.is_finite() => Ok(Comparand::Float(f)),
                _ => Err(validation(format!("{value} is not numeric"))),
            }
        }
        KeyType::DateTime => {
            if !op.is_ordered() {
                return Err(op_mismatch(op, key_type));
            }
            let secs = coerce_int(value)?;
            let moment = Local
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| validation(format!("{secs} is out of timestamp range")))?;
            Ok(Comparand::DateTime(moment.naive_local()))
        }
        KeyType::Bool => {
            if op != Op::Eq {
                return Err(op_mismatch(op, key_type));
            }
            match value {
                Value::Bool(b) => Ok(Comparand::Bool(*b)),
                other => Err(validation(format!("{other} is not a boolean"))),
            }
        }
    }
}

fn evaluate(predicate: &Predicate, value: &Value) -> Result<bool> {
    match &predicate.comparand {
        Comparand::Str(comparand) => {
            let text = require_stored_str(value)?.to_lowercase();
            Ok(match predicate.op {
                Op::Eq => text == *comparand,
                Op::Contains => text.contains(comparand.as_str()),
                Op::Prefix => text.starts_with(comparand.as_str()),
                Op::Suffix => text.ends_with(comparand.as_str()),
                _ => false,
            })
        }
        Comparand::Int(comparand) => {
            let stored = coerce_int(value)
                .map_err(|_| validation(format!("corrupt record value {value}")))?;
            Ok(predicate.op.compare(&stored, comparand))
        }
        Comparand::Float(comparand) => match value.as_f64() {
            Some(stored) => Ok(predicate.op.compare(&stored, comparand)),
            None => Err(validation(format!("corrupt record value {value}"))),
        },
        Comparand::Bool(comparand) => match value {
            Value::Bool(stored) => Ok(stored == comparand),
            other => Err(validation(format!("corrupt record value {other}"))),
        },
        Comparand::Date(comparand) => {
            let text = require_stored_str(value)?;
            match NaiveDate::parse_from_str(text, DATE_PATTERN) {
                Ok(stored) => Ok(predicate.op.compare(&stored, comparand)),
                Err(_) => Ok(false),
            }
        }
        Comparand::DateTime(comparand) => {
            let text = require_stored_str(value)?;
            match NaiveDateTime::parse_from_str(text, DATETIME_PATTERN) {
                Ok(stored) => Ok(predicate.op.compare(&stored, comparand)),
                Err(_) => Ok(false),
            }
        }
    }
}

fn op_mismatch(op: Op, key_type: KeyType) -> eyre::Report {
    validation(format!("operator {op:?} is not supported for {key_type} columns"))
}

fn require_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| validation(format!("{value} is not a string")))
}

fn require_stored_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| validation(format!("corrupt record value {value}")))
}
