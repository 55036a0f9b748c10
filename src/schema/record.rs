//! Record coercion: loosely typed wire values become the stored forms the
//! format declares.
//!
//! Inbound records arrive as JSON-derived trees. Each value is coerced to
//! its column's declared type before touching a page file:
//!
//! | keyType    | accepted input                 | stored form              |
//! |------------|--------------------------------|--------------------------|
//! | `string`   | string                         | string                   |
//! | `int`      | integer, or float with no fraction | i64                  |
//! | `float`    | any finite numeric             | f64                      |
//! | `bool`     | boolean                        | boolean                  |
//! | `date`     | integer Unix seconds           | `YYYY-MM-DD`             |
//! | `datetime` | integer Unix seconds           | `YYYY-MM-DD HH:MM:SS` local |

use chrono::{Local, TimeZone};
use eyre::Result;
use serde_json::Value;

use crate::error::validation;
use crate::schema::{Format, KeyType, Record};

/// Coerces an insert record. The record must carry exactly the format's
/// columns: no extras, none missing.
pub fn format_record(format: &Format, record: &Record) -> Result<Record> {
    if record.len() != format.len() {
        return Err(validation(format!(
            "record has {} columns, format declares {}",
            record.len(),
            format.len()
        )));
    }
    coerce_columns(format, record)
}

/// Coerces an update patch: any subset of the format's columns.
pub fn format_update_record(format: &Format, patch: &Record) -> Result<Record> {
    coerce_columns(format, patch)
}

fn coerce_columns(format: &Format, record: &Record) -> Result<Record> {
    let mut coerced = Record::new();
    for (column, value) in record {
        let key_type = format.require(column)?;
        let stored = coerce_value(value, key_type)
            .map_err(|err| validation(format!("column '{column}': {err}")))?;
        coerced.insert(column.clone(), stored);
    }
    Ok(coerced)
}

/// Coerces a single wire value to the stored form for `key_type`.
pub(crate) fn coerce_value(value: &Value, key_type: KeyType) -> Result<Value> {
    match key_type {
        KeyType::String => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            other => Err(validation(format!("{other} is not a string"))),
        },
        KeyType::Int => coerce_int(value).map(Value::from),
        KeyType::Float => coerce_float(value).map(|f| {
            // from_f64 only fails on non-finite input, which coerce_float rejects
            Value::Number(serde_json::Number::from_f64(f).unwrap())
        }),
        KeyType::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(validation(format!("{other} is not a boolean"))),
        },
        KeyType::Date => {
            let secs = coerce_int(value)?;
            Ok(Value::String(render_timestamp(secs, "%Y-%m-%d")?))
        }
        KeyType::DateTime => {
            let secs = coerce_int(value)?;
            Ok(Value::String(render_timestamp(secs, "%Y-%m-%d %H:%M:%S")?))
        }
    }
}

/// Integer coercion: exact integers pass; floats pass only with a zero
/// fractional part.
pub(crate) fn coerce_int(value: &Value) -> Result<i64> {
    let Value::Number(n) = value else {
        return Err(validation(format!("{value} is not an integer")));
    };
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    if let Some(f) = n.as_f64() {
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
            return Ok(f as i64);
        }
    }
    Err(validation(format!("{n} is not an integer")))
}

pub(crate) fn coerce_float(value: &Value) -> Result<f64> {
    let Value::Number(n) = value else {
        return Err(validation(format!("{value} is not numeric")));
    };
    match n.as_f64() {
        Some(f) if f.is_finite() => Ok(f),
        _ => Err(validation(format!("{n} is not a finite number"))),
    }
}

fn render_timestamp(secs: i64, pattern: &str) -> Result<String> {
    let moment = Local
        .timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| validation(format!("{secs} is out of timestamp range")))?;
    Ok(moment.format(pattern).to_string())
}

/// Textual rendering of a stored value, used as partition hash input.
/// Stored forms are strings, numbers, and booleans; anything else means the
/// record never went through coercion.
pub(crate) fn render_value(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(validation(format!("{other} has no stored rendering"))),
    }
}
