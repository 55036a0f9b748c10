//! # Error Classification
//!
//! Engine operations return `eyre::Result`. Failures that the boundary needs
//! to tell apart carry a [`StorageError`] at the root of the report chain;
//! everything else is either a wrapped `std::io::Error` or an internal error
//! with context attached via `wrap_err`.
//!
//! Rollback failures do not surface here at all: they abort the process,
//! because on-disk invariants are broken and cannot be restored.

use thiserror::Error;

/// Typed failures the engine boundary distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Missing database, blob, record, index entry, or partition entry.
    #[error("{0} not found")]
    NotFound(String),

    /// Name collision at create time.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Schema rule broken, name convention violated, unknown operator, or
    /// a value that cannot be coerced to its declared type.
    #[error("{0}")]
    Validation(String),
}

/// Coarse classification of a failed operation, for serializing errors to
/// a wire envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Validation,
    Io,
    Internal,
}

/// Classifies a report produced by any engine operation.
pub fn classify(err: &eyre::Report) -> ErrorKind {
    if let Some(storage) = err.downcast_ref::<StorageError>() {
        return match storage {
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StorageError::Validation(_) => ErrorKind::Validation,
        };
    }
    if err.downcast_ref::<std::io::Error>().is_some() {
        return ErrorKind::Io;
    }
    ErrorKind::Internal
}

pub(crate) fn is_not_found(err: &eyre::Report) -> bool {
    classify(err) == ErrorKind::NotFound
}

/// Shorthand constructors, so call sites stay as terse as a `bail!`.
pub(crate) fn not_found(what: impl Into<String>) -> eyre::Report {
    StorageError::NotFound(what.into()).into()
}

pub(crate) fn already_exists(what: impl Into<String>) -> eyre::Report {
    StorageError::AlreadyExists(what.into()).into()
}

pub(crate) fn validation(msg: impl Into<String>) -> eyre::Report {
    StorageError::Validation(msg.into()).into()
}
