//! # Disk Layer
//!
//! Everything that touches the filesystem lives here, split by artifact
//! scope:
//!
//! - [`layout`]: pure path mapping from logical identifiers to files
//! - [`io`]: scoped single-file operations (atomicity is per file)
//! - [`db`]: database directory life-cycle
//! - [`blob`]: blob scaffold, page files, index files, and the metadata
//!   artifacts that list them
//! - [`partition`]: hash-key directory and per-hash-key page chains,
//!   layered on the blob manager
//!
//! Multi-file sequences (scaffold creation, page allocation, page deletion)
//! roll back their partial state on failure; a rollback that itself fails
//! aborts the process, because the on-disk invariants can no longer be
//! restored.

pub mod blob;
pub mod db;
pub mod io;
pub mod layout;
pub mod partition;

pub use blob::{BlobDisk, PageItem, PrefixChain};
pub use db::DbDisk;
pub use layout::PathLayout;
pub use partition::{HashKeyChain, PartitionDisk};

/// Aborts after a failed rollback. Past this point the metadata artifacts
/// disagree with the directory contents and no caller can recover.
pub(crate) fn fatal(context: &str, err: &eyre::Report) -> ! {
    log::error!("rollback failed, on-disk state is corrupt: {context}: {err:#}");
    panic!("rollback failed: {context}: {err:#}");
}
