//! Database directory life-cycle.

use eyre::Result;

use crate::disk::{io, PathLayout};

/// Creates, deletes, and probes database directories under the data root.
#[derive(Debug, Clone)]
pub struct DbDisk {
    layout: PathLayout,
}

impl DbDisk {
    pub fn new(layout: PathLayout) -> Self {
        Self { layout }
    }

    /// Fails with `AlreadyExists` when the database is already present.
    pub fn create(&self, db: &str) -> Result<()> {
        io::create_dir(&self.layout.db_dir(db))
    }

    /// Recursive removal; a non-empty database is deleted along with every
    /// blob inside it.
    pub fn delete(&self, db: &str) -> Result<()> {
        io::remove_dir_all(&self.layout.db_dir(db))
    }

    pub fn exists(&self, db: &str) -> bool {
        io::exists(&self.layout.db_dir(db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify, ErrorKind};
    use tempfile::tempdir;

    #[test]
    fn create_then_exists_then_delete() {
        let dir = tempdir().unwrap();
        let disk = DbDisk::new(PathLayout::new(dir.path()));
        disk.create("app").unwrap();
        assert!(disk.exists("app"));
        disk.delete("app").unwrap();
        assert!(!disk.exists("app"));
    }

    #[test]
    fn duplicate_create_is_already_exists() {
        let dir = tempdir().unwrap();
        let disk = DbDisk::new(PathLayout::new(dir.path()));
        disk.create("app").unwrap();
        let err = disk.create("app").unwrap_err();
        assert_eq!(classify(&err), ErrorKind::AlreadyExists);
    }

    #[test]
    fn delete_is_recursive() {
        let dir = tempdir().unwrap();
        let disk = DbDisk::new(PathLayout::new(dir.path()));
        disk.create("app").unwrap();
        std::fs::create_dir(dir.path().join("app/users")).unwrap();
        std::fs::write(dir.path().join("app/users/format.json"), b"{}").unwrap();
        disk.delete("app").unwrap();
        assert!(!disk.exists("app"));
    }
}
