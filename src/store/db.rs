//! Database life-cycle operations.

use eyre::Result;

use crate::disk::DbDisk;
use crate::error::not_found;
use crate::schema::check_db_name;

/// Creates and deletes databases under the data root.
#[derive(Debug, Clone)]
pub struct DbStore {
    disk: DbDisk,
}

impl DbStore {
    pub fn new(disk: DbDisk) -> Self {
        Self { disk }
    }

    /// Validates the name convention and creates the database directory.
    pub fn create_db(&self, db: &str) -> Result<()> {
        check_db_name(db)?;
        self.disk.create(db)
    }

    /// Deletes a database and everything in it.
    pub fn delete_db(&self, db: &str) -> Result<()> {
        if !self.disk.exists(db) {
            return Err(not_found(format!("database {db}")));
        }
        self.disk.delete(db)
    }

    pub fn db_exists(&self, db: &str) -> bool {
        self.disk.exists(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::PathLayout;
    use crate::error::{classify, ErrorKind};
    use tempfile::tempdir;

    fn setup(dir: &std::path::Path) -> DbStore {
        DbStore::new(DbDisk::new(PathLayout::new(dir)))
    }

    #[test]
    fn create_and_delete_round_trip() {
        let dir = tempdir().unwrap();
        let store = setup(dir.path());
        store.create_db("app").unwrap();
        assert!(store.db_exists("app"));
        store.delete_db("app").unwrap();
        assert!(!store.db_exists("app"));
    }

    #[test]
    fn invalid_names_are_rejected_before_touching_disk() {
        let dir = tempdir().unwrap();
        let store = setup(dir.path());
        let err = store.create_db("App-1").unwrap_err();
        assert_eq!(classify(&err), ErrorKind::Validation);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn deleting_a_missing_database_is_not_found() {
        let dir = tempdir().unwrap();
        let store = setup(dir.path());
        let err = store.delete_db("ghost").unwrap_err();
        assert_eq!(classify(&err), ErrorKind::NotFound);
    }
}
