//! End-to-end scenarios for the engine surface: create/round-trip, paging,
//! filtered scans, delete cleanup, and scaffold rollback. Each test drives
//! the public API only and checks observable on-disk state through the
//! documented JSON artifacts.

use blobdb::{classify, Engine, ErrorKind, FilterItem, Format, KeyType, Record};
use serde_json::json;
use tempfile::tempdir;

fn record(value: serde_json::Value) -> Record {
    value.as_object().unwrap().clone()
}

fn users_format() -> Format {
    let mut format = Format::new();
    format.insert("full_name", KeyType::String);
    format.insert("age", KeyType::Int);
    format.insert("active", KeyType::Bool);
    format
}

fn jane() -> Record {
    record(json!({"full_name": "Jane", "age": 33, "active": true}))
}

mod create_and_round_trip {
    use super::*;

    #[test]
    fn inserted_record_comes_back_by_id() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();

        let outcome = engine.add_record("app", "users", &jane()).unwrap();
        let id = outcome.last_record_id.unwrap();

        let fetched = engine.get_record_by_index("app", "users", &id).unwrap();
        assert_eq!(fetched, jane());
    }

    #[test]
    fn coercion_is_applied_before_storage() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();

        // an integral float is accepted for an int column and stored as int
        let input = record(json!({"full_name": "Jane", "age": 33.0, "active": true}));
        let id = engine
            .add_record("app", "users", &input)
            .unwrap()
            .last_record_id
            .unwrap();
        let fetched = engine.get_record_by_index("app", "users", &id).unwrap();
        assert_eq!(fetched["age"], json!(33));
    }

    #[test]
    fn blob_create_delete_create_succeeds() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();
        engine.delete_blob("app", "users").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();
        assert!(engine.blob_exists("app", "users"));
    }

    #[test]
    fn update_by_id_observes_the_merged_record() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();
        let id = engine
            .add_record("app", "users", &jane())
            .unwrap()
            .last_record_id
            .unwrap();

        engine
            .update_record_by_index("app", "users", &id, &record(json!({"age": 34})))
            .unwrap();
        let fetched = engine.get_record_by_index("app", "users", &id).unwrap();
        assert_eq!(
            fetched,
            record(json!({"full_name": "Jane", "age": 34, "active": true}))
        );
    }

    #[test]
    fn deleted_record_fetches_as_not_found() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();
        let id = engine
            .add_record("app", "users", &jane())
            .unwrap()
            .last_record_id
            .unwrap();

        engine.delete_record_by_index("app", "users", &id).unwrap();
        let err = engine.get_record_by_index("app", "users", &id).unwrap_err();
        assert_eq!(classify(&err), ErrorKind::NotFound);
    }

    #[test]
    fn duplicate_database_is_already_exists() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_db("app").unwrap();
        let err = engine.create_db("app").unwrap_err();
        assert_eq!(classify(&err), ErrorKind::AlreadyExists);
    }

    #[test]
    fn deleting_a_database_removes_its_blobs() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();
        engine.delete_db("app").unwrap();
        assert!(!engine.db_exists("app"));
        assert!(!engine.blob_exists("app", "users"));
    }
}

mod paging {
    use super::*;

    fn page_file_names(root: &std::path::Path) -> Vec<String> {
        let pages: Vec<serde_json::Value> = serde_json::from_slice(
            &std::fs::read(root.join("app/users/pages.json")).unwrap(),
        )
        .unwrap();
        pages
            .iter()
            .map(|item| item["fileName"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn four_records_against_a_cap_of_three_split_three_and_one() {
        let dir = tempdir().unwrap();
        let engine = Engine::builder(dir.path()).max_page_size(3).open().unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();

        let records: Vec<Record> = (0..4)
            .map(|i| record(json!({"full_name": format!("u{i}"), "age": i, "active": true})))
            .collect();
        engine.add_records("app", "users", &records).unwrap();

        let pages = page_file_names(dir.path());
        assert_eq!(pages.len(), 2);

        let first: Record = {
            let data: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(
                &std::fs::read(dir.path().join("app/users").join(&pages[0])).unwrap(),
            )
            .unwrap();
            assert_eq!(data.len(), 3);
            data.values().next().unwrap().as_object().unwrap().clone()
        };
        assert!(first.contains_key("full_name"));

        let second: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(
            &std::fs::read(dir.path().join("app/users").join(&pages[1])).unwrap(),
        )
        .unwrap();
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn page_count_is_ceiling_of_records_over_cap() {
        let dir = tempdir().unwrap();
        let engine = Engine::builder(dir.path()).max_page_size(4).open().unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();

        let records: Vec<Record> = (0..10)
            .map(|i| record(json!({"full_name": format!("u{i}"), "age": i, "active": true})))
            .collect();
        engine.add_records("app", "users", &records).unwrap();
        // ⌈10 / 4⌉
        assert_eq!(page_file_names(dir.path()).len(), 3);
    }

    #[test]
    fn exactly_cap_records_stay_on_one_page() {
        let dir = tempdir().unwrap();
        let engine = Engine::builder(dir.path()).max_page_size(3).open().unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();

        let records: Vec<Record> = (0..3)
            .map(|i| record(json!({"full_name": format!("u{i}"), "age": i, "active": true})))
            .collect();
        engine.add_records("app", "users", &records).unwrap();
        assert_eq!(page_file_names(dir.path()).len(), 1);
    }

    #[test]
    fn index_files_never_exceed_cap_plus_one() {
        let dir = tempdir().unwrap();
        let engine = Engine::builder(dir.path()).max_index_size(1).open().unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();

        let records: Vec<Record> = (0..100)
            .map(|i| record(json!({"full_name": format!("u{i}"), "age": i, "active": true})))
            .collect();
        let outcome = engine.add_records("app", "users", &records).unwrap();

        let indexes_dir = dir.path().join("app/users/indexes");
        for entry in std::fs::read_dir(indexes_dir).unwrap() {
            let data: serde_json::Map<String, serde_json::Value> =
                serde_json::from_slice(&std::fs::read(entry.unwrap().path()).unwrap()).unwrap();
            assert!(data.len() <= 2, "index file holds {} entries", data.len());
        }

        // every record remains reachable after the chains grew
        for page_records in outcome.pages.values() {
            for id in page_records.keys() {
                assert!(engine.get_record_by_index("app", "users", id).is_ok());
            }
        }
    }
}

mod filtered_scans {
    use super::*;

    fn items_format() -> Format {
        let mut format = Format::new();
        format.insert("category", KeyType::String);
        format.insert("rank", KeyType::Int);
        format
    }

    #[test]
    fn conjunction_selects_the_single_matching_record() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "items", &items_format()).unwrap();
        engine
            .add_records(
                "app",
                "items",
                &[
                    record(json!({"category": "A", "rank": 1})),
                    record(json!({"category": "A", "rank": 7})),
                    record(json!({"category": "B", "rank": 5})),
                ],
            )
            .unwrap();

        let hits = engine
            .get_records_full_scan(
                "app",
                "items",
                &[
                    FilterItem::new("category", "=", json!("A")),
                    FilterItem::new("rank", ">=", json!(5)),
                ],
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        let hit = hits.values().next().unwrap();
        assert_eq!(hit["rank"], json!(7));
        assert_eq!(hit["category"], json!("A"));
    }

    #[test]
    fn filtered_update_and_delete_report_affected_records() {
        let dir = tempdir().unwrap();
        let engine = Engine::builder(dir.path()).max_page_size(2).open().unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "items", &items_format()).unwrap();
        engine
            .add_records(
                "app",
                "items",
                &(0..6)
                    .map(|i| record(json!({"category": if i % 2 == 0 { "A" } else { "B" }, "rank": i})))
                    .collect::<Vec<_>>(),
            )
            .unwrap();

        let updated = engine
            .update_records(
                "app",
                "items",
                &record(json!({"rank": 100})),
                &[FilterItem::new("category", "=", json!("A"))],
            )
            .unwrap();
        assert_eq!(updated.len(), 3);

        let deleted = engine
            .delete_records(
                "app",
                "items",
                &[FilterItem::new("rank", "=", json!(100))],
            )
            .unwrap();
        assert_eq!(deleted.len(), 3);

        let left = engine.get_records_full_scan("app", "items", &[]).unwrap();
        assert_eq!(left.len(), 3);
        for rec in left.values() {
            assert_eq!(rec["category"], json!("B"));
        }
    }

    #[test]
    fn bad_comparand_surfaces_as_validation() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "items", &items_format()).unwrap();

        let err = engine
            .get_records_full_scan(
                "app",
                "items",
                &[FilterItem::new("rank", ">=", json!("five"))],
            )
            .unwrap_err();
        assert_eq!(classify(&err), ErrorKind::Validation);
    }
}

mod delete_cleanup {
    use super::*;

    #[test]
    fn deleting_the_only_record_empties_every_artifact() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();
        let id = engine
            .add_record("app", "users", &jane())
            .unwrap()
            .last_record_id
            .unwrap();

        engine.delete_record_by_index("app", "users", &id).unwrap();

        let blob_dir = dir.path().join("app/users");
        let pages: Vec<serde_json::Value> =
            serde_json::from_slice(&std::fs::read(blob_dir.join("pages.json")).unwrap()).unwrap();
        assert!(pages.is_empty());
        let indexes: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&std::fs::read(blob_dir.join("indexes.json")).unwrap()).unwrap();
        assert!(indexes.is_empty());
        assert_eq!(std::fs::read_dir(blob_dir.join("pages")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(blob_dir.join("indexes")).unwrap().count(), 0);
    }

    #[test]
    fn filtered_delete_of_everything_leaves_no_dangling_references() {
        let dir = tempdir().unwrap();
        let engine = Engine::builder(dir.path()).max_page_size(2).open().unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();
        let records: Vec<Record> = (0..7)
            .map(|i| record(json!({"full_name": format!("u{i}"), "age": i, "active": true})))
            .collect();
        engine.add_records("app", "users", &records).unwrap();

        let removed = engine.delete_records("app", "users", &[]).unwrap();
        assert_eq!(removed.len(), 7);

        let blob_dir = dir.path().join("app/users");
        let pages: Vec<serde_json::Value> =
            serde_json::from_slice(&std::fs::read(blob_dir.join("pages.json")).unwrap()).unwrap();
        assert!(pages.is_empty());
        let indexes: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&std::fs::read(blob_dir.join("indexes.json")).unwrap()).unwrap();
        assert!(indexes.is_empty());
        assert_eq!(std::fs::read_dir(blob_dir.join("pages")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(blob_dir.join("indexes")).unwrap().count(), 0);
    }
}

/// Invariant: the union of records across pages equals the domain of the
/// index, across all prefix chains.
mod index_page_agreement {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn pages_and_index_cover_the_same_ids() {
        let dir = tempdir().unwrap();
        let engine = Engine::builder(dir.path()).max_page_size(3).open().unwrap();
        engine.create_db("app").unwrap();
        engine.create_blob("app", "users", &users_format()).unwrap();
        let records: Vec<Record> = (0..10)
            .map(|i| record(json!({"full_name": format!("u{i}"), "age": i, "active": true})))
            .collect();
        engine.add_records("app", "users", &records).unwrap();
        // perturb the blob a little
        let scan = engine.get_records_full_scan("app", "users", &[]).unwrap();
        let some_id = scan.keys().next().unwrap().clone();
        engine.delete_record_by_index("app", "users", &some_id).unwrap();

        let blob_dir = dir.path().join("app/users");
        let mut page_ids = BTreeSet::new();
        for entry in std::fs::read_dir(blob_dir.join("pages")).unwrap() {
            let data: serde_json::Map<String, serde_json::Value> =
                serde_json::from_slice(&std::fs::read(entry.unwrap().path()).unwrap()).unwrap();
            page_ids.extend(data.keys().cloned());
        }
        let mut index_ids = BTreeSet::new();
        for entry in std::fs::read_dir(blob_dir.join("indexes")).unwrap() {
            let data: serde_json::Map<String, serde_json::Value> =
                serde_json::from_slice(&std::fs::read(entry.unwrap().path()).unwrap()).unwrap();
            index_ids.extend(data.keys().cloned());
        }
        assert_eq!(page_ids, index_ids);
        assert_eq!(page_ids.len(), 9);
    }
}

/// A scaffold step that fails must roll the whole blob directory back.
/// The failure is injected by sizing paths so that the blob directory and
/// the first scaffold writes fit inside `PATH_MAX` while the third write's
/// temp file does not.
#[cfg(target_os = "linux")]
mod scaffold_rollback {
    use super::*;
    use blobdb::disk::{BlobDisk, PathLayout};

    #[test]
    fn failed_blob_create_leaves_no_residue() {
        let dir = tempdir().unwrap();
        let mut root = dir.path().to_path_buf();
        while root.as_os_str().len() < 3830 {
            root.push("x".repeat(100));
        }
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir(root.join("d")).unwrap();

        // blob dir length lands at exactly 4079: "<dir>/indexes.json.tmp"
        // (16 + separator) crosses 4096, everything shorter fits
        let blob_name = "b".repeat(4079 - root.as_os_str().len() - 3);
        let disk = BlobDisk::new(PathLayout::new(&root));
        let format: Format = {
            let mut f = Format::new();
            f.insert("name", KeyType::String);
            f
        };

        let err = disk.create_blob("d", &blob_name, &format);
        assert!(err.is_err());

        // the half-built blob directory was removed entirely
        assert_eq!(std::fs::read_dir(root.join("d")).unwrap().count(), 0);
    }
}
