#![allow(missing_docs)]

mod fixture;

use std::collections::BTreeMap;
use std::fs;

use pkwstore::storage::{fields, Fields, Query, Store, StoreOptions, Value};
use pkwstore::StoreError;
use proptest::prelude::*;
use tempfile::TempDir;

#[test]
fn dump_and_reopen_preserves_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let mut store = Store::open(&path, false).unwrap();
    let t = store.create_table("mixed").unwrap();
    t.put(
        fields([
            ("code", Value::from("007")),
            ("flag", true.into()),
            ("share", 0.25.into()),
            ("count", 42.into()),
            ("tags", Value::from(vec!["a", "b"])),
            ("note", Value::from("[not json")),
            ("missing", Value::Null),
        ]),
        Some("r1"),
    )
    .unwrap();
    let generated = t.put(fields([("count", -1)]), None).unwrap();
    store.dump().unwrap();

    let reopened = Store::open(&path, true).unwrap();
    let mixed = reopened.table("mixed").unwrap();
    assert_eq!(mixed.ids().collect::<Vec<_>>(), vec!["r1", generated.as_str()]);
    let r1 = mixed.get("r1").unwrap();
    assert_eq!(r1["code"], Value::from("007"));
    assert_eq!(r1["flag"], Value::Bool(true));
    assert_eq!(r1["share"], Value::Float(0.25));
    assert_eq!(r1["count"], Value::Int(42));
    assert_eq!(r1["tags"], Value::from(vec!["a", "b"]));
    assert_eq!(r1["note"], Value::from("[not json"));
    assert!(!r1.contains_key("missing"));
    assert_eq!(mixed.get(&generated).unwrap(), fields([("count", -1)]));
}

#[test]
fn fixture_dataset_reopens_with_every_table() {
    let (_dir, path) = fixture::dataset();
    let store = fixture::open_read_only(&path);
    assert_eq!(
        store.table_names(),
        vec![
            "gminy",
            "kandydaci",
            "listy",
            "mandaty",
            "obwody",
            "okręgi",
            "powiaty",
            "protokoły",
            "województwa",
            "wyniki_1",
            "wyniki_2",
        ]
    );
    let okregi = store.table("okręgi").unwrap();
    assert_eq!(
        okregi.get("o1").unwrap()["districts"],
        Value::from(vec!["p1", "p2"])
    );
    let first = store
        .table("obwody")
        .unwrap()
        .find_one(&Query::all().eq("commune", "g4"))
        .unwrap();
    assert_eq!(first.id, "b4");
}

#[test]
fn file_without_id_column_uses_row_numbers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("listy.csv"), "name;number\nKomitet A;1\nKomitet B;2\n").unwrap();
    let store = Store::open(dir.path(), true).unwrap();
    let listy = store.table("listy").unwrap();
    assert_eq!(listy.ids().collect::<Vec<_>>(), vec!["0", "1"]);
    assert_eq!(listy.get("1").unwrap()["number"], Value::Int(2));
}

#[test]
fn comma_delimited_files_load_with_matching_option() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("gminy.csv"), "_id,name\ng1,Kórnik\n").unwrap();
    let options = StoreOptions {
        delimiter: b',',
        ..StoreOptions::read_only()
    };
    let store = Store::open_with_options(dir.path(), options).unwrap();
    assert_eq!(
        store.table("gminy").unwrap().get("g1").unwrap()["name"],
        Value::from("Kórnik")
    );
}

#[test]
fn duplicate_ids_on_disk_are_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("gminy.csv"), "_id;name\ng1;a\ng1;b\n").unwrap();
    let store = Store::open(dir.path(), true).unwrap();
    assert!(matches!(
        store.table("gminy"),
        Err(StoreError::Corruption { .. })
    ));
}

#[test]
fn missing_directory_is_created_only_when_writable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh");
    let options = StoreOptions {
        create_if_missing: false,
        ..StoreOptions::default()
    };
    assert!(matches!(
        Store::open_with_options(&path, options),
        Err(StoreError::MissingDirectory(_))
    ));
    let mut store = Store::open(&path, false).unwrap();
    store.dump().unwrap();
    assert!(path.is_dir());
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<bool>().prop_map(Value::Bool),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[a-zA-Z0-9 ;,.\"\\[\\]-]{0,12}".prop_map(Value::Str),
        proptest::collection::vec(any::<i32>().prop_map(|v| Value::Int(v.into())), 0..4)
            .prop_map(Value::List),
    ]
}

fn table_strategy() -> impl Strategy<Value = BTreeMap<String, Fields>> {
    proptest::collection::btree_map(
        "[a-z0-9]{1,8}",
        proptest::collection::btree_map("[a-z]{1,6}", value_strategy(), 0..5),
        0..12,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn tables_survive_dump_and_reload(rows in table_strategy()) {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(dir.path(), false).unwrap();
        let table = store.create_table("t").unwrap();
        for (id, row) in &rows {
            table.put(row.clone(), Some(id)).unwrap();
        }
        store.dump().unwrap();

        let reopened = Store::open(dir.path(), true).unwrap();
        let loaded = reopened.table("t").unwrap();
        prop_assert_eq!(loaded.len(), rows.len());
        for (id, row) in &rows {
            prop_assert_eq!(&loaded.get(id).unwrap(), row);
        }
    }

    #[test]
    fn find_agrees_with_linear_filter(
        rows in table_strategy(),
        field in "[a-z]{1,6}",
        needle in value_strategy(),
    ) {
        let mut store = Store::empty(false);
        let table = store.create_table("t").unwrap();
        for (id, row) in &rows {
            table.put(row.clone(), Some(id)).unwrap();
        }
        let expected: Vec<&String> = rows
            .iter()
            .filter(|(_, row)| row.get(&field) == Some(&needle))
            .map(|(id, _)| id)
            .collect();
        let found = table.find(&Query::all().eq(field.as_str(), needle.clone()));
        let found_ids: Vec<&String> = found.iter().map(|r| &r.id).collect();
        prop_assert_eq!(found_ids, expected);
    }
}
