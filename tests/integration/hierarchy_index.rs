#![allow(missing_docs)]

mod fixture;

use std::fs;

use pkwstore::hierarchy::{EntityKind, Granularity, HierarchyIndex, Schema};
use pkwstore::storage::{fields, Store, Value};
use pkwstore::StoreError;

fn index_of(store: &Store) -> HierarchyIndex {
    HierarchyIndex::new(store).expect("build index")
}

#[test]
fn voivodship_closures_cover_the_expected_records() {
    let (_dir, path) = fixture::dataset();
    let store = fixture::open_read_only(&path);
    let index = index_of(&store);

    let w1 = index.closure(Granularity::Voivodship, "w1").unwrap();
    assert_eq!(w1.constituencies, vec!["o1"]);
    assert_eq!(w1.districts, vec!["p1", "p2"]);
    assert_eq!(w1.communes, vec!["g1", "g2", "g3"]);
    assert_eq!(w1.polling_districts, vec!["b1", "b2", "b3"]);
    assert_eq!(w1.protocols, vec!["r1", "r2", "r3"]);
    assert_eq!(w1.candidates, vec!["k1", "k2"]);
    assert_eq!(w1.lists, vec!["l1", "l2"]);
    assert_eq!(w1.mandates, vec!["m1"]);
    assert_eq!(w1.results.len(), 1);
    assert_eq!(w1.results["wyniki_1"], vec!["x1", "x2", "x3"]);

    let w2 = index.closure(Granularity::Voivodship, "w2").unwrap();
    assert_eq!(w2.communes, vec!["g4"]);
    assert_eq!(w2.polling_districts, vec!["b4", "b5"]);
    assert_eq!(w2.lists, vec!["l3"]);
    assert_eq!(w2.mandates, vec!["m2"]);
    assert_eq!(w2.results["wyniki_2"], vec!["x4", "x5"]);
}

#[test]
fn every_walk_up_the_hierarchy_agrees() {
    let (_dir, path) = fixture::dataset();
    let store = fixture::open_read_only(&path);
    let index = index_of(&store);
    let gminy = store.table("gminy").unwrap();
    let powiaty = store.table("powiaty").unwrap();

    for commune in index.units(Granularity::Commune) {
        let district = gminy.get(commune).unwrap()["district"].as_key().unwrap();
        let direct = powiaty.get(&district).unwrap()["voivodship"].as_key().unwrap();

        let via_index = index
            .related(Granularity::Commune, commune, EntityKind::Voivodship)
            .unwrap();
        assert_eq!(via_index, vec![direct.clone()], "commune {commune}");

        let constituency = index
            .related(Granularity::Commune, commune, EntityKind::Constituency)
            .unwrap();
        let via_constituency = index
            .related(Granularity::Constituency, &constituency[0], EntityKind::Voivodship)
            .unwrap();
        assert_eq!(via_constituency, vec![direct], "commune {commune}");
    }
}

#[test]
fn district_closure_scopes_results_to_its_polling_districts() {
    let (_dir, path) = fixture::dataset();
    let store = fixture::open_read_only(&path);
    let index = index_of(&store);

    let p2 = index.closure(Granularity::District, "p2").unwrap();
    assert_eq!(p2.voivodships, vec!["w1"]);
    assert_eq!(p2.constituencies, vec!["o1"]);
    assert_eq!(p2.communes, vec!["g3"]);
    assert_eq!(p2.polling_districts, vec!["b3"]);
    assert_eq!(p2.results["wyniki_1"], vec!["x3"]);
    assert_eq!(p2.candidates, vec!["k1", "k2"]);
}

#[test]
fn schema_file_renames_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("renamed");
    let mut store = Store::open(&path, false).unwrap();
    store
        .create_table("regions")
        .unwrap()
        .put(fields([("name", "x")]), Some("v"))
        .unwrap();
    store
        .create_table("counties")
        .unwrap()
        .put(fields([("parent", "v")]), Some("d"))
        .unwrap();
    store
        .create_table("seats")
        .unwrap()
        .put(fields([("districts", Value::from(vec!["d"])), ("number", 7.into())]), Some("c"))
        .unwrap();
    store.dump().unwrap();

    let schema_path = dir.path().join("schema.toml");
    fs::write(
        &schema_path,
        "[tables]\nvoivodships = \"regions\"\ndistricts = \"counties\"\nconstituencies = \"seats\"\n\n[links]\ndistrict_voivodship = \"parent\"\n",
    )
    .unwrap();
    let schema = Schema::load(&schema_path).unwrap();
    let store = Store::open(&path, true).unwrap();
    let index = HierarchyIndex::build(&store, schema).unwrap();
    assert_eq!(
        index.related(Granularity::Voivodship, "v", EntityKind::District).unwrap(),
        vec!["d"]
    );
    assert_eq!(index.constituencies_without_results(), vec!["c"]);
}

#[test]
fn broken_link_on_disk_is_malformed() {
    let (_dir, path) = fixture::dataset();
    let mut store = Store::open(&path, false).unwrap();
    store
        .table_mut("protokoły")
        .unwrap()
        .put(fields([("obwod", "b404")]), Some("r404"))
        .unwrap();
    store.dump().unwrap();

    let store = fixture::open_read_only(&path);
    match HierarchyIndex::new(&store) {
        Err(StoreError::MalformedHierarchy(message)) => {
            assert!(message.contains("b404"), "{message}")
        }
        other => panic!("expected malformed hierarchy, got {other:?}"),
    }
}

#[test]
fn writable_store_cannot_be_indexed() {
    let (_dir, path) = fixture::dataset();
    let store = Store::open(&path, false).unwrap();
    assert!(matches!(
        HierarchyIndex::new(&store),
        Err(StoreError::NotFrozen(_))
    ));
}

#[test]
fn zero_padded_territorial_codes_link_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("teryt");
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("województwa.csv"), "_id;name\n02;dolnośląskie\n").unwrap();
    fs::write(path.join("powiaty.csv"), "_id;name;voivodship\n0201;bolesławiecki;02\n").unwrap();
    fs::write(path.join("gminy.csv"), "_id;name;district\n020101;Bolesławiec;0201\n").unwrap();
    fs::write(path.join("okręgi.csv"), "_id;number;districts\n1;1;\"[\"\"0201\"\"]\"\n").unwrap();

    let store = Store::open(&path, true).unwrap();
    assert_eq!(store.table("powiaty").unwrap().get("0201").unwrap()["voivodship"], Value::from("02"));
    let index = index_of(&store);
    assert_eq!(
        index.related(Granularity::Commune, "020101", EntityKind::Voivodship).unwrap(),
        vec!["02"]
    );
    assert_eq!(
        index.related(Granularity::Voivodship, "02", EntityKind::Constituency).unwrap(),
        vec!["1"]
    );
}
