#![allow(dead_code)]

use std::path::{Path, PathBuf};

use pkwstore::storage::{fields, Store, Value};
use tempfile::TempDir;

/// Writes a small but complete election dataset into `dir`.
///
/// Two voivodships, three districts, four communes and five polling
/// districts: w1 holds communes g1-g3 and polling districts b1-b3, w2 holds
/// g4 with b4 and b5. Commune g2 has no polling district. Every list runs in
/// one constituency only: l1 and l2 in o1, l3 in o2.
pub fn write_dataset(dir: &Path) {
    let mut store = Store::open(dir, false).expect("open writable store");

    let t = store.create_table("województwa").unwrap();
    t.put(fields([("name", "wielkopolskie")]), Some("w1")).unwrap();
    t.put(fields([("name", "lubuskie")]), Some("w2")).unwrap();

    let t = store.create_table("powiaty").unwrap();
    t.put(fields([("name", "poznański"), ("voivodship", "w1")]), Some("p1"))
        .unwrap();
    t.put(fields([("name", "gnieźnieński"), ("voivodship", "w1")]), Some("p2"))
        .unwrap();
    t.put(fields([("name", "żarski"), ("voivodship", "w2")]), Some("p3"))
        .unwrap();

    let t = store.create_table("gminy").unwrap();
    t.put(fields([("name", "Kórnik"), ("district", "p1")]), Some("g1")).unwrap();
    t.put(fields([("name", "Mosina"), ("district", "p1")]), Some("g2")).unwrap();
    t.put(fields([("name", "Gniezno"), ("district", "p2")]), Some("g3")).unwrap();
    t.put(fields([("name", "Żary"), ("district", "p3")]), Some("g4")).unwrap();

    let t = store.create_table("okręgi").unwrap();
    t.put(
        fields([
            ("name", Value::from("Poznań")),
            ("number", 1.into()),
            ("districts", Value::from(vec!["p1", "p2"])),
        ]),
        Some("o1"),
    )
    .unwrap();
    t.put(
        fields([
            ("name", Value::from("Zielona Góra")),
            ("number", 2.into()),
            ("districts", Value::from("[\"p3\"]")),
        ]),
        Some("o2"),
    )
    .unwrap();

    let t = store.create_table("obwody").unwrap();
    t.put(fields([("commune", "g1"), ("address", "Szkoła nr 1")]), Some("b1"))
        .unwrap();
    t.put(fields([("commune", "g1"), ("address", "Szkoła nr 2")]), Some("b2"))
        .unwrap();
    t.put(fields([("commune", "g3"), ("constituency", "o1")]), Some("b3"))
        .unwrap();
    t.put(fields([("commune", "g4")]), Some("b4")).unwrap();
    t.put(fields([("commune", "g4")]), Some("b5")).unwrap();

    let t = store.create_table("protokoły").unwrap();
    for (pd, voters) in [("b1", 812), ("b2", 640), ("b3", 1033), ("b4", 455), ("b5", 97)] {
        t.put(
            fields([("obwod", Value::from(pd)), ("voters", voters.into())]),
            Some(format!("r{}", &pd[1..]).as_str()),
        )
        .unwrap();
    }

    let t = store.create_table("listy").unwrap();
    t.put(fields([("name", "Komitet A")]), Some("l1")).unwrap();
    t.put(fields([("name", "Komitet B")]), Some("l2")).unwrap();
    t.put(fields([("name", "Komitet C")]), Some("l3")).unwrap();

    let t = store.create_table("kandydaci").unwrap();
    t.put(fields([("constituency", "o1"), ("list", "l1")]), Some("k1")).unwrap();
    t.put(fields([("constituency", "o1"), ("list", "l2")]), Some("k2")).unwrap();
    t.put(fields([("constituency", "o2"), ("list", "l3")]), Some("k3")).unwrap();

    let t = store.create_table("mandaty").unwrap();
    t.put(fields([("candidate", "k1")]), Some("m1")).unwrap();
    t.put(fields([("candidate", "k3")]), Some("m2")).unwrap();

    let t = store.create_table("wyniki_1").unwrap();
    t.put(fields([("obwod", Value::from("b1")), ("k1", 300.into()), ("k2", 200.into())]), Some("x1"))
        .unwrap();
    t.put(fields([("obwod", Value::from("b2")), ("k1", 150.into()), ("k2", 210.into())]), Some("x2"))
        .unwrap();
    t.put(fields([("obwod", Value::from("b3")), ("k1", 410.into()), ("k2", 380.into())]), Some("x3"))
        .unwrap();

    let t = store.create_table("wyniki_2").unwrap();
    t.put(fields([("obwod", Value::from("b4")), ("k3", 222.into())]), Some("x4"))
        .unwrap();
    t.put(fields([("obwod", Value::from("b5")), ("k3", 41.into())]), Some("x5"))
        .unwrap();

    store.dump().expect("dump dataset");
}

/// Temporary directory holding the dataset, plus the store path inside it.
pub fn dataset() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("sejm");
    write_dataset(&path);
    (dir, path)
}

pub fn open_read_only(path: &Path) -> Store {
    Store::open(path, true).expect("open read-only store")
}
