#![allow(missing_docs)]

mod fixture;

use std::collections::BTreeSet;

use pkwstore::hierarchy::{Granularity, HierarchyIndex};
use pkwstore::partition::{Partition, Partitioner};
use pkwstore::storage::{Query, Store};
use pkwstore::{Result, StoreError};

fn ids(store: &Store, table: &str) -> Vec<String> {
    store
        .table_opt(table)
        .unwrap()
        .map(|t| t.ids().map(str::to_string).collect())
        .unwrap_or_default()
}

fn partitions(store: &Store, index: &HierarchyIndex, g: Granularity) -> Vec<Partition> {
    Partitioner::new(store, index)
        .partition(g)
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
}

#[test]
fn voivodship_split_matches_the_dataset() {
    let (_dir, path) = fixture::dataset();
    let store = fixture::open_read_only(&path);
    let index = HierarchyIndex::new(&store).unwrap();
    let parts = partitions(&store, &index, Granularity::Voivodship);

    assert_eq!(parts.len(), 2);
    let (w1, w2) = (&parts[0], &parts[1]);
    assert_eq!(w1.unit.id, "w1");
    assert_eq!(ids(&w1.store, "obwody").len(), 3);
    assert_eq!(ids(&w2.store, "obwody").len(), 2);
    assert_eq!(ids(&w1.store, "gminy").len() + ids(&w2.store, "gminy").len(), 4);
    assert!(w1.store.has_table("wyniki_1"));
    assert!(!w1.store.has_table("wyniki_2"));
    assert!(!ids(&w1.store, "gminy").contains(&"g4".to_string()));
}

#[test]
fn leaf_records_are_partitioned_exactly_at_every_granularity() {
    let (_dir, path) = fixture::dataset();
    let store = fixture::open_read_only(&path);
    let index = HierarchyIndex::new(&store).unwrap();

    for g in Granularity::ALL {
        let mut tables = vec!["obwody", "protokoły", "gminy", "wyniki_1", "wyniki_2"];
        if matches!(g, Granularity::Voivodship | Granularity::Constituency) {
            tables.extend(["kandydaci", "mandaty", "listy"]);
        }
        for table in tables {
            let mut seen = BTreeSet::new();
            let mut total = 0;
            for part in partitions(&store, &index, g) {
                for id in ids(&part.store, table) {
                    total += 1;
                    seen.insert(id);
                }
            }
            let all: BTreeSet<String> = ids(&store, table).into_iter().collect();
            assert_eq!(seen, all, "{table} coverage at {g}");
            assert_eq!(total, all.len(), "{table} overlaps at {g}");
        }
    }
}

#[test]
fn candidates_are_shared_within_a_constituency_below_it() {
    let (_dir, path) = fixture::dataset();
    let store = fixture::open_read_only(&path);
    let index = HierarchyIndex::new(&store).unwrap();

    let by_constituency = partitions(&store, &index, Granularity::Constituency);
    let total: usize = by_constituency
        .iter()
        .map(|p| ids(&p.store, "kandydaci").len())
        .sum();
    assert_eq!(total, 3);

    let by_commune = partitions(&store, &index, Granularity::Commune);
    let g1 = by_commune.iter().find(|p| p.unit.id == "g1").unwrap();
    let g2 = by_commune.iter().find(|p| p.unit.id == "g2").unwrap();
    assert_eq!(ids(&g1.store, "kandydaci"), vec!["k1", "k2"]);
    assert_eq!(ids(&g2.store, "kandydaci"), vec!["k1", "k2"]);
    assert!(ids(&g2.store, "obwody").is_empty());
}

#[test]
fn sub_stores_hold_equal_but_independent_copies() {
    let (_dir, path) = fixture::dataset();
    let store = fixture::open_read_only(&path);
    let index = HierarchyIndex::new(&store).unwrap();
    let partitioner = Partitioner::new(&store, &index);
    let mut part = partitioner.build(Granularity::District, "p1").unwrap();

    let original = store.table("obwody").unwrap().get("b1").unwrap();
    let copy = part.store.table("obwody").unwrap().get("b1").unwrap();
    assert_eq!(copy, original);
    assert!(matches!(
        part.store.table_mut("obwody"),
        Err(StoreError::ReadOnlyViolation(_))
    ));
    assert_eq!(
        part.store
            .table("wyniki_1")
            .unwrap()
            .select(&Query::all(), "k1")
            .len(),
        2
    );
    assert!(part.store.directory().is_none());
}

#[test]
fn runs_limited_to_a_parent_see_only_its_units() {
    let (_dir, path) = fixture::dataset();
    let store = fixture::open_read_only(&path);
    let index = HierarchyIndex::new(&store).unwrap();
    let partitioner = Partitioner::new(&store, &index);

    assert_eq!(
        partitioner
            .units_within(Granularity::Commune, Granularity::Voivodship, "w1")
            .unwrap(),
        vec!["g1", "g2", "g3"]
    );
    assert_eq!(
        partitioner
            .units_within(Granularity::Constituency, Granularity::Voivodship, "w2")
            .unwrap(),
        vec!["o2"]
    );
    assert_eq!(
        partitioner
            .units_within(Granularity::Voivodship, Granularity::Commune, "g3")
            .unwrap(),
        vec!["w1"]
    );

    let within: Vec<Partition> = partitioner
        .partition_within(Granularity::District, Granularity::Voivodship, "w1")
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap();
    let units: Vec<&str> = within.iter().map(|p| p.unit.id.as_str()).collect();
    assert_eq!(units, vec!["p1", "p2"]);
    let full = partitions(&store, &index, Granularity::District);
    for part in &within {
        let same = full.iter().find(|p| p.unit.id == part.unit.id).unwrap();
        assert_eq!(ids(&part.store, "obwody"), ids(&same.store, "obwody"));
    }

    let counts = partitioner
        .map_units_within(Granularity::Commune, Granularity::Constituency, "o2", |_, sub| {
            ids(sub, "obwody").len()
        })
        .unwrap();
    assert_eq!(counts, vec![("g4".to_string(), 2)]);

    assert!(matches!(
        partitioner.partition_within(Granularity::Commune, Granularity::Voivodship, "w404"),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn map_units_runs_every_unit_in_order() {
    let (_dir, path) = fixture::dataset();
    let store = fixture::open_read_only(&path);
    let index = HierarchyIndex::new(&store).unwrap();
    let partitioner = Partitioner::new(&store, &index);

    let counts = partitioner
        .map_units(Granularity::Commune, |unit, sub| {
            (unit.id.clone(), ids(sub, "obwody").len())
        })
        .unwrap();
    let summary: Vec<(String, usize)> = counts.into_iter().map(|(_, v)| v).collect();
    assert_eq!(
        summary,
        vec![
            ("g1".to_string(), 2),
            ("g2".to_string(), 0),
            ("g3".to_string(), 1),
            ("g4".to_string(), 2),
        ]
    );
    assert_eq!(
        partitioner.enumerate(Granularity::District).unwrap(),
        vec!["p1", "p2", "p3"]
    );
}
