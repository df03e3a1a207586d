//! Property tests: the tree against a `BTreeMap` model.

use std::collections::BTreeMap;

use pagekv::{Config, Database, Error, Key, TableId, TreeOrder};
use proptest::prelude::*;
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum Op {
    Insert(Key),
    Delete(Key),
    Update(Key),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (-200i64..200).prop_map(Op::Insert),
        2 => (-200i64..200).prop_map(Op::Delete),
        1 => (-200i64..200).prop_map(Op::Update),
    ]
}

fn arb_order() -> impl Strategy<Value = TreeOrder> {
    (3usize..=6, 3usize..=6).prop_map(|(leaf, internal)| TreeOrder::new(leaf, internal))
}

fn open(order: TreeOrder, pool_size: usize) -> (Database, TableId, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = Config::builder().pool_size(pool_size).order(order).build();
    let mut db = Database::init(config).unwrap();
    let table = db.open_table(dir.path().join("prop.db")).unwrap();
    (db, table, dir)
}

fn payload(key: Key, generation: u32) -> Vec<u8> {
    format!("{key}@{generation}").into_bytes()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Unique keys inserted in any order are all found with their values.
    #[test]
    fn prop_inserted_keys_found(
        keys in proptest::collection::hash_set(any::<i64>(), 1..300),
        order in arb_order(),
    ) {
        let (mut db, table, _dir) = open(order, 32);
        for &key in &keys {
            db.insert(table, key, &payload(key, 0)).unwrap();
        }
        for &key in &keys {
            let found = db.find(table, key).unwrap();
            prop_assert_eq!(found.map(|v| v.as_bytes().to_vec()), Some(payload(key, 0)));
        }
        prop_assert_eq!(db.verify(table).unwrap().records, keys.len());
    }

    /// Any mix of operations leaves the tree equal to the model and
    /// structurally sound.
    #[test]
    fn prop_matches_model(
        ops in proptest::collection::vec(arb_op(), 1..400),
        order in arb_order(),
    ) {
        let (mut db, table, _dir) = open(order, 16);
        let mut model: BTreeMap<Key, Vec<u8>> = BTreeMap::new();

        for (generation, op) in ops.iter().enumerate() {
            let generation = generation as u32;
            match *op {
                Op::Insert(key) => {
                    let result = db.insert(table, key, &payload(key, generation));
                    if model.contains_key(&key) {
                        prop_assert!(matches!(result, Err(Error::DuplicateKey(k)) if k == key));
                    } else {
                        result.unwrap();
                        model.insert(key, payload(key, generation));
                    }
                }
                Op::Delete(key) => {
                    let result = db.delete(table, key);
                    if model.remove(&key).is_some() {
                        result.unwrap();
                    } else {
                        prop_assert!(matches!(result, Err(Error::KeyNotFound(k)) if k == key));
                    }
                }
                Op::Update(key) => {
                    let result = db.update(table, key, &payload(key, generation));
                    match model.get_mut(&key) {
                        Some(value) => {
                            result.unwrap();
                            *value = payload(key, generation);
                        }
                        None => prop_assert!(matches!(result, Err(Error::KeyNotFound(_)))),
                    }
                }
            }
        }

        let summary = db.verify(table).unwrap();
        prop_assert_eq!(summary.records, model.len());

        let scanned: Vec<(Key, Vec<u8>)> = db
            .find_range(table, Key::MIN, Key::MAX)
            .unwrap()
            .into_iter()
            .map(|(k, v)| (k, v.as_bytes().to_vec()))
            .collect();
        let expected: Vec<(Key, Vec<u8>)> = model.into_iter().collect();
        prop_assert_eq!(scanned, expected);
    }

    /// Range scans return exactly the model's range.
    #[test]
    fn prop_range_matches_model(
        keys in proptest::collection::btree_set(-500i64..500, 0..200),
        start in -600i64..600,
        len in 0i64..300,
    ) {
        let (mut db, table, _dir) = open(TreeOrder::new(4, 4), 16);
        for &key in &keys {
            db.insert(table, key, b"v").unwrap();
        }

        let end = start + len;
        let got: Vec<Key> = db
            .find_range(table, start, end)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        let expected: Vec<Key> = keys.range(start..=end).copied().collect();
        prop_assert_eq!(got, expected);
    }
}
