//! Join cardinality and header tests.

use std::collections::HashMap;

use proptest::prelude::*;
use retail_model::{CellValue, Relation};
use retail_transform::{JoinKeys, inner_join, left_join};

fn keyed(name: &str, value_column: &str, keys: &[u8]) -> Relation {
    let mut relation = Relation::new(name, vec!["k".to_string(), value_column.to_string()]);
    for (idx, key) in keys.iter().enumerate() {
        relation
            .push_row(vec![CellValue::text(key.to_string()), CellValue::text(idx.to_string())])
            .expect("row");
    }
    relation
}

fn counts(keys: &[u8]) -> HashMap<u8, usize> {
    let mut counts = HashMap::new();
    for key in keys {
        *counts.entry(*key).or_insert(0) += 1;
    }
    counts
}

proptest! {
    #[test]
    fn inner_join_matches_key_group_products(
        left_keys in prop::collection::vec(0u8..6, 0..40),
        right_keys in prop::collection::vec(0u8..6, 0..40),
    ) {
        let left = keyed("a", "a_val", &left_keys);
        let right = keyed("b", "b_val", &right_keys);
        let joined = inner_join(&left, &right, &JoinKeys::shared("k")).expect("join");

        let right_counts = counts(&right_keys);
        let expected: usize = counts(&left_keys)
            .iter()
            .map(|(key, n)| n * right_counts.get(key).copied().unwrap_or(0))
            .sum();
        prop_assert_eq!(joined.len(), expected);
        for row in joined.rows() {
            let key: u8 = row.text("k").expect("key").parse().expect("numeric key");
            prop_assert!(right_counts.contains_key(&key));
        }
    }

    #[test]
    fn left_join_keeps_every_left_row(
        left_keys in prop::collection::vec(0u8..10, 0..40),
        right_keys in prop::collection::btree_set(0u8..10, 0..10),
    ) {
        let right_keys: Vec<u8> = right_keys.into_iter().collect();
        let left = keyed("a", "a_val", &left_keys);
        let right = keyed("b", "b_val", &right_keys);
        let joined = left_join(&left, &right, &JoinKeys::shared("k")).expect("join");

        prop_assert_eq!(joined.len(), left.len());
        for (row, key) in joined.rows().zip(&left_keys) {
            prop_assert_eq!(row.text("b_val").is_some(), right_keys.contains(key));
        }
    }
}

#[test]
fn left_join_repeats_rows_for_duplicate_right_keys() {
    let left = keyed("a", "a_val", &[1, 2]);
    let right = keyed("b", "b_val", &[1, 1]);
    let joined = left_join(&left, &right, &JoinKeys::shared("k")).expect("join");
    assert_eq!(joined.len(), 3);
    assert_eq!(joined.value(2, "b_val"), Some(&CellValue::Missing));
}

#[test]
fn pair_join_keeps_both_keys_and_suffixes_collisions() {
    let payments = Relation::from_text_rows(
        "payments",
        &["payment_id", "amount", "status"],
        &[&["5", "31.98", "Completed"]],
    )
    .expect("payments");
    let invoices = Relation::from_text_rows(
        "invoices",
        &["invoice_id", "order_id", "amount"],
        &[&["5", "5", "31.98"], &["6", "6", "10.00"]],
    )
    .expect("invoices");

    let joined = inner_join(&payments, &invoices, &JoinKeys::pair("payment_id", "invoice_id"))
        .expect("join");

    assert_eq!(joined.name(), "payments");
    insta::assert_snapshot!(joined.columns().join(","), @"payment_id,amount,status,invoice_id,order_id,amount_right");
    assert_eq!(joined.len(), 1);
    assert_eq!(joined.value(0, "invoice_id"), Some(&CellValue::text("5")));
}

#[test]
fn unknown_key_column_is_an_error() {
    let left = keyed("a", "a_val", &[1]);
    let right = keyed("b", "b_val", &[1]);
    assert!(inner_join(&left, &right, &JoinKeys::shared("order_id")).is_err());
}
