//! End-to-end tests driving the table through its wire-level operation
//! surface: encoded rows in, encoded predicates in, decoded rows out.

use veldb::encoding::ByteWriter;
use veldb::{encode_row, ColumnDef, DataType, OwnedValue, PredicateExpr, Table};

fn two_column_table() -> Table {
    Table::new(vec![
        ColumnDef::range("col1", DataType::Int4),
        ColumnDef::point("col2", DataType::Text),
    ])
    .unwrap()
}

fn row_bytes(table: &Table, values: &[OwnedValue]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    encode_row(table.schema(), values, &mut w).unwrap();
    w.into_vec()
}

fn int_text(table: &Table, id: i32, name: &str) -> Vec<u8> {
    row_bytes(
        table,
        &[OwnedValue::Int4(id), OwnedValue::Text(name.into())],
    )
}

fn sorted_rows(rows: veldb::Rows<'_>) -> Vec<Vec<OwnedValue>> {
    let mut out: Vec<Vec<OwnedValue>> = rows.map(|r| r.unwrap()).collect();
    out.sort();
    out
}

#[test]
fn insert_aggregate_delete_scenario() {
    let table = two_column_table();
    let col1 = table.schema().column_offset(0);
    let col2 = table.schema().column_offset(1);

    assert!(table.insert(&int_text(&table, 1, "a")).unwrap());
    assert!(table.insert(&int_text(&table, 2, "b")).unwrap());
    assert!(!table.insert(&int_text(&table, 1, "a")).unwrap());
    assert_eq!(table.count(), 2);

    let eq1 = PredicateExpr::equal(col1, OwnedValue::Int4(1));
    let got = sorted_rows(table.aggregate(&eq1.encode_to_vec()).unwrap());
    assert_eq!(
        got,
        vec![vec![OwnedValue::Int4(1), OwnedValue::Text("a".into())]]
    );

    let both = PredicateExpr::equal(col1, OwnedValue::Int4(1))
        .and(PredicateExpr::equal(col2, OwnedValue::Text("a".into())));
    let got = sorted_rows(table.aggregate(&both.encode_to_vec()).unwrap());
    assert_eq!(
        got,
        vec![vec![OwnedValue::Int4(1), OwnedValue::Text("a".into())]]
    );

    let deleted = table
        .delete_where(&PredicateExpr::equal(col1, OwnedValue::Int4(2)).encode_to_vec())
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(table.count(), 1);
}

#[test]
fn and_or_match_set_intersection_and_union() {
    let table = two_column_table();
    let col1 = table.schema().column_offset(0);
    let col2 = table.schema().column_offset(1);

    for (id, name) in [(1, "x"), (2, "x"), (3, "y"), (4, "y")] {
        table.insert(&int_text(&table, id, name)).unwrap();
    }

    let p1 = PredicateExpr::between(col1, OwnedValue::Int4(2), OwnedValue::Int4(4));
    let p2 = PredicateExpr::equal(col2, OwnedValue::Text("y".into()));

    let only_p1 = sorted_rows(table.aggregate(&p1.encode_to_vec()).unwrap());
    let only_p2 = sorted_rows(table.aggregate(&p2.encode_to_vec()).unwrap());
    let anded = sorted_rows(
        table
            .aggregate(&p1.clone().and(p2.clone()).encode_to_vec())
            .unwrap(),
    );
    let ored = sorted_rows(table.aggregate(&p1.or(p2).encode_to_vec()).unwrap());

    let intersection: Vec<_> = only_p1
        .iter()
        .filter(|row| only_p2.contains(row))
        .cloned()
        .collect();
    assert_eq!(anded, intersection);

    let mut union = only_p1.clone();
    for row in only_p2 {
        if !union.contains(&row) {
            union.push(row);
        }
    }
    union.sort();
    assert_eq!(ored, union);
}

#[test]
fn comparison_operators_over_the_range_index() {
    let table = two_column_table();
    let col1 = table.schema().column_offset(0);
    for id in [5, 3, 8, 1, 4, 7, 2, 6] {
        table.insert(&int_text(&table, id, "r")).unwrap();
    }

    let count = |expr: PredicateExpr| table.count_where(&expr.encode_to_vec()).unwrap();
    assert_eq!(
        count(PredicateExpr::between(col1, OwnedValue::Int4(3), OwnedValue::Int4(6))),
        4
    );
    assert_eq!(count(PredicateExpr::greater_than(col1, OwnedValue::Int4(6))), 2);
    assert_eq!(
        count(PredicateExpr::greater_or_equals(col1, OwnedValue::Int4(6))),
        3
    );
    assert_eq!(count(PredicateExpr::lesser_than(col1, OwnedValue::Int4(3))), 2);
    assert_eq!(
        count(PredicateExpr::lesser_or_equals(col1, OwnedValue::Int4(3))),
        3
    );
    assert_eq!(count(PredicateExpr::equal(col1, OwnedValue::Int4(9))), 0);
}

#[test]
fn index_membership_tracks_row_store_membership() {
    let table = two_column_table();
    let col1 = table.schema().column_offset(0);

    for id in 0..20 {
        table.insert(&int_text(&table, id, "n")).unwrap();
    }
    assert_eq!(table.index_row_count(0), Some(20));
    assert_eq!(table.index_row_count(1), Some(20));

    table
        .delete_where(
            &PredicateExpr::lesser_than(col1, OwnedValue::Int4(10)).encode_to_vec(),
        )
        .unwrap();
    assert_eq!(table.count(), 10);
    assert_eq!(table.index_row_count(0), Some(10));
    assert_eq!(table.index_row_count(1), Some(10));

    assert_eq!(table.clear().unwrap(), 10);
    assert_eq!(table.count(), 0);
    assert_eq!(table.index_row_count(0), Some(0));
    assert_eq!(table.index_row_count(1), Some(0));
}

#[test]
fn bulk_insert_dedups_within_the_batch() {
    let table = two_column_table();

    let mut payload = ByteWriter::new();
    payload.write_u32(4);
    for (id, name) in [(1, "a"), (2, "b"), (1, "a"), (3, "c")] {
        encode_row(
            table.schema(),
            &[OwnedValue::Int4(id), OwnedValue::Text(name.into())],
            &mut payload,
        )
        .unwrap();
    }

    let inserted = table.bulk_insert(&payload.into_vec()).unwrap();
    assert_eq!(inserted, 3);
    assert_eq!(table.count(), 3);
}

#[test]
fn bulk_insert_is_atomic_on_malformed_input() {
    let table = two_column_table();

    let mut payload = ByteWriter::new();
    payload.write_u32(2);
    encode_row(
        table.schema(),
        &[OwnedValue::Int4(1), OwnedValue::Text("a".into())],
        &mut payload,
    )
    .unwrap();
    // second row is missing entirely
    assert!(table.bulk_insert(&payload.into_vec()).is_err());
    assert_eq!(table.count(), 0);
    assert_eq!(table.index_row_count(0), Some(0));
}

#[test]
fn serialize_all_round_trips_through_bulk_insert() {
    let table = two_column_table();
    for (id, name) in [(1, "alpha"), (2, "beta"), (3, "gamma")] {
        table.insert(&int_text(&table, id, name)).unwrap();
    }

    let stream = table.serialize_all().unwrap();
    let before: Vec<_> = {
        let all = PredicateExpr::between(
            table.schema().column_offset(0),
            OwnedValue::Int4(i32::MIN),
            OwnedValue::Int4(i32::MAX),
        );
        sorted_rows(table.aggregate(&all.encode_to_vec()).unwrap())
    };

    assert_eq!(table.clear().unwrap(), 3);
    assert_eq!(table.bulk_insert(&stream).unwrap(), 3);

    let after: Vec<_> = {
        let all = PredicateExpr::between(
            table.schema().column_offset(0),
            OwnedValue::Int4(i32::MIN),
            OwnedValue::Int4(i32::MAX),
        );
        sorted_rows(table.aggregate(&all.encode_to_vec()).unwrap())
    };
    assert_eq!(before, after);
}

#[test]
fn fuzzy_search_end_to_end() {
    let table = Table::new(vec![
        ColumnDef::range("id", DataType::Int8),
        ColumnDef::fuzzy("title"),
    ])
    .unwrap();
    let title = table.schema().column_offset(1);

    for (id, name) in [
        (1i64, "warehouse inventory"),
        (2, "house of cards"),
        (3, "mouse trap"),
        (4, "unrelated"),
    ] {
        let bytes = row_bytes(
            &table,
            &[OwnedValue::Int8(id), OwnedValue::Text(name.into())],
        );
        table.insert(&bytes).unwrap();
    }

    let hits = table
        .count_where(&PredicateExpr::fuzzy(title, "house").encode_to_vec())
        .unwrap();
    assert_eq!(hits, 3); // warehouse, house, mouse all clear the default threshold

    let exact = table
        .count_where(
            &PredicateExpr::equal(title, OwnedValue::Text("mouse trap".into())).encode_to_vec(),
        )
        .unwrap();
    assert_eq!(exact, 1);
}

#[test]
fn unhashed_columns_do_not_split_duplicates() {
    let table = Table::new(vec![
        ColumnDef::range("id", DataType::Int4),
        ColumnDef::new("note", DataType::Text),
    ])
    .unwrap();

    let first = row_bytes(
        &table,
        &[OwnedValue::Int4(1), OwnedValue::Text("first".into())],
    );
    let second = row_bytes(
        &table,
        &[OwnedValue::Int4(1), OwnedValue::Text("second".into())],
    );
    assert!(table.insert(&first).unwrap());
    // same hashed columns, different unhashed payload: still a duplicate
    assert!(!table.insert(&second).unwrap());
    assert_eq!(table.count(), 1);
}

#[test]
fn all_fixed_width_types_round_trip() {
    let table = Table::new(vec![
        ColumnDef::point("b", DataType::Bool),
        ColumnDef::point("i2", DataType::Int2),
        ColumnDef::range("i4", DataType::Int4),
        ColumnDef::range("i8", DataType::Int8),
        ColumnDef::point("f4", DataType::Float4),
        ColumnDef::range("f8", DataType::Float8),
        ColumnDef::point("blob", DataType::Blob),
    ])
    .unwrap();

    let values = vec![
        OwnedValue::Bool(true),
        OwnedValue::Int2(-300),
        OwnedValue::Int4(70_000),
        OwnedValue::Int8(-1 << 50),
        OwnedValue::Float4(1.25),
        OwnedValue::Float8(-9.75),
        OwnedValue::Blob(vec![0xDE, 0xAD]),
    ];
    table.insert(&row_bytes(&table, &values)).unwrap();

    let offset = table.schema().column_offset(3);
    let got = sorted_rows(
        table
            .aggregate(
                &PredicateExpr::equal(offset, OwnedValue::Int8(-1 << 50)).encode_to_vec(),
            )
            .unwrap(),
    );
    assert_eq!(got, vec![values]);
}

#[test]
fn concurrent_readers_and_writers_stay_consistent() {
    use std::sync::Arc;

    let table = Arc::new(two_column_table());
    let col1 = table.schema().column_offset(0);

    std::thread::scope(|scope| {
        let writer = {
            let table = Arc::clone(&table);
            scope.spawn(move || {
                for id in 0..500 {
                    table.insert(&int_text(&table, id, "w")).unwrap();
                }
                for id in 0..250 {
                    table
                        .delete_where(
                            &PredicateExpr::equal(col1, OwnedValue::Int4(id)).encode_to_vec(),
                        )
                        .unwrap();
                }
            })
        };
        for _ in 0..4 {
            let table = Arc::clone(&table);
            scope.spawn(move || {
                for _ in 0..200 {
                    // any observed count is fine; the read must not tear
                    let n = table
                        .count_where(
                            &PredicateExpr::greater_or_equals(col1, OwnedValue::Int4(0))
                                .encode_to_vec(),
                        )
                        .unwrap();
                    assert!(n <= 500);
                }
            });
        }
        writer.join().unwrap();
    });

    assert_eq!(table.count(), 250);
    assert_eq!(table.index_row_count(0), Some(250));
}
