//! Table-level benchmarks: wire-encoded insert and predicate evaluation.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use veldb::encoding::ByteWriter;
use veldb::{encode_row, ColumnDef, DataType, OwnedValue, PredicateExpr, Table};

fn make_table() -> Table {
    Table::new(vec![
        ColumnDef::range("id", DataType::Int8),
        ColumnDef::point("bucket", DataType::Int4),
        ColumnDef::new("payload", DataType::Blob),
    ])
    .unwrap()
}

fn encoded_rows(table: &Table, count: i64) -> Vec<Vec<u8>> {
    (0..count)
        .map(|id| {
            let mut w = ByteWriter::new();
            encode_row(
                table.schema(),
                &[
                    OwnedValue::Int8(id),
                    OwnedValue::Int4((id % 64) as i32),
                    OwnedValue::Blob(vec![0u8; 32]),
                ],
                &mut w,
            )
            .unwrap();
            w.into_vec()
        })
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_insert");
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("one_by_one", |b| {
        b.iter(|| {
            let table = make_table();
            for row in encoded_rows(&table, 10_000) {
                table.insert(&row).unwrap();
            }
            black_box(table.count())
        });
    });
    group.bench_function("bulk", |b| {
        let table = make_table();
        let rows = encoded_rows(&table, 10_000);
        let mut payload = ByteWriter::new();
        payload.write_u32(rows.len() as u32);
        for row in &rows {
            payload.write_bytes(row);
        }
        let payload = payload.into_vec();
        b.iter(|| {
            let table = make_table();
            black_box(table.bulk_insert(&payload).unwrap())
        });
    });
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_aggregate");
    let table = make_table();
    for row in encoded_rows(&table, 50_000) {
        table.insert(&row).unwrap();
    }
    let id = table.schema().column_offset(0);
    let bucket = table.schema().column_offset(1);

    group.bench_function("point_equal", |b| {
        let pred = PredicateExpr::equal(bucket, OwnedValue::Int4(7)).encode_to_vec();
        b.iter(|| black_box(table.count_where(&pred).unwrap()));
    });
    group.bench_function("range_and_point", |b| {
        let pred = PredicateExpr::between(id, OwnedValue::Int8(1_000), OwnedValue::Int8(9_000))
            .and(PredicateExpr::equal(bucket, OwnedValue::Int4(7)))
            .encode_to_vec();
        b.iter(|| black_box(table.count_where(&pred).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_aggregate);
criterion_main!(benches);
