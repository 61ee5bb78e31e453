//! Codec encoding/decoding benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rqap_protocol::{
    decode_reply_body, encode_message, encode_sexp_item, Command, DataFrame, Sexp,
};

fn double_array(len: usize) -> Sexp {
    Sexp::doubles((0..len).map(|i| i as f64))
}

fn string_array(len: usize) -> Sexp {
    Sexp::strings((0..len).map(|i| format!("value-{i}")))
}

fn bench_sexp_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("sexp_encode");

    for size in [100, 1000, 10000] {
        let doubles = double_array(size);
        group.throughput(Throughput::Bytes((size * 8) as u64));
        group.bench_with_input(BenchmarkId::new("doubles", size), &doubles, |b, value| {
            b.iter(|| black_box(encode_sexp_item(value).unwrap()));
        });

        let strings = string_array(size);
        group.bench_with_input(BenchmarkId::new("strings", size), &strings, |b, value| {
            b.iter(|| black_box(encode_sexp_item(value).unwrap()));
        });
    }

    group.finish();
}

fn bench_reply_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("reply_decode");

    for size in [100, 1000, 10000] {
        let encoded = encode_sexp_item(&double_array(size)).unwrap();
        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::new("doubles", size), &encoded, |b, encoded| {
            b.iter(|| black_box(decode_reply_body(encoded).unwrap()));
        });

        let encoded = encode_sexp_item(&string_array(size)).unwrap();
        group.bench_with_input(BenchmarkId::new("strings", size), &encoded, |b, encoded| {
            b.iter(|| black_box(decode_reply_body(encoded).unwrap()));
        });
    }

    group.finish();
}

fn bench_eval_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval_encode");

    for size in [10, 100, 1000] {
        let command = Command::Eval(format!("sum(c({}))", vec!["1"; size].join(",")));

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &command, |b, command| {
            b.iter(|| black_box(encode_message(command).unwrap()));
        });
    }

    group.finish();
}

fn bench_data_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_frame_encode");

    for rows in [100usize, 1000] {
        let frame = DataFrame::new()
            .with_column("id", Sexp::ints(0..rows as i64))
            .with_column("score", Sexp::doubles((0..rows).map(|i| i as f64 / 3.0)))
            .with_column("label", Sexp::strings((0..rows).map(|i| format!("row-{i}"))));
        let command = Command::SetVariable {
            name: "df".into(),
            value: frame.into_sexp().unwrap(),
        };

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &command, |b, command| {
            b.iter(|| black_box(encode_message(command).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sexp_encode,
    bench_reply_decode,
    bench_eval_encode,
    bench_data_frame_encode,
);

criterion_main!(benches);
