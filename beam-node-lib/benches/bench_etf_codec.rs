//! Micro benchmarks for the ETF codec and the generic bridge layered on top
//! of it. Pure CPU - no network, no IO.
//!
//! ```bash
//! cargo bench --bench bench_etf_codec
//! ```

use beam_node_lib::{
    decode, encode, etf, term::Pid, term::Term, KeyStyle, KeyedPolicy, Policy, StringPolicy,
    UnkeyedPolicy,
};
use criterion::{criterion_group, criterion_main, Criterion};

fn sample_term() -> Term {
    Term::Tuple(vec![
        Term::atom("reply"),
        Term::Map(vec![
            (Term::atom("name"), Term::Binary(b"bob".to_vec())),
            (Term::atom("age"), Term::Int(36)),
            (
                Term::atom("tags"),
                Term::List(vec![Term::atom("a"), Term::atom("b"), Term::atom("c")]),
            ),
        ]),
        Term::Pid(Pid {
            node: "client@127.0.0.1".into(),
            num: 42,
            serial: 0,
            creation: 1,
        }),
    ])
}

fn bench_term_round_trip(c: &mut Criterion) {
    let term = sample_term();
    c.bench_function("etf_encode_tuple_map_pid", |b| {
        b.iter(|| {
            let mut buf = etf::Buffer::new();
            etf::encode(&term, &mut buf).unwrap();
        })
    });

    let mut encoded = etf::Buffer::new();
    etf::encode(&term, &mut encoded).unwrap();
    let bytes = encoded.into_vec();
    c.bench_function("etf_decode_tuple_map_pid", |b| {
        b.iter(|| {
            let mut buf = etf::Buffer::from_bytes(bytes.clone());
            etf::decode(&mut buf).unwrap();
        })
    });
}

fn bench_bridge_record(c: &mut Criterion) {
    let policy = Policy::new(
        StringPolicy::Binary,
        UnkeyedPolicy::List,
        KeyedPolicy::Map(KeyStyle::Atom),
    );
    let values: Vec<i32> = (0..64).collect();

    c.bench_function("bridge_encode_vec_i32", |b| {
        b.iter(|| {
            encode(&values, policy).unwrap();
        })
    });

    let encoded = encode(&values, policy).unwrap();
    c.bench_function("bridge_decode_vec_i32", |b| {
        b.iter(|| {
            let mut buf = encoded.clone();
            let _: Vec<i32> = decode(&mut buf, policy).unwrap();
        })
    });
}

criterion_group!(benches, bench_term_round_trip, bench_bridge_record);
criterion_main!(benches);
