use criterion::{criterion_group, criterion_main, Criterion};
use custody::{allocate_shared, make_exclusive, make_shared, Pool, Shared};
use std::{hint::black_box, sync::Arc};

const N: i64 = 10_000;

struct Payload {
    value: i64,
}

fn bench_exclusive(c: &mut Criterion) {
    c.bench_function("exclusive", |b| {
        b.iter(|| {
            for i in 0..N {
                let mut p = make_exclusive(Payload { value: i });
                p.value += 1;
                black_box(p.value);
            }
        })
    });
    c.bench_function("box", |b| {
        b.iter(|| {
            for i in 0..N {
                let mut p = Box::new(Payload { value: i });
                p.value += 1;
                black_box(p.value);
            }
        })
    });
}

fn bench_shared(c: &mut Criterion) {
    c.bench_function("shared", |b| {
        b.iter(|| {
            for i in 0..N {
                let p1 = make_shared(Payload { value: i });
                let p2 = p1.clone();
                let p3 = p2.clone();
                black_box(p1.value + p3.value);
            }
        })
    });
    c.bench_function("shared_from_box", |b| {
        b.iter(|| {
            for i in 0..N {
                let p1 = Shared::from_box(Box::new(Payload { value: i }));
                let p2 = p1.clone();
                black_box(p2.value);
            }
        })
    });
    c.bench_function("shared_pool", |b| {
        static POOL: Pool = Pool::new();
        b.iter(|| {
            for i in 0..N {
                let p1 = allocate_shared(&POOL, Payload { value: i }).unwrap();
                let p2 = p1.clone();
                black_box(p2.value);
            }
        })
    });
    c.bench_function("arc", |b| {
        b.iter(|| {
            for i in 0..N {
                let p1 = Arc::new(Payload { value: i });
                let p2 = Arc::clone(&p1);
                let p3 = Arc::clone(&p2);
                black_box(p1.value + p3.value);
            }
        })
    });
}

fn bench_weak(c: &mut Criterion) {
    let strong = make_shared(Payload { value: 1 });
    let weak = strong.downgrade();
    c.bench_function("weak_lock", |b| {
        b.iter(|| {
            for _ in 0..N {
                black_box(weak.lock().value);
            }
        })
    });

    let strong = Arc::new(Payload { value: 1 });
    let weak = Arc::downgrade(&strong);
    c.bench_function("arc_weak_upgrade", |b| {
        b.iter(|| {
            for _ in 0..N {
                black_box(weak.upgrade().map(|p| p.value));
            }
        })
    });
}

criterion_group!(benches, bench_exclusive, bench_shared, bench_weak);
criterion_main!(benches);
