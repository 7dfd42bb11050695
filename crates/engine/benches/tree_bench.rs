use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::{Config, Tree};
use tempfile::tempdir;

const N_KEYS: usize = 10_000;
const VALUE_SIZE: usize = 100;

fn key(i: usize) -> Vec<u8> {
    format!("key{:08}", i).into_bytes()
}

fn populated_tree() -> (tempfile::TempDir, Tree) {
    let dir = tempdir().unwrap();
    let tree = Tree::new(Config::new(dir.path())).unwrap();
    for i in 0..N_KEYS {
        tree.put(&key(i), &vec![b'x'; VALUE_SIZE]).unwrap();
    }
    (dir, tree)
}

fn put_benchmark(c: &mut Criterion) {
    c.bench_function("tree_put_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let tree = Tree::new(Config::new(dir.path())).unwrap();
                (dir, tree)
            },
            |(_dir, tree)| {
                for i in 0..N_KEYS {
                    tree.put(&key(i), &vec![b'x'; VALUE_SIZE]).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn get_hit_benchmark(c: &mut Criterion) {
    c.bench_function("tree_get_hit_10k", |b| {
        b.iter_batched(
            populated_tree,
            |(_dir, tree)| {
                for i in 0..N_KEYS {
                    assert!(tree.get(&key(i)).unwrap().is_some());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn get_miss_benchmark(c: &mut Criterion) {
    c.bench_function("tree_get_miss_10k", |b| {
        b.iter_batched(
            populated_tree,
            |(_dir, tree)| {
                for i in N_KEYS..2 * N_KEYS {
                    assert!(tree.get(&key(i)).unwrap().is_none());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, put_benchmark, get_hit_benchmark, get_miss_benchmark);
criterion_main!(benches);
