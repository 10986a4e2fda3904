//! Performance benchmarks for PathTree core operations
//!
//! Run with: `cargo bench -p pathtree-core`
//!
//! These benchmarks measure critical path performance:
//! - Label arithmetic (append and midpoint bisection)
//! - Appending children through the service
//! - Moving a populated subtree (memory and libsql stores)

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pathtree_core::models::Label;
use pathtree_core::operations::{LabelAllocator, GAP};
use pathtree_core::services::TreeService;
use pathtree_core::TreeConfig;
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// Root with `children` children, each holding `grandchildren` leaves
async fn populate(service: &TreeService, children: usize, grandchildren: usize) -> (String, String) {
    let source = service.create_root("source").await.unwrap();
    let target = service.create_root("target").await.unwrap();
    for i in 0..children {
        let child = service
            .create_child(&source.id, &format!("child-{}", i))
            .await
            .unwrap();
        for j in 0..grandchildren {
            service
                .create_child(&child.id, &format!("leaf-{}-{}", i, j))
                .await
                .unwrap();
        }
    }
    (source.id, target.id)
}

fn bench_label_arithmetic(c: &mut Criterion) {
    let prev = Label::new(GAP).unwrap();
    let next = Label::new(2 * GAP).unwrap();

    c.bench_function("next_label", |b| {
        b.iter(|| LabelAllocator::next_label(black_box(Some(prev))).unwrap())
    });
    c.bench_function("midpoint_label", |b| {
        b.iter(|| LabelAllocator::midpoint_label(black_box(Some(prev)), black_box(next)).unwrap())
    });
}

fn bench_append_children(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("create_child_memory_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = TreeService::in_memory();
                let root = service.create_root("root").await.unwrap();
                for i in 0..100 {
                    service
                        .create_child(&root.id, &format!("child-{}", i))
                        .await
                        .unwrap();
                }
            })
        })
    });
}

fn bench_subtree_move(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let memory = TreeService::in_memory();
    let (source_id, target_id) = rt.block_on(populate(&memory, 10, 10));
    c.bench_function("move_subtree_memory_110", |b| {
        b.iter(|| {
            rt.block_on(async {
                memory.reparent(&source_id, &target_id).await.unwrap();
                memory.move_to_root(&source_id).await.unwrap();
            })
        })
    });

    let temp_dir = TempDir::new().unwrap();
    let config = TreeConfig::with_database(temp_dir.path().join("bench.db"));
    let libsql = rt.block_on(TreeService::open(config)).unwrap();
    let (source_id, target_id) = rt.block_on(populate(&libsql, 10, 10));
    c.bench_function("move_subtree_libsql_110", |b| {
        b.iter(|| {
            rt.block_on(async {
                libsql.reparent(&source_id, &target_id).await.unwrap();
                libsql.move_to_root(&source_id).await.unwrap();
            })
        })
    });
}

criterion_group!(
    benches,
    bench_label_arithmetic,
    bench_append_children,
    bench_subtree_move
);
criterion_main!(benches);
