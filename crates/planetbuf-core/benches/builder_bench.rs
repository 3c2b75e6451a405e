use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use planetbuf_core::{Arena, Location, NodeBuilder, WayBuilder};

fn build_nodes(count: u64) -> Arena {
    let mut arena = Arena::with_capacity(count as usize * 96);
    for id in 0..count {
        let mut node = NodeBuilder::new(&mut arena);
        node.set_id(id as i64)
            .set_version(1)
            .set_changeset(id / 50)
            .set_location(Location::from_degrees(
                (id % 360) as f64 - 180.0,
                (id % 180) as f64 - 90.0,
            ));
        node.tags()
            .add_tag("natural", "tree")
            .unwrap();
        node.finish();
    }
    arena
}

fn bench_build_nodes(c: &mut Criterion) {
    const COUNT: u64 = 10_000;
    let mut group = c.benchmark_group("build_nodes");
    group.throughput(Throughput::Elements(COUNT));
    group.bench_function("tagged", |b| {
        b.iter(|| black_box(build_nodes(COUNT)));
    });
    group.finish();
}

fn bench_build_ways(c: &mut Criterion) {
    const COUNT: u64 = 1_000;
    let mut group = c.benchmark_group("build_ways");
    group.throughput(Throughput::Elements(COUNT));
    group.bench_function("20_nodes_each", |b| {
        b.iter(|| {
            let mut arena = Arena::with_capacity(COUNT as usize * 512);
            for id in 0..COUNT {
                let mut way = WayBuilder::new(&mut arena);
                way.set_id(id as i64).set_version(2);
                {
                    let mut nodes = way.nodes();
                    for n in 0..20 {
                        nodes.add(
                            (id * 20 + n) as i64,
                            Location::new(n as i32 * 1000, id as i32),
                        );
                    }
                }
                way.add_tags(&[("highway", "service")]).unwrap();
                way.finish();
            }
            black_box(arena)
        });
    });
    group.finish();
}

fn bench_scan_tags(c: &mut Criterion) {
    let arena = build_nodes(10_000);
    let mut group = c.benchmark_group("scan");
    group.throughput(Throughput::Bytes(arena.committed() as u64));
    group.bench_function("tags", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for object in arena.objects() {
                for (key, value) in object.tags() {
                    total += key.len() + value.len();
                }
            }
            black_box(total)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_build_nodes, bench_build_ways, bench_scan_tags);
criterion_main!(benches);
