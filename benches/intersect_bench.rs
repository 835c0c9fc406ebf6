use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lumen::arena::MemoryArena;
use lumen::intersect::{intersect_scene_flat, TraceStats};
use lumen::math::Point3;
use lumen::partition::{PartitionParams, SpatialPartition};
use lumen::rng::RandomSequence;
use lumen::scene::{Object, Scene, Shape};

fn sphere_field(count: usize) -> Scene {
    let mut scene = Scene::default();
    let mut rng = RandomSequence::new(123456789);
    for _ in 0..count {
        scene.objects.push(Object::new(Shape::Sphere {
            center: Point3::new(
                rng.bilateral() * 30.0,
                rng.bilateral() * 30.0,
                rng.bilateral() * 30.0,
            ),
            radius: 0.2 + rng.unilateral() * 0.6,
        }));
    }
    scene
}

fn bench_intersection(c: &mut Criterion) {
    let scene = sphere_field(500);
    let mut main = MemoryArena::new(256 * 1024 * 1024, 16);
    let mut scratch = MemoryArena::new(256 * 1024 * 1024, 16);
    let partition =
        SpatialPartition::build(&scene, &PartitionParams::default(), &mut main, &mut scratch);

    let mut ray_rng = RandomSequence::new(42);
    let rays: Vec<_> = (0..256)
        .map(|_| {
            (
                Point3::new(
                    ray_rng.bilateral() * 40.0,
                    ray_rng.bilateral() * 40.0,
                    ray_rng.bilateral() * 40.0,
                ),
                ray_rng.unit_sphere(),
            )
        })
        .collect();

    let mut group = c.benchmark_group("closest_hit");

    group.bench_function("flat_500_spheres", |b| {
        b.iter(|| {
            let mut stats = TraceStats::default();
            for &(origin, dir) in &rays {
                black_box(intersect_scene_flat(
                    &scene,
                    black_box(origin),
                    black_box(dir),
                    &mut stats,
                ));
            }
        })
    });

    group.bench_function("partition_500_spheres", |b| {
        b.iter(|| {
            let mut stats = TraceStats::default();
            for &(origin, dir) in &rays {
                black_box(partition.intersect(
                    &scene,
                    black_box(origin),
                    black_box(dir),
                    &mut stats,
                ));
            }
        })
    });

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let scene = sphere_field(500);
    c.bench_function("partition_build_500_spheres", |b| {
        b.iter(|| {
            let mut main = MemoryArena::new(256 * 1024 * 1024, 16);
            let mut scratch = MemoryArena::new(256 * 1024 * 1024, 16);
            black_box(SpatialPartition::build(
                &scene,
                &PartitionParams::default(),
                &mut main,
                &mut scratch,
            ))
        })
    });
}

criterion_group!(benches, bench_intersection, bench_build);
criterion_main!(benches);
