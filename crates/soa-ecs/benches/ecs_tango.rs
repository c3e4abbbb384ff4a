//! Store benchmarks using tango-bench for paired comparison testing.

use std::hint::black_box;

use soa_ecs::{EntitySchema, FieldType, Id, Schema, Value, World};
use tango_bench::{IntoBenchmarks, benchmark_fn, tango_benchmarks, tango_main};

struct Scene {
    world: World,
    ids: Vec<Id>,
}

fn scene(count: usize) -> Scene {
    let mut world = World::new();
    let physical = world
        .register_component(
            Schema::builder("Physical")
                .field("pos", FieldType::vec2())
                .build()
                .unwrap(),
        )
        .unwrap();
    let moving = world
        .register_entity(
            EntitySchema::builder("MovingObject")
                .component("physical", physical)
                .build()
                .unwrap(),
        )
        .unwrap();

    let ids = (0..count)
        .map(|i| {
            let p = world
                .create_component(physical, &[Value::from(i as f32)])
                .unwrap();
            world.create_entity(moving, &[p]).unwrap()
        })
        .collect();

    Scene { world, ids }
}

fn entity_benchmarks() -> impl IntoBenchmarks {
    [
        benchmark_fn("create_entity/1000", |b| {
            b.iter(|| black_box(scene(1000).ids.len()))
        }),
        benchmark_fn("destroy_entity/1000", |b| {
            b.iter(|| {
                let Scene { mut world, ids } = scene(1000);
                for id in ids {
                    world.destroy_entity(id);
                }
            })
        }),
    ]
}

fn masked_benchmarks() -> impl IntoBenchmarks {
    [
        benchmark_fn("masked_add_assign/1000", |b| {
            let Scene { mut world, .. } = scene(1000);
            let moving = world.entity_kind("MovingObject").unwrap();

            b.iter(|| {
                world
                    .masked_mut(moving, "physical", "pos")
                    .unwrap()
                    .add_assign(&[1.0f32])
                    .unwrap();
            })
        }),
        benchmark_fn("masked_gather/1000", |b| {
            let Scene { world, .. } = scene(1000);
            let moving = world.entity_kind("MovingObject").unwrap();

            b.iter(|| {
                black_box(
                    world
                        .masked(moving, "physical", "pos")
                        .unwrap()
                        .gather::<f32>()
                        .unwrap(),
                )
            })
        }),
    ]
}

tango_benchmarks!(entity_benchmarks(), masked_benchmarks());
tango_main!();
