//! Performance benchmarks for tandem-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tandem_engine::{
    diff, Checksum, Converter, Dictionary, EntitySchema, FieldDef, FieldType, FieldValue,
    IdentityMap, List, Property, Scene, SchemaRegistry, StringTable, World,
};

fn create_test_scene() -> Scene {
    let registry = SchemaRegistry::new(1).with(EntitySchema::new(
        "light",
        vec![
            FieldDef::synced("intensity", FieldType::Float, FieldValue::Float(1.0)),
            FieldDef::synced("label", FieldType::String, FieldValue::Str(String::new())),
            FieldDef::synced("tags", FieldType::List, FieldValue::List(Vec::new())),
        ],
    ));
    Scene::new(registry, "bench")
}

fn create_tree(width: usize) -> Property {
    let mut root = Dictionary::new();
    for i in 0..width {
        let mut child = Dictionary::new();
        child.insert("index", Property::value(i as i32));
        child.insert("weight", Property::value(i as f64 * 0.5));
        let list: List = (0..8).map(|j| Property::value((i * j) as i32)).collect();
        child.insert("samples", list);
        root.insert(format!("node_{}", i), child);
    }
    Property::from(root)
}

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");
    let strings = StringTable::new();
    let checksum = Checksum::new();

    for width in [10, 100, 1000] {
        let tree = create_tree(width);
        group.bench_with_input(BenchmarkId::new("property_tree", width), &tree, |b, tree| {
            b.iter(|| checksum.property(black_box(tree), &strings))
        });
    }

    let filtered = Checksum::excluding(["weight"]);
    let tree = create_tree(100);
    group.bench_function("property_tree_filtered", |b| {
        b.iter(|| filtered.property(black_box(&tree), &strings))
    });

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for len in [10, 100, 1000] {
        let dest: List = (0..len).map(|i| Property::value(i as i32)).collect();
        // One insertion near the front, everything else unchanged.
        let src: List = std::iter::once(Property::value(-1i32))
            .chain((0..len).map(|i| Property::value(i as i32)))
            .collect();

        group.bench_with_input(BenchmarkId::new("list_insert", len), &len, |b, _| {
            b.iter(|| {
                let mut target = dest.clone();
                diff::merge_list(&mut target, black_box(&src));
                target
            })
        });
    }

    let dest = create_tree(100);
    let src = create_tree(101);
    group.bench_function("copy_tree", |b| {
        b.iter(|| {
            let mut target = dest.clone();
            diff::copy(&mut target, black_box(&src))
        })
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    let mut scene = create_test_scene();
    let entity = scene.spawn("light").unwrap();
    scene.set(entity, "intensity", 2.5).unwrap();
    scene.set(entity, "label", "key light").unwrap();
    scene
        .set(
            entity,
            "tags",
            FieldValue::List((0..32).map(|i| FieldValue::Int(i)).collect()),
        )
        .unwrap();
    let identity = IdentityMap::new();
    let converter = Converter::new(&identity);

    group.bench_function("create_properties", |b| {
        let mut strings = StringTable::new();
        b.iter(|| {
            let mut dict = Dictionary::new();
            diff::create_properties(
                scene.entity(entity).unwrap(),
                &mut dict,
                &converter,
                &mut strings,
            );
            dict
        })
    });

    group.bench_function("send_unchanged", |b| {
        let mut strings = StringTable::new();
        let mut dict = Dictionary::new();
        diff::create_properties(scene.entity(entity).unwrap(), &mut dict, &converter, &mut strings);
        b.iter(|| {
            diff::send_property_changes(
                scene.entity(entity).unwrap(),
                black_box(&mut dict),
                &converter,
                &mut strings,
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_checksum, bench_merge, bench_snapshot);
criterion_main!(benches);
