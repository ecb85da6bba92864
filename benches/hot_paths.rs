use choromap::config::DuplicateKeyPolicy;
use choromap::join::{merge, JoinColumns};
use choromap::map::LabelEngine;
use choromap::partition::{partition, ContextSources};
use choromap::{GeometryCollection, GeometryFeature, RenderConfig, RenderReport, ValueTable};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geo::{LineString, MultiPolygon, Polygon};

const GRID: usize = 30;

/// GRID x GRID cells, each an irregular 24-gon
fn grid() -> GeometryCollection {
    let mut features = Vec::with_capacity(GRID * GRID);
    for row in 0..GRID {
        for col in 0..GRID {
            let (cx, cy) = (col as f64 + 0.5, row as f64 + 0.5);
            let ring: Vec<(f64, f64)> = (0..24)
                .map(|i| {
                    let a = i as f64 / 24.0 * std::f64::consts::TAU;
                    let r = 0.35 + 0.1 * ((i * 7 + row + col) % 5) as f64 / 5.0;
                    (cx + r * a.cos(), cy + r * a.sin())
                })
                .collect();
            let code = format!("R{row:02}{col:02}");
            let polygon = Polygon::new(LineString::from(ring), vec![]);
            features.push(
                GeometryFeature::new(&code, MultiPolygon::new(vec![polygon]))
                    .with_attribute("name", code.as_str())
                    .with_attribute("postal", code.as_str()),
            );
        }
    }
    features.into_iter().collect()
}

fn values() -> ValueTable {
    let keys: Vec<String> = (0..GRID * GRID)
        .filter(|i| i % 3 != 0)
        .map(|i| format!("r{:02}{:02} ", i / GRID, i % GRID))
        .collect();
    ValueTable::from_pairs(
        "location",
        "value",
        keys.iter().enumerate().map(|(i, k)| (k.as_str(), Some(i as f64))),
    )
}

fn config() -> RenderConfig {
    RenderConfig::from_json_str(
        r#"{
            "inset_level1_regions": [{"codes": ["R0000", "R0001", "R0100"]}],
            "label_settings": {
                "add_labels": true,
                "offsets": {"R0505": [0.5, 0.5]},
                "clipped_regions": {"R1010": ["top", 0.4]}
            }
        }"#,
    )
    .expect("bench config")
}

fn bench_join(c: &mut Criterion) {
    let geo = grid();
    let table = values();
    let columns = JoinColumns::new("name", "location", "value");
    c.bench_function("join_900_regions", |b| {
        b.iter(|| {
            let mut report = RenderReport::default();
            merge(black_box(&geo), black_box(&table), &columns, DuplicateKeyPolicy::Last, &mut report)
        })
    });
}

fn bench_partition(c: &mut Criterion) {
    let geo = grid();
    let table = values();
    let config = config();
    let columns = JoinColumns::new("name", "location", "value");
    let merged = merge(&geo, &table, &columns, DuplicateKeyPolicy::Last, &mut RenderReport::default())
        .expect("bench join");
    c.bench_function("partition_900_regions", |b| {
        b.iter(|| {
            let mut report = RenderReport::default();
            partition(
                black_box(merged.clone()),
                &geo.crs,
                &config,
                &ContextSources::default(),
                &mut report,
            )
        })
    });
}

fn bench_labels(c: &mut Criterion) {
    let geo = grid();
    let table = values();
    let config = config();
    let columns = JoinColumns::new("name", "location", "value");
    let merged = merge(&geo, &table, &columns, DuplicateKeyPolicy::Last, &mut RenderReport::default())
        .expect("bench join");
    let engine = LabelEngine::new(&config.label_settings, "postal", "NAME");
    c.bench_function("label_placement_900_regions", |b| {
        b.iter(|| {
            let mut report = RenderReport::default();
            merged
                .iter()
                .filter_map(|f| engine.place(black_box(f), &mut report))
                .count()
        })
    });
}

criterion_group!(benches, bench_join, bench_partition, bench_labels);
criterion_main!(benches);
