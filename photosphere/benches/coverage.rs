use criterion::{black_box, criterion_group, criterion_main, Criterion};
use photosphere::generator::{EmergenceRate, EmitterConfig};
use photosphere::{
    ClassPriority, CoverageAggregator, CoverageMethod, StarConfig, SurfaceMap,
};

fn make_surface(spot_coverage: f64) -> SurfaceMap {
    let config = StarConfig {
        emitters: vec![
            EmitterConfig {
                rate: EmergenceRate::EquilibriumCoverage(spot_coverage),
                ..EmitterConfig::solar_spots()
            },
            EmitterConfig::solar_faculae(),
        ],
        spin_up_days: 120.0,
        seed: 7,
        ..StarConfig::default()
    };
    SurfaceMap::from_config(&config).expect("benchmark configuration is valid")
}

fn bench_aggregate(c: &mut Criterion) {
    let quiet_surface = make_surface(0.02);
    let busy_surface = make_surface(0.3);
    let t = quiet_surface.current_time();

    let methods = [
        ("raster_200", CoverageMethod::Raster { resolution: 200 }),
        ("raster_400", CoverageMethod::Raster { resolution: 400 }),
        ("small_angle", CoverageMethod::SmallAngle),
    ];

    let mut group = c.benchmark_group("aggregate");
    for (name, method) in methods {
        let aggregator = CoverageAggregator::new(method, ClassPriority::default())
            .expect("benchmark method is valid");
        for (label, surface) in [("quiet", &quiet_surface), ("busy", &busy_surface)] {
            let live = surface.live_features_at(t);
            group.bench_function(format!("{name}_{label}_{}_features", live.len()), |b| {
                b.iter(|| aggregator.aggregate(black_box(&live), black_box(surface.frame())))
            });
        }
    }
    group.finish();
}

fn bench_advance(c: &mut Criterion) {
    let surface = make_surface(0.05);
    let start = surface.current_time();

    c.bench_function("advance_one_day", |b| {
        b.iter(|| {
            let mut surface = surface.clone();
            surface.advance_to(black_box(start + 1.0))
        })
    });
}

criterion_group!(benches, bench_aggregate, bench_advance);
criterion_main!(benches);
