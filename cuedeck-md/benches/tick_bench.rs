//! Director Tick Performance Benchmark
//!
//! Measures the cost of one director pass so the tick stays negligible next
//! to a 60 Hz frame budget (16.7 ms).
//!
//! **Goal:** Steady-state tick well under 10 µs
//! **Target:** Crossfade-heavy tick under 50 µs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cuedeck_common::config::{CueDefinition, MusicConfigProvider, MusicCue, MusicProjectConfig};
use cuedeck_common::events::EventBus;
use cuedeck_common::FadeCurve;
use cuedeck_md::playback::VolumeRamp;
use cuedeck_md::{ClipLoader, DirectorSettings, ManualLoader, MusicDirector, SimulatedHost};
use std::sync::Arc;
use std::time::Duration;

const DT: Duration = Duration::from_micros(16_667);

fn director_with_cues(count: usize) -> (MusicDirector, SimulatedHost) {
    let loader = Arc::new(ManualLoader::new());
    let cues: Vec<CueDefinition> = (0..count)
        .map(|i| {
            let locator = format!("cue{}.ogg", i);
            loader.ready(locator.clone(), Duration::from_secs(600));
            CueDefinition::new(locator).at(i as f64 * 0.5)
        })
        .collect();

    loader.ready("ambient.ogg", Duration::from_secs(600));
    let config = MusicProjectConfig {
        playlist: vec![MusicCue {
            file: "ambient.ogg".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    };

    let dyn_loader: Arc<dyn ClipLoader> = loader;
    let mut director = MusicDirector::new(
        DirectorSettings::default(),
        MusicConfigProvider::fixed(config),
        dyn_loader,
        EventBus::new(16),
    );
    director.activate_cues("Bench", cues);
    (director, SimulatedHost::new())
}

fn bench_director_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("director_tick");

    for count in [1usize, 16, 128] {
        group.bench_with_input(BenchmarkId::new("timeline", count), &count, |b, &count| {
            let (mut director, mut host) = director_with_cues(count);
            b.iter(|| {
                host.advance(DT);
                director.tick(black_box(&mut host), DT);
            });
        });
    }

    group.bench_function("paused_overlay", |b| {
        let (mut director, mut host) = director_with_cues(4);
        host.set_paused(true);
        b.iter(|| {
            director.tick(black_box(&mut host), DT);
        });
    });

    group.finish();
}

fn bench_volume_ramps(c: &mut Criterion) {
    let mut group = c.benchmark_group("volume_ramp");

    for (name, curve) in [
        ("linear", FadeCurve::Linear),
        ("s_curve", FadeCurve::SCurve),
        ("equal_power", FadeCurve::EqualPower),
    ] {
        group.bench_function(BenchmarkId::new("advance", name), |b| {
            b.iter(|| {
                let mut ramp = VolumeRamp::new(0.0, 1.0, 0.75, curve);
                while !ramp.is_complete() {
                    black_box(ramp.advance(DT.as_secs_f64()));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_director_tick, bench_volume_ramps);
criterion_main!(benches);
