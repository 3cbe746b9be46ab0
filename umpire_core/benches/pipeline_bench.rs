use court_models::CourtGeometry;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sim::render::FrameRenderer;
use sim::scenarios::{RallyKind, RallyScenario};
use umpire_core::extract::{extract_all, ExtractConfig};
use umpire_core::pipeline::{Pipeline, PipelineConfig};
use umpire_core::preprocess::{preprocess, BlurConfig, PreprocessConfig};

fn bench_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection");
    group.sample_size(10);

    let truth = RallyScenario::build(RallyKind::FrontWallOut, 42).ground_truth();
    let frames = FrameRenderer::standard()
        .render(&truth[..12])
        .expect("standard mapping is invertible");

    for (name, blur) in [("no_blur", BlurConfig::disabled()), ("blur_81", BlurConfig::default())] {
        let config = PreprocessConfig {
            blur,
            ..PreprocessConfig::default()
        };
        group.bench_function(format!("preprocess_{name}"), |b| {
            b.iter(|| black_box(preprocess(&frames, &config).unwrap()));
        });
    }

    let masks = preprocess(
        &frames,
        &PreprocessConfig {
            blur: BlurConfig::disabled(),
            ..PreprocessConfig::default()
        },
    )
    .unwrap();
    group.bench_function("extract", |b| {
        b.iter(|| black_box(extract_all(&masks, &ExtractConfig::default())));
    });

    group.finish();
}

fn bench_interpretation(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpretation");

    for kind in [RallyKind::InCourt, RallyKind::FrontWallOut] {
        let measurements = RallyScenario::build(kind, 7).with_noise(0.02).measurements();
        group.bench_function(format!("{kind:?}"), |b| {
            b.iter(|| {
                let mut pipeline =
                    Pipeline::new(PipelineConfig::default(), CourtGeometry::squash()).unwrap();
                black_box(pipeline.interpret(&measurements).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_detection, bench_interpretation);
criterion_main!(benches);
