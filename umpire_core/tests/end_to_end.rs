//! Rendered video through the full pipeline.

use court_models::CourtGeometry;
use sim::render::FrameRenderer;
use sim::scenarios::{RallyKind, RallyScenario};
use umpire_core::interpreter::Call;
use umpire_core::metrics::DetectionMetrics;
use umpire_core::pipeline::{Pipeline, PipelineConfig};
use umpire_core::preprocess::{BlurConfig, MorphologyConfig, ThresholdMode};
use umpire_core::{DetectionSource, FilterConfig, KalmanConfig};

/// Settings for a clean synthetic render at 25 fps.
fn render_config() -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.preprocess.blur = BlurConfig::disabled();
    cfg.preprocess.threshold = ThresholdMode::Fixed { level: 100 };
    cfg.preprocess.morphology = MorphologyConfig {
        radius: 1,
        iterations: 1,
        ..MorphologyConfig::default()
    };
    cfg.filter = FilterConfig {
        min_size: 2.0,
        max_size: 30.0,
        min_travel: 2.0,
        max_travel: 40.0,
        ..FilterConfig::default()
    };
    cfg.kalman = KalmanConfig::constant_acceleration(1.0 / 25.0, 1e-2, 1e-2);
    cfg
}

fn slow_rally(kind: RallyKind, seed: u64) -> RallyScenario {
    let mut s = RallyScenario::build(kind, seed);
    s.fps = 25.0;
    s
}

#[test]
fn rendered_in_court_rally_is_in() {
    let scenario = slow_rally(RallyKind::InCourt, 11);
    let truth = scenario.ground_truth();
    let renderer = FrameRenderer::standard();
    let frames = renderer.render(&truth).unwrap();
    let pixels = renderer.ball_pixels(&truth).unwrap();

    let mut pipeline = Pipeline::new(render_config(), CourtGeometry::squash()).unwrap();
    let out = pipeline
        .run(&frames, (pixels[1][0], pixels[1][1]), &renderer.mapping)
        .unwrap();

    // N frames → N − 2 masks → one detection each, starting at frame 1.
    assert_eq!(out.detection.candidates.len(), frames.len() - 2);
    assert_eq!(out.detection.detections.len(), frames.len() - 2);
    assert!(out.detection.frame_errors.is_empty());
    assert_eq!(out.detection.detections[0].frame.0, 1);
    assert_eq!(out.detection.detections[0].source, DetectionSource::Bootstrap);
    assert!(out.detection.detections[1..]
        .iter()
        .all(|d| d.source == DetectionSource::Motion));

    let det = DetectionMetrics::evaluate(2.0, &out.detection.detections, |f| {
        pixels.get(f.0).map(|p| (p[0], p[1]))
    });
    assert!(det.fraction_within() >= 0.8, "mean error {}", det.mean_error());

    assert_eq!(out.steps.len(), out.measurements.len());
    assert_eq!(out.classification.call, Call::In);
    assert!(out.out_frame.is_none());
}

#[test]
fn rendered_lob_is_tracked() {
    let scenario = slow_rally(RallyKind::FrontWallOut, 3);
    let truth = scenario.ground_truth();
    let renderer = FrameRenderer::standard();
    let frames = renderer.render(&truth).unwrap();
    let pixels = renderer.ball_pixels(&truth).unwrap();

    let mut pipeline = Pipeline::new(render_config(), CourtGeometry::squash()).unwrap();
    let out = pipeline.detect(&frames, (pixels[1][0], pixels[1][1])).unwrap();

    let det = DetectionMetrics::evaluate(3.0, &out.detections, |f| {
        pixels.get(f.0).map(|p| (p[0], p[1]))
    });
    assert_eq!(det.n_evaluated as usize, frames.len() - 2);
    assert!(det.fraction_within() >= 0.8, "mean error {}", det.mean_error());
}

#[test]
fn static_scene_produces_no_detection() {
    let truth = vec![[0.0, 2.0, 0.0]; 6];
    let renderer = FrameRenderer::standard();
    let frames = renderer.render(&truth).unwrap();

    let mut pipeline = Pipeline::new(render_config(), CourtGeometry::squash()).unwrap();
    let out = pipeline.detect(&frames, (320.0, 280.0)).unwrap();
    // A still ball and a slowly drifting player both cancel out.
    assert!(out.detections.is_empty());
    assert_eq!(out.frame_errors.len(), 4);
}
