//! `umpire` CLI: synthetic rally runs, replay classification, config export.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use court_models::CourtGeometry;
use sim::render::FrameRenderer;
use sim::replay::{load_replay, save_replay, ReplayLog};
use sim::scenarios::{RallyKind, RallyScenario};
use std::path::{Path, PathBuf};
use umpire_core::metrics::{DetectionMetrics, TrackingMetrics};
use umpire_core::pipeline::{Pipeline, PipelineConfig, Stage};
use umpire_core::types::FrameIndex;
use umpire_core::Classification;

#[derive(Parser)]
#[command(name = "umpire", about = "Offline in/out calls from rally video")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic rally through the pipeline and print the call.
    RunScenario {
        #[arg(value_enum)]
        scenario: RallyKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Std-dev of measurement noise (m)
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
        /// Render frames and run the full video pipeline
        #[arg(long)]
        render: bool,
        /// Pipeline configuration (JSON); defaults otherwise
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the replay log
        #[arg(long)]
        save_replay: Option<PathBuf>,
    },
    /// Classify a previously recorded replay log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the default pipeline configuration as JSON.
    DefaultConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            noise,
            render,
            config,
            output,
            save_replay: save_path,
        } => {
            let config = load_config(config.as_deref())?;
            run_scenario(
                scenario,
                seed,
                noise,
                render,
                config,
                output.as_deref(),
                save_path.as_deref(),
            )?;
        }
        Commands::Replay {
            input,
            config,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            run_replay(&input, config, output.as_deref())?;
        }
        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&PipelineConfig::default())?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::from_json_file(p)
            .with_context(|| format!("loading configuration {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn new_pipeline(config: PipelineConfig) -> Result<Pipeline> {
    Ok(Pipeline::new(config, CourtGeometry::squash())?.with_progress(|stage, done, total| {
        if stage != Stage::Interpret || done == total {
            tracing::debug!(%stage, done, total, "progress");
        }
    }))
}

fn print_call(c: &Classification, frame: Option<FrameIndex>) {
    println!("Call: {}", describe_call(c, frame));
}

/// Verdict line; the out location is a video frame when known, else a 1-based step.
fn describe_call(c: &Classification, frame: Option<FrameIndex>) -> String {
    let head = format!("{} (confidence {:.3})", c.call, c.confidence);
    match (&c.zone, frame, c.step) {
        (Some(zone), Some(at), _) => format!("{head} in {zone} at frame {}", at.0),
        (Some(zone), None, Some(step)) => format!("{head} in {zone} at step {step}"),
        (Some(zone), None, None) => format!("{head} in {zone}"),
        (None, ..) => head,
    }
}

fn run_scenario(
    kind: RallyKind,
    seed: u64,
    noise: f64,
    render: bool,
    config: PipelineConfig,
    output_path: Option<&Path>,
    replay_path: Option<&Path>,
) -> Result<()> {
    let scenario = RallyScenario::build(kind, seed).with_noise(noise);
    let truth = scenario.ground_truth();
    let mut pipeline = new_pipeline(config)?;

    println!(
        "Running rally '{}' (seed={}, {} frames at {:.0} fps)...",
        scenario.name,
        seed,
        scenario.frame_count(),
        scenario.fps
    );
    let start = std::time::Instant::now();

    let (classification, out_frame, tracking, detection) = if render {
        let renderer = FrameRenderer::standard();
        let frames = renderer.render(&truth)?;
        let pixels = renderer.ball_pixels(&truth)?;
        // Bootstrap on the ball in frame 1, the first frame with a mask.
        let first = pixels.get(1).context("rally too short to render")?;
        let out = pipeline.run(&frames, (first[0], first[1]), &renderer.mapping)?;

        let det = DetectionMetrics::evaluate(2.0, &out.detection.detections, |f| {
            pixels.get(f.0).map(|p| (p[0], p[1]))
        });
        let frames_of: Vec<usize> = out.detection.detections.iter().map(|d| d.frame.0).collect();
        let gt: Vec<[f64; 3]> = frames_of.iter().map(|&f| truth[f]).collect();
        let est: Vec<[f64; 3]> = out.steps.iter().map(|s| s.position).collect();
        let tracking = TrackingMetrics::evaluate(&gt, &est, &out.measurements);
        (out.classification, out.out_frame, tracking, Some(det))
    } else {
        let measurements = scenario.measurements();
        let interp = pipeline.interpret(&measurements)?;
        let est: Vec<[f64; 3]> = interp.steps.iter().map(|s| s.position).collect();
        let tracking = TrackingMetrics::evaluate(&truth, &est, &measurements);
        // Step s consumed measurement s − 1, which is frame s − 1.
        let frame = interp.classification.step.map(|s| FrameIndex(s.saturating_sub(1)));
        (interp.classification, frame, tracking, None)
    };

    let elapsed = start.elapsed();
    print_call(&classification, out_frame);
    println!(
        "Expected: {}  |  position RMSE {:.3} m (raw {:.3} m)  |  elapsed={:.2}s",
        if kind.expected_out() { "OUT" } else { "IN" },
        tracking.rmse_position(),
        tracking.measurement_rmse_position(),
        elapsed.as_secs_f64()
    );
    if let Some(det) = &detection {
        println!(
            "Detections: {} evaluated, mean error {:.2} px, {:.0}% within 2 px",
            det.n_evaluated,
            det.mean_error(),
            det.fraction_within() * 100.0
        );
    }

    if let Some(rpath) = replay_path {
        save_replay(&ReplayLog::from_scenario(&scenario), rpath)?;
        println!("Replay saved to {}", rpath.display());
    }

    if let Some(opath) = output_path {
        let json = serde_json::json!({
            "scenario": scenario.name,
            "seed": seed,
            "classification": classification,
            "out_frame": out_frame,
            "expected_out": kind.expected_out(),
            "tracking": tracking,
            "detection": detection,
            "elapsed_s": elapsed.as_secs_f64(),
        });
        std::fs::write(opath, serde_json::to_string_pretty(&json)?)?;
        println!("Metrics saved to {}", opath.display());
    }

    Ok(())
}

fn run_replay(input: &Path, config: PipelineConfig, output_path: Option<&Path>) -> Result<()> {
    let log = load_replay(input)?;
    println!(
        "Replaying '{}' ({} measurements)...",
        log.scenario_name,
        log.measurements.len()
    );

    let mut pipeline = new_pipeline(config)?;
    let start = std::time::Instant::now();
    let interp = pipeline.interpret(&log.measurements)?;
    let elapsed = start.elapsed();

    let est: Vec<[f64; 3]> = interp.steps.iter().map(|s| s.position).collect();
    let tracking = TrackingMetrics::evaluate(&log.ground_truth, &est, &log.measurements);
    let frame = interp.classification.step.map(|s| FrameIndex(s.saturating_sub(1)));
    print_call(&interp.classification, frame);
    println!(
        "Replay done: position RMSE {:.3} m, elapsed={:.2}s",
        tracking.rmse_position(),
        elapsed.as_secs_f64()
    );

    if let Some(opath) = output_path {
        let json = serde_json::json!({
            "scenario": log.scenario_name,
            "seed": log.seed,
            "classification": interp.classification,
            "out_frame": frame,
            "tracking": tracking,
            "elapsed_s": elapsed.as_secs_f64(),
        });
        std::fs::write(opath, serde_json::to_string_pretty(&json)?)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use umpire_core::Call;

    fn out_call(step: usize) -> Classification {
        Classification {
            call: Call::Out,
            confidence: 0.9,
            zone: Some("tin".into()),
            step: Some(step),
        }
    }

    #[test]
    fn out_location_prefers_the_frame() {
        let line = describe_call(&out_call(12), Some(FrameIndex(11)));
        assert_eq!(line, "OUT (confidence 0.900) in tin at frame 11");
    }

    #[test]
    fn step_is_never_shown_as_a_frame() {
        let line = describe_call(&out_call(12), None);
        assert_eq!(line, "OUT (confidence 0.900) in tin at step 12");
    }

    #[test]
    fn in_call_has_no_location() {
        let c = Classification {
            call: Call::In,
            confidence: 0.75,
            zone: None,
            step: None,
        };
        assert_eq!(describe_call(&c, Some(FrameIndex(3))), "IN (confidence 0.750)");
    }
}
