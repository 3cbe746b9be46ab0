//! Pipeline orchestrator: video frames → ball detections → in/out call.
//!
//! # Processing steps
//! 1. Preprocess: blur, triple-frame difference, binarize, morphology
//!    (N frames → N − 2 masks, mask `k` belongs to frame `k + 1`)
//! 2. Extract candidate blobs from every mask
//! 3. Filter candidates down to one detection per frame
//! 4. Map detections to world coordinates (`WorldMapping`)
//! 5. Run the Kalman filter over the measurements and interpret the
//!    posterior beliefs against the court zones
//!
//! Stages 1–2 are per-frame parallel (rayon); stages 3–5 are sequential.
//! Configuration is validated in full before any frame is touched.

use crate::{
    candidate_filter::{CandidateFilter, FilterConfig},
    error::{Result, UmpireError},
    extract::{extract_all, ExtractConfig},
    interpreter::{Classification, InterpreterConfig, StepReport, TrajectoryInterpreter},
    kf::{KalmanConfig, KalmanFilter},
    preprocess::{preprocess, PreprocessConfig},
    types::{Candidate, DVec, Detection, Frame, FrameIndex},
};
use court_models::{CourtGeometry, WorldMapping};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, time::Instant};
use tracing::info;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the whole pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub extract: ExtractConfig,
    pub filter: FilterConfig,
    pub kalman: KalmanConfig,
    pub interpreter: InterpreterConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.preprocess.validate()?;
        self.extract.validate()?;
        self.filter.validate()?;
        self.kalman.validate()?;
        self.interpreter.validate()?;
        if self.kalman.position_dims != self.interpreter.samples_per_axis.len() {
            return Err(UmpireError::config(format!(
                "kalman position_dims ({}) differs from interpreter grid dimension ({})",
                self.kalman.position_dims,
                self.interpreter.samples_per_axis.len()
            )));
        }
        Ok(())
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            UmpireError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }
}

// ---------------------------------------------------------------------------
// Progress / outputs
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Preprocess,
    Extract,
    Filter,
    Interpret,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Preprocess => "preprocess",
            Stage::Extract => "extract",
            Stage::Filter => "filter",
            Stage::Interpret => "interpret",
        };
        f.write_str(s)
    }
}

/// Progress observer: `(stage, done, total)`.
pub type ProgressFn = Box<dyn FnMut(Stage, usize, usize) + Send>;

/// Per-stage wall-clock time in microseconds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineTimings {
    pub preprocess_us: u64,
    pub extract_us: u64,
    pub filter_us: u64,
    pub interpret_us: u64,
}

/// Detection half of the pipeline.
#[derive(Clone, Debug, Default)]
pub struct DetectionOutput {
    /// Candidates per mask (index `k` ↔ video frame `k + 1`)
    pub candidates: Vec<Vec<Candidate>>,
    /// Detections, indexed by video frame
    pub detections: Vec<Detection>,
    /// Per-frame data errors, indexed by video frame
    pub frame_errors: Vec<(FrameIndex, UmpireError)>,
}

/// Estimation/interpretation half of the pipeline.
#[derive(Clone, Debug)]
pub struct Interpretation {
    pub steps: Vec<StepReport>,
    pub classification: Classification,
}

/// Everything a full run produces.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub detection: DetectionOutput,
    /// World-space measurements fed to the estimator, one per detection
    pub measurements: Vec<[f64; 3]>,
    pub steps: Vec<StepReport>,
    pub classification: Classification,
    /// Video frame of the decisive out-zone step, if the call is Out
    pub out_frame: Option<FrameIndex>,
    pub timings: PipelineTimings,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    config: PipelineConfig,
    court: CourtGeometry,
    progress: Option<ProgressFn>,
    timings: PipelineTimings,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, court: CourtGeometry) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            court,
            progress: None,
            timings: PipelineTimings::default(),
        })
    }

    pub fn with_progress(mut self, progress: impl FnMut(Stage, usize, usize) + Send + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn court(&self) -> &CourtGeometry {
        &self.court
    }

    fn report(&mut self, stage: Stage, done: usize, total: usize) {
        if let Some(p) = self.progress.as_mut() {
            p(stage, done, total);
        }
    }

    /// Stages 1–3: frames → one detection per frame.
    ///
    /// `initial_position` is the ball's pixel position in the first frame.
    pub fn detect(&mut self, frames: &[Frame], initial_position: (f64, f64)) -> Result<DetectionOutput> {
        let t0 = Instant::now();
        let masks = preprocess(frames, &self.config.preprocess)?;
        self.timings.preprocess_us = t0.elapsed().as_micros() as u64;
        self.report(Stage::Preprocess, masks.len(), masks.len());

        let t0 = Instant::now();
        let candidates = extract_all(&masks, &self.config.extract);
        self.timings.extract_us = t0.elapsed().as_micros() as u64;
        self.report(Stage::Extract, candidates.len(), candidates.len());

        let t0 = Instant::now();
        let mut filter = CandidateFilter::new(self.config.filter.clone(), initial_position)?;
        let report = filter.run(&candidates);
        // Filter indices are mask indices; shift onto video frames.
        let detections: Vec<Detection> = report
            .detections
            .into_iter()
            .map(|d| Detection {
                frame: FrameIndex(d.frame.0 + 1),
                ..d
            })
            .collect();
        let frame_errors: Vec<(FrameIndex, UmpireError)> = report
            .errors
            .into_iter()
            .map(|(f, e)| (FrameIndex(f.0 + 1), e))
            .collect();
        self.report(Stage::Filter, candidates.len(), candidates.len());
        self.timings.filter_us = t0.elapsed().as_micros() as u64;

        info!(
            frames = frames.len(),
            masks = masks.len(),
            detections = detections.len(),
            errors = frame_errors.len(),
            "detection complete"
        );
        Ok(DetectionOutput {
            candidates,
            detections,
            frame_errors,
        })
    }

    /// Stages 4–5 on world-space measurements.
    pub fn interpret(&mut self, measurements: &[[f64; 3]]) -> Result<Interpretation> {
        let first = measurements
            .first()
            .ok_or_else(|| UmpireError::data("no measurements to interpret"))?;
        let t0 = Instant::now();

        let mut kalman = self.config.kalman.clone();
        if kalman.initial_mean.is_none() {
            kalman = kalman.with_initial_position(first);
        }
        let ms: Vec<DVec> = measurements.iter().map(|m| DVec::from_row_slice(m)).collect();
        let estimator = KalmanFilter::new(kalman, ms)?;
        let mut interpreter =
            TrajectoryInterpreter::new(estimator, &self.court, self.config.interpreter.clone())?;

        let mut progress = self.progress.take();
        let classification = interpreter.classify_with_progress(&mut |done, total| {
            if let Some(p) = progress.as_mut() {
                p(Stage::Interpret, done, total);
            }
        });
        self.progress = progress;
        let classification = classification?;

        self.timings.interpret_us = t0.elapsed().as_micros() as u64;
        Ok(Interpretation {
            steps: interpreter.steps().to_vec(),
            classification,
        })
    }

    /// Full run: frames → verdict.
    pub fn run(
        &mut self,
        frames: &[Frame],
        initial_position: (f64, f64),
        mapping: &dyn WorldMapping,
    ) -> Result<PipelineOutput> {
        self.timings = PipelineTimings::default();
        let detection = self.detect(frames, initial_position)?;
        if detection.detections.is_empty() {
            return Err(UmpireError::data("no frame produced a ball detection"));
        }
        let measurements: Vec<[f64; 3]> = detection
            .detections
            .iter()
            .map(|d| {
                let w = mapping.to_world(d.candidate.x, d.candidate.y, d.candidate.size);
                [w.x, w.y, w.z]
            })
            .collect();
        let Interpretation {
            steps,
            classification,
        } = self.interpret(&measurements)?;
        // Step s consumed detection s − 1.
        let out_frame = classification
            .step
            .and_then(|s| detection.detections.get(s.wrapping_sub(1)))
            .map(|d| d.frame);
        if let Some(frame) = out_frame {
            info!(frame = %frame, "out-zone contact");
        }
        Ok(PipelineOutput {
            detection,
            measurements,
            steps,
            classification,
            out_frame,
            timings: self.timings.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
