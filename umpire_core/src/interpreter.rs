//! Trajectory interpretation: posterior position beliefs → in/out call.
//!
//! # Per step
//! 1. Advance the estimator by one measurement.
//! 2. Lay a regular grid over the position belief: along axis `i`,
//!    `samples_per_axis[i]` evenly spaced points spanning `μᵢ ± k·σᵢ`.
//! 3. Weight every sample by the Gaussian density of the belief.
//! 4. `P(zone) = Σ density(samples inside zone) / Σ density(all samples)`.
//! 5. The step's zone is the one with the highest *weighted* probability;
//!    out-zones are multiplied by their configured weight (default ×2,
//!    `back_wall_out` ×1) before comparison.
//!
//! # Whole trajectory
//! The largest weighted out-zone probability over all steps, clamped to 1,
//! is the out confidence. At or above `confidence_threshold` the call is `Out`
//! (with that zone and step); otherwise `In` with confidence `1 − max`.
//!
//! The result is memoised; classifying twice is a sequence error.

use crate::error::{Result, UmpireError};
use crate::gaussian::GaussianDensity;
use crate::kf::StateEstimator;
use crate::types::{DMat, DVec, Posterior};
use court_models::{CourtGeometry, ZoneKind};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Grid points per position axis
    pub samples_per_axis: Vec<usize>,
    /// Grid half-width in standard deviations
    pub std_multiplier: f64,
    /// Weighted out probability above which the call is Out
    pub confidence_threshold: f64,
    /// Weight of out-zones without an explicit entry in `zone_weights`
    pub default_out_weight: f64,
    /// Per-zone weight overrides
    pub zone_weights: BTreeMap<String, f64>,
    /// Steps after which the estimator is reset
    pub reset_after_steps: Vec<usize>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            samples_per_axis: vec![5, 3, 5],
            std_multiplier: 1.0,
            confidence_threshold: 0.65,
            default_out_weight: 2.0,
            zone_weights: BTreeMap::from([("back_wall_out".to_owned(), 1.0)]),
            reset_after_steps: Vec::new(),
        }
    }
}

impl InterpreterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.samples_per_axis.len() != 3 {
            return Err(UmpireError::config(format!(
                "samples_per_axis has {} entries, court zones are 3D",
                self.samples_per_axis.len()
            )));
        }
        if self.samples_per_axis.iter().any(|&n| n == 0) {
            return Err(UmpireError::config("samples_per_axis entries must be ≥ 1"));
        }
        if !(self.std_multiplier.is_finite() && self.std_multiplier >= 0.0) {
            return Err(UmpireError::config("std_multiplier must be finite and ≥ 0"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(UmpireError::config("confidence_threshold must lie in [0, 1]"));
        }
        let weights = std::iter::once(&self.default_out_weight).chain(self.zone_weights.values());
        for w in weights {
            if !(w.is_finite() && *w >= 0.0) {
                return Err(UmpireError::config("zone weights must be finite and ≥ 0"));
            }
        }
        Ok(())
    }

    pub fn weight_for(&self, zone: &str, kind: ZoneKind) -> f64 {
        match (self.zone_weights.get(zone), kind) {
            (Some(w), _) => *w,
            (None, ZoneKind::Out) => self.default_out_weight,
            (None, ZoneKind::In) => 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Call {
    In,
    Out,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::In => write!(f, "IN"),
            Call::Out => write!(f, "OUT"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneProbability {
    pub zone: String,
    pub kind: ZoneKind,
    pub probability: f64,
    /// `probability × zone weight`
    pub weighted: f64,
}

/// Everything computed for one estimator step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// 1-based: measurements incorporated so far
    pub step: usize,
    /// Full posterior mean (position, then the remaining states)
    pub mean: DVec,
    /// Full posterior covariance
    pub cov: DMat,
    pub position: [f64; 3],
    pub position_std: [f64; 3],
    /// In registry order
    pub zones: Vec<ZoneProbability>,
    /// Highest weighted probability, `None` if the belief touches no zone
    pub zone: Option<String>,
}

impl StepReport {
    /// Largest weighted out-zone probability at this step.
    pub fn max_out(&self) -> Option<&ZoneProbability> {
        self.zones
            .iter()
            .filter(|z| z.kind == ZoneKind::Out)
            .fold(None, |best: Option<&ZoneProbability>, z| match best {
                Some(b) if b.weighted >= z.weighted => Some(b),
                _ => Some(z),
            })
    }
}

/// Final in/out decision for a trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub call: Call,
    pub confidence: f64,
    /// Out-zone with the largest weighted probability
    pub zone: Option<String>,
    /// Step at which that probability occurred
    pub step: Option<usize>,
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

pub struct TrajectoryInterpreter<'c, E: StateEstimator> {
    estimator: E,
    court: &'c CourtGeometry,
    config: InterpreterConfig,
    steps: Vec<StepReport>,
    verdict: Option<Classification>,
}

impl<'c, E: StateEstimator> TrajectoryInterpreter<'c, E> {
    pub fn new(estimator: E, court: &'c CourtGeometry, config: InterpreterConfig) -> Result<Self> {
        config.validate()?;
        let dims = estimator.position_mean().len();
        if dims != 3 {
            return Err(UmpireError::config(format!(
                "estimator position block has {dims} dimensions, expected 3"
            )));
        }
        Ok(Self {
            estimator,
            court,
            config,
            steps: Vec::new(),
            verdict: None,
        })
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn steps(&self) -> &[StepReport] {
        &self.steps
    }

    /// Memoised classification, if already computed.
    pub fn verdict(&self) -> Option<&Classification> {
        self.verdict.as_ref()
    }

    /// Probability series of one zone across the steps taken so far.
    pub fn zone_series(&self, zone: &str) -> Vec<f64> {
        self.steps
            .iter()
            .filter_map(|s| s.zones.iter().find(|z| z.zone == zone))
            .map(|z| z.probability)
            .collect()
    }

    /// Advance by one measurement. `None` once the estimator is exhausted.
    pub fn step(&mut self) -> Result<Option<&StepReport>> {
        if self.estimator.is_exhausted() {
            return Ok(None);
        }
        let posterior = self.estimator.step()?;
        let step = posterior.step;
        let report = self.evaluate(posterior)?;
        if let Some(zone) = &report.zone {
            debug!(step = report.step, zone = %zone, "belief touches zone");
        }
        if self.config.reset_after_steps.contains(&step) {
            debug!(step, "resetting estimator");
            self.estimator.reset();
        }
        self.steps.push(report);
        Ok(self.steps.last())
    }

    /// Run all remaining steps and decide. Fails on a second call.
    pub fn classify(&mut self) -> Result<Classification> {
        self.classify_with_progress(&mut |_, _| {})
    }

    /// As [`classify`](Self::classify), reporting `(steps_done, total)`.
    pub fn classify_with_progress(
        &mut self,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Classification> {
        if self.verdict.is_some() {
            return Err(UmpireError::sequence(
                "trajectory already classified; results are memoised",
            ));
        }
        let total = self.estimator.len();
        while self.step()?.is_some() {
            progress(self.steps.len(), total);
        }

        let mut best: Option<(f64, &str, usize)> = None;
        for s in &self.steps {
            if let Some(z) = s.max_out() {
                if best.map_or(true, |(w, _, _)| z.weighted > w) {
                    best = Some((z.weighted, z.zone.as_str(), s.step));
                }
            }
        }
        let max_out = best.map_or(0.0, |(w, _, _)| w.min(1.0));
        let verdict = match best {
            Some((_, zone, step)) if max_out >= self.config.confidence_threshold => Classification {
                call: Call::Out,
                confidence: max_out,
                zone: Some(zone.to_owned()),
                step: Some(step),
            },
            _ => Classification {
                call: Call::In,
                confidence: 1.0 - max_out,
                zone: None,
                step: None,
            },
        };
        info!(
            call = %verdict.call,
            confidence = verdict.confidence,
            steps = self.steps.len(),
            "trajectory classified"
        );
        self.verdict = Some(verdict.clone());
        Ok(verdict)
    }

    fn evaluate(&self, posterior: Posterior) -> Result<StepReport> {
        let mean = self.estimator.position_mean();
        let cov = self.estimator.position_cov();
        let std: Vec<f64> = (0..3).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();

        let density = GaussianDensity::new(mean.clone(), &cov)?;
        let samples = sample_grid(&mean, &std, &self.config);
        let mut weights = Vec::with_capacity(samples.len());
        for s in &samples {
            weights.push(density.pdf(s)?);
        }
        let total: f64 = weights.iter().sum();

        let zones: Vec<ZoneProbability> = self
            .court
            .zones
            .iter()
            .map(|zone| {
                let probability = if total > 0.0 && total.is_finite() {
                    samples
                        .iter()
                        .zip(&weights)
                        .filter(|(s, _)| zone.contains(&Vector3::new(s[0], s[1], s[2])))
                        .map(|(_, w)| w)
                        .sum::<f64>()
                        / total
                } else {
                    0.0
                };
                ZoneProbability {
                    zone: zone.name().to_owned(),
                    kind: zone.kind(),
                    probability,
                    weighted: probability * self.config.weight_for(zone.name(), zone.kind()),
                }
            })
            .collect();

        let zone = zones
            .iter()
            .filter(|z| z.probability > 0.0)
            .fold(None, |best: Option<&ZoneProbability>, z| match best {
                Some(b) if b.weighted >= z.weighted => Some(b),
                _ => Some(z),
            })
            .map(|z| z.zone.clone());

        Ok(StepReport {
            step: posterior.step,
            mean: posterior.mean,
            cov: posterior.cov,
            position: [mean[0], mean[1], mean[2]],
            position_std: [std[0], std[1], std[2]],
            zones,
            zone,
        })
    }
}

/// Cartesian grid of `samples_per_axis[i]` points per axis over `μ ± k·σ`.
/// A single sample sits on the mean.
fn sample_grid(mean: &DVec, std: &[f64], cfg: &InterpreterConfig) -> Vec<DVec> {
    let axes: Vec<Vec<f64>> = (0..3)
        .map(|i| {
            let n = cfg.samples_per_axis[i];
            let half = cfg.std_multiplier * std[i];
            if n == 1 {
                vec![mean[i]]
            } else {
                (0..n)
                    .map(|k| mean[i] - half + 2.0 * half * k as f64 / (n - 1) as f64)
                    .collect()
            }
        })
        .collect();

    let mut grid = Vec::with_capacity(axes.iter().map(Vec::len).product());
    for &x in &axes[0] {
        for &y in &axes[1] {
            for &z in &axes[2] {
                grid.push(DVec::from_vec(vec![x, y, z]));
            }
        }
    }
    grid
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
