//! Kalman filter over a pre-recorded measurement sequence.
//!
//! # Design choices
//! - Linear KF with runtime dimensions (`DMat`/`DVec`), so the same code runs
//!   a 3-state position model or the 9-state constant-acceleration model.
//! - The whole measurement sequence is owned up front; `step()` consumes the
//!   next measurement and returns the new posterior.
//! - The first `position_dims` state components are the ball position. The
//!   interpreter only ever looks at that block.
//! - `StateEstimator` is the seam the interpreter is written against.
//!
//! ## State vector (default)
//! x = [px, py, pz, vx, vy, vz, ax, ay, az]ᵀ
//!
//! ## Step t
//! μ⁺ = Ψ·μ + μp
//! Σ⁺ = Σp + Ψ·Σ·Ψᵀ
//! K  = Σ⁺·Φᵀ·(Φ·Σ⁺·Φᵀ + Σm)⁻¹
//! μ  = μ⁺ + K·(x_t − Φ·μ⁺ − μm)
//! Σ  = (I − K·Φ)·Σ⁺

use crate::error::{Result, UmpireError};
use crate::gaussian::GaussianDensity;
use crate::types::{DMat, DVec, Posterior};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Sequential state estimator consumed by the trajectory interpreter.
pub trait StateEstimator {
    /// Incorporate the next measurement. Once exhausted, returns the last
    /// posterior unchanged.
    fn step(&mut self) -> Result<Posterior>;

    /// Zero the non-position components and restore the initial covariance.
    fn reset(&mut self);

    fn posterior(&self) -> Posterior;

    /// Mean of the position block.
    fn position_mean(&self) -> DVec;

    /// Covariance of the position block.
    fn position_cov(&self) -> DMat;

    /// Gaussian density of the current position belief at `point`.
    fn probability_of_point(&self, point: &DVec) -> Result<f64>;

    /// Measurements incorporated so far.
    fn steps_taken(&self) -> usize;

    /// Total number of measurements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_exhausted(&self) -> bool {
        self.steps_taken() >= self.len()
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Model matrices and initial belief.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Leading state components that are the ball position
    pub position_dims: usize,
    /// Initial mean μ₀ (zeros if absent)
    pub initial_mean: Option<DVec>,
    /// Initial covariance Σ₀
    pub initial_cov: DMat,
    /// Ψ
    pub transition: DMat,
    /// μp (zeros if absent)
    pub process_mean: Option<DVec>,
    /// Σp
    pub process_cov: DMat,
    /// Φ
    pub observation: DMat,
    /// μm (zeros if absent)
    pub measurement_mean: Option<DVec>,
    /// Σm
    pub measurement_cov: DMat,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self::constant_acceleration(
            1.0 / 50.0,
            Self::DEFAULT_PROCESS_VARIANCE,
            Self::DEFAULT_MEASUREMENT_VARIANCE,
        )
    }
}

impl KalmanConfig {
    /// Initial covariance scale: Σ₀ = I·500.
    pub const DEFAULT_INITIAL_VARIANCE: f64 = 500.0;
    /// Σp scale, world units.
    pub const DEFAULT_PROCESS_VARIANCE: f64 = 1e-2;
    /// Σm scale (m²): about 1 cm of measurement noise.
    pub const DEFAULT_MEASUREMENT_VARIANCE: f64 = 1e-4;

    /// 9-state constant-acceleration model observing 3D position.
    ///
    /// `process_var` and `measurement_var` scale identity covariances.
    pub fn constant_acceleration(dt: f64, process_var: f64, measurement_var: f64) -> Self {
        let mut psi = DMat::identity(9, 9);
        for i in 0..3 {
            psi[(i, i + 3)] = dt; // p += v·dt
            psi[(i, i + 6)] = 0.5 * dt * dt; // p += ½a·dt²
            psi[(i + 3, i + 6)] = dt; // v += a·dt
        }
        let mut phi = DMat::zeros(3, 9);
        for i in 0..3 {
            phi[(i, i)] = 1.0;
        }
        Self {
            position_dims: 3,
            initial_mean: None,
            initial_cov: DMat::identity(9, 9) * Self::DEFAULT_INITIAL_VARIANCE,
            transition: psi,
            process_mean: None,
            process_cov: DMat::identity(9, 9) * process_var,
            observation: phi,
            measurement_mean: None,
            measurement_cov: DMat::identity(3, 3) * measurement_var,
        }
    }

    /// Seed the position block of μ₀, leaving the rest at zero.
    pub fn with_initial_position(mut self, position: &[f64]) -> Self {
        let mut mean = self
            .initial_mean
            .take()
            .unwrap_or_else(|| DVec::zeros(self.state_dim()));
        for (i, v) in position.iter().take(self.position_dims).enumerate() {
            if i < mean.len() {
                mean[i] = *v;
            }
        }
        self.initial_mean = Some(mean);
        self
    }

    pub fn state_dim(&self) -> usize {
        self.transition.nrows()
    }

    pub fn measurement_dim(&self) -> usize {
        self.observation.nrows()
    }

    /// Check every matrix and vector against the state/measurement dimensions.
    pub fn validate(&self) -> Result<()> {
        let n = self.state_dim();
        let m = self.measurement_dim();
        let shape = |name: &str, mat: &DMat, r: usize, c: usize| -> Result<()> {
            if mat.nrows() != r || mat.ncols() != c {
                return Err(UmpireError::config(format!(
                    "{name} is {}×{}, expected {r}×{c}",
                    mat.nrows(),
                    mat.ncols()
                )));
            }
            if mat.iter().any(|v| !v.is_finite()) {
                return Err(UmpireError::config(format!("{name} has non-finite entries")));
            }
            Ok(())
        };
        let len = |name: &str, v: &Option<DVec>, d: usize| -> Result<()> {
            match v {
                Some(v) if v.len() != d => Err(UmpireError::config(format!(
                    "{name} has length {}, expected {d}",
                    v.len()
                ))),
                _ => Ok(()),
            }
        };

        if n == 0 || m == 0 {
            return Err(UmpireError::config("state and measurement dimensions must be non-zero"));
        }
        shape("transition", &self.transition, n, n)?;
        shape("process_cov", &self.process_cov, n, n)?;
        shape("initial_cov", &self.initial_cov, n, n)?;
        shape("observation", &self.observation, m, n)?;
        shape("measurement_cov", &self.measurement_cov, m, m)?;
        len("initial_mean", &self.initial_mean, n)?;
        len("process_mean", &self.process_mean, n)?;
        len("measurement_mean", &self.measurement_mean, m)?;
        if self.position_dims == 0 || self.position_dims > n {
            return Err(UmpireError::config(format!(
                "position_dims {} must be within 1..={n}",
                self.position_dims
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Kalman filter
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct KalmanFilter {
    config: KalmanConfig,
    measurements: Vec<DVec>,
    mean: DVec,
    cov: DMat,
    process_mean: DVec,
    measurement_mean: DVec,
    t: usize,
}

impl KalmanFilter {
    /// Validates all dimensions before any step is taken.
    pub fn new(config: KalmanConfig, measurements: Vec<DVec>) -> Result<Self> {
        config.validate()?;
        let n = config.state_dim();
        let m = config.measurement_dim();
        if let Some((k, x)) = measurements.iter().enumerate().find(|(_, x)| x.len() != m) {
            return Err(UmpireError::config(format!(
                "measurement {k} has dimension {}, observation model expects {m}",
                x.len()
            )));
        }
        let mean = config.initial_mean.clone().unwrap_or_else(|| DVec::zeros(n));
        let cov = config.initial_cov.clone();
        let process_mean = config.process_mean.clone().unwrap_or_else(|| DVec::zeros(n));
        let measurement_mean = config
            .measurement_mean
            .clone()
            .unwrap_or_else(|| DVec::zeros(m));
        Ok(Self {
            config,
            measurements,
            mean,
            cov,
            process_mean,
            measurement_mean,
            t: 0,
        })
    }

    pub fn config(&self) -> &KalmanConfig {
        &self.config
    }

    pub fn measurements(&self) -> &[DVec] {
        &self.measurements
    }

    /// Predict + update with `x`. Pure: does not touch `self`.
    fn filter_step(&self, x: &DVec) -> Result<(DVec, DMat)> {
        let psi = &self.config.transition;
        let phi = &self.config.observation;

        let mean_pred = psi * &self.mean + &self.process_mean;
        let cov_pred = &self.config.process_cov + psi * &self.cov * psi.transpose();

        let s = phi * &cov_pred * phi.transpose() + &self.config.measurement_cov;
        let s_inv = s
            .try_inverse()
            .ok_or_else(|| UmpireError::config("innovation covariance is singular"))?;
        let k = &cov_pred * phi.transpose() * s_inv;

        let innovation = x - phi * &mean_pred - &self.measurement_mean;
        let mean = &mean_pred + &k * innovation;
        let n = self.config.state_dim();
        let cov = (DMat::identity(n, n) - &k * phi) * cov_pred;
        // Round-off creeps into the off-diagonals.
        let cov = (&cov + cov.transpose()) * 0.5;
        Ok((mean, cov))
    }
}

impl StateEstimator for KalmanFilter {
    fn step(&mut self) -> Result<Posterior> {
        let Some(x) = self.measurements.get(self.t) else {
            debug!(step = self.t, "estimator exhausted, posterior unchanged");
            return Ok(self.posterior());
        };
        let (mean, cov) = self.filter_step(x)?;
        self.mean = mean;
        self.cov = cov;
        self.t += 1;
        Ok(self.posterior())
    }

    fn reset(&mut self) {
        let p = self.config.position_dims;
        for i in p..self.mean.len() {
            self.mean[i] = 0.0;
        }
        self.cov = self.config.initial_cov.clone();
    }

    fn posterior(&self) -> Posterior {
        Posterior {
            step: self.t,
            mean: self.mean.clone(),
            cov: self.cov.clone(),
        }
    }

    fn position_mean(&self) -> DVec {
        self.mean.rows(0, self.config.position_dims).into_owned()
    }

    fn position_cov(&self) -> DMat {
        let p = self.config.position_dims;
        self.cov.view((0, 0), (p, p)).into_owned()
    }

    fn probability_of_point(&self, point: &DVec) -> Result<f64> {
        GaussianDensity::new(self.position_mean(), &self.position_cov())?.pdf(point)
    }

    fn steps_taken(&self) -> usize {
        self.t
    }

    fn len(&self) -> usize {
        self.measurements.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn point_model() -> KalmanConfig {
        KalmanConfig {
            position_dims: 3,
            initial_mean: None,
            initial_cov: DMat::identity(3, 3) * 500.0,
            transition: DMat::identity(3, 3),
            process_mean: None,
            process_cov: DMat::identity(3, 3) * 0.01,
            observation: DMat::identity(3, 3),
            measurement_mean: None,
            measurement_cov: DMat::identity(3, 3),
        }
    }

    fn v3(x: f64, y: f64, z: f64) -> DVec {
        DVec::from_vec(vec![x, y, z])
    }

    #[test]
    fn default_is_nine_state_constant_acceleration() {
        let cfg = KalmanConfig::default();
        assert_eq!(cfg.state_dim(), 9);
        assert_eq!(cfg.measurement_dim(), 3);
        assert_abs_diff_eq!(cfg.transition[(0, 3)], 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(cfg.transition[(0, 6)], 0.0002, epsilon = 1e-12);
        assert_abs_diff_eq!(cfg.measurement_cov[(1, 1)], 1e-4, epsilon = 1e-15);
        assert_abs_diff_eq!(cfg.process_cov[(8, 8)], 1e-2, epsilon = 1e-15);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn step_moves_towards_measurement() {
        let mut kf = KalmanFilter::new(point_model(), vec![v3(1.0, 2.0, 3.0)]).unwrap();
        let post = kf.step().unwrap();
        assert_eq!(post.step, 1);
        // Σ₀ ≫ Σm: the posterior sits almost on the measurement.
        assert_abs_diff_eq!(post.mean[0], 1.0, epsilon = 1e-2);
        assert_abs_diff_eq!(post.mean[2], 3.0, epsilon = 1e-2);
        assert!(post.cov[(0, 0)] < 1.0);
    }

    #[test]
    fn covariance_stays_symmetric_psd() {
        let ms: Vec<DVec> = (0..30)
            .map(|i| v3(i as f64 * 0.1, 1.0 + (i as f64 * 0.3).sin(), 2.0))
            .collect();
        let mut kf = KalmanFilter::new(KalmanConfig::default(), ms).unwrap();
        while !kf.is_exhausted() {
            let post = kf.step().unwrap();
            assert_abs_diff_eq!(post.cov.clone(), post.cov.transpose(), epsilon = 1e-9);
            let eig = post.cov.symmetric_eigenvalues();
            assert!(eig.iter().all(|&e| e > -1e-9), "negative eigenvalue: {eig}");
        }
    }

    #[test]
    fn exhausted_step_returns_last_posterior() {
        let mut kf = KalmanFilter::new(point_model(), vec![v3(0.0, 0.0, 0.0)]).unwrap();
        let last = kf.step().unwrap();
        assert!(kf.is_exhausted());
        let again = kf.step().unwrap();
        assert_eq!(last, again);
        assert_eq!(kf.steps_taken(), 1);
    }

    #[test]
    fn determinism() {
        let ms: Vec<DVec> = (0..10).map(|i| v3(i as f64, 0.5, -1.0)).collect();
        let run = || {
            let mut kf = KalmanFilter::new(KalmanConfig::default(), ms.clone()).unwrap();
            (0..10).map(|_| kf.step().unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn reset_keeps_position_zeroes_rest() {
        let ms: Vec<DVec> = (0..5).map(|i| v3(i as f64, 0.0, 0.0)).collect();
        let cfg = KalmanConfig::default();
        let mut kf = KalmanFilter::new(cfg.clone(), ms).unwrap();
        for _ in 0..5 {
            kf.step().unwrap();
        }
        let before = kf.position_mean();
        kf.reset();
        assert_eq!(kf.position_mean(), before);
        assert!(kf.posterior().mean.rows(3, 6).iter().all(|&v| v == 0.0));
        assert_eq!(kf.posterior().cov, cfg.initial_cov);
        assert_eq!(kf.steps_taken(), 5);
    }

    #[test]
    fn dimension_mismatch_fails_at_construction() {
        let mut cfg = point_model();
        cfg.observation = DMat::identity(2, 3);
        assert!(matches!(
            KalmanFilter::new(cfg, vec![]),
            Err(UmpireError::Configuration(_))
        ));

        let err = KalmanFilter::new(point_model(), vec![DVec::zeros(2)]).unwrap_err();
        assert!(matches!(err, UmpireError::Configuration(_)));
    }

    #[test]
    fn position_probability_peaks_at_mean() {
        let mut kf = KalmanFilter::new(point_model(), vec![v3(1.0, 1.0, 1.0)]).unwrap();
        kf.step().unwrap();
        let at_mean = kf.probability_of_point(&kf.position_mean()).unwrap();
        let off = kf.probability_of_point(&v3(2.0, 1.0, 1.0)).unwrap();
        assert!(at_mean > off);
        assert!(kf.probability_of_point(&DVec::zeros(2)).is_err());
    }

    #[test]
    fn constant_acceleration_tracks_ballistic_path() {
        let dt = 0.02;
        let g = -9.81;
        let truth: Vec<DVec> = (0..50)
            .map(|k| {
                let t = k as f64 * dt;
                v3(0.5 + 2.0 * t, 1.0 + 4.0 * t + 0.5 * g * t * t, -2.0 + 6.0 * t)
            })
            .collect();
        let mut cfg = KalmanConfig::constant_acceleration(dt, 1e-6, 1e-6);
        cfg = cfg.with_initial_position(&[0.5, 1.0, -2.0]);
        let mut kf = KalmanFilter::new(cfg, truth.clone()).unwrap();
        let mut last = kf.posterior();
        while !kf.is_exhausted() {
            last = kf.step().unwrap();
        }
        let end = truth.last().unwrap();
        for i in 0..3 {
            assert_abs_diff_eq!(last.mean[i], end[i], epsilon = 1e-2);
        }
    }
}
