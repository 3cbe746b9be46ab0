//! Evaluation metrics: detection pixel error, tracking RMSE vs ground truth.

use crate::types::{Detection, FrameIndex};
use serde::{Deserialize, Serialize};

/// Accuracy of accepted detections against ground-truth pixel positions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectionMetrics {
    /// Detections matched to a ground-truth frame
    pub n_evaluated: u64,
    /// Detections within `tolerance_px` of the truth
    pub n_within: u64,
    pub tolerance_px: f64,
    pub sum_err: f64,
    pub sum_sq_err: f64,
    pub max_err: f64,
}

impl DetectionMetrics {
    pub fn new(tolerance_px: f64) -> Self {
        Self {
            tolerance_px,
            ..Self::default()
        }
    }

    /// Compare each detection with `truth(frame)`; frames without truth are skipped.
    pub fn evaluate(
        tolerance_px: f64,
        detections: &[Detection],
        truth: impl Fn(FrameIndex) -> Option<(f64, f64)>,
    ) -> Self {
        let mut m = Self::new(tolerance_px);
        for d in detections {
            if let Some((x, y)) = truth(d.frame) {
                m.accumulate(d.candidate.distance_to(x, y));
            }
        }
        m
    }

    pub fn accumulate(&mut self, err: f64) {
        self.n_evaluated += 1;
        self.sum_err += err;
        self.sum_sq_err += err * err;
        self.max_err = self.max_err.max(err);
        if err <= self.tolerance_px {
            self.n_within += 1;
        }
    }

    pub fn mean_error(&self) -> f64 {
        if self.n_evaluated == 0 {
            return 0.0;
        }
        self.sum_err / self.n_evaluated as f64
    }

    pub fn rms_error(&self) -> f64 {
        if self.n_evaluated == 0 {
            return 0.0;
        }
        (self.sum_sq_err / self.n_evaluated as f64).sqrt()
    }

    /// Fraction of detections within tolerance (1.0 when nothing was evaluated).
    pub fn fraction_within(&self) -> f64 {
        if self.n_evaluated == 0 {
            1.0
        } else {
            self.n_within as f64 / self.n_evaluated as f64
        }
    }
}

/// Position RMSE of estimates (and raw measurements) against ground truth.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackingMetrics {
    pub n_samples: u64,
    /// Per-axis sum of squared estimate errors
    pub sum_sq_est: [f64; 3],
    /// Per-axis sum of squared measurement errors
    pub sum_sq_meas: [f64; 3],
}

impl TrackingMetrics {
    /// Accumulate one time step.
    pub fn accumulate(&mut self, truth: &[f64; 3], estimate: &[f64; 3], measurement: &[f64; 3]) {
        self.n_samples += 1;
        for i in 0..3 {
            self.sum_sq_est[i] += (estimate[i] - truth[i]).powi(2);
            self.sum_sq_meas[i] += (measurement[i] - truth[i]).powi(2);
        }
    }

    /// Zip three equally indexed sequences; extra entries are ignored.
    pub fn evaluate(truth: &[[f64; 3]], estimates: &[[f64; 3]], measurements: &[[f64; 3]]) -> Self {
        let mut m = Self::default();
        for ((t, e), z) in truth.iter().zip(estimates).zip(measurements) {
            m.accumulate(t, e, z);
        }
        m
    }

    fn rmse(&self, sums: &[f64; 3]) -> [f64; 3] {
        if self.n_samples == 0 {
            return [0.0; 3];
        }
        let n = self.n_samples as f64;
        sums.map(|s| (s / n).sqrt())
    }

    pub fn rmse_axes(&self) -> [f64; 3] {
        self.rmse(&self.sum_sq_est)
    }

    pub fn measurement_rmse_axes(&self) -> [f64; 3] {
        self.rmse(&self.sum_sq_meas)
    }

    /// 3D position RMSE of the estimates (metres).
    pub fn rmse_position(&self) -> f64 {
        if self.n_samples == 0 {
            return 0.0;
        }
        (self.sum_sq_est.iter().sum::<f64>() / self.n_samples as f64).sqrt()
    }

    pub fn measurement_rmse_position(&self) -> f64 {
        if self.n_samples == 0 {
            return 0.0;
        }
        (self.sum_sq_meas.iter().sum::<f64>() / self.n_samples as f64).sqrt()
    }
}
