//! Multivariate normal density.
//!
//! p(x) = exp(−½ (x−μ)ᵀ Σ⁻¹ (x−μ)) / sqrt((2π)ᵏ |Σ|)
//!
//! Σ is factorised once (Cholesky), so evaluating many sample points against
//! the same posterior costs one triangular solve each.

use crate::error::{Result, UmpireError};
use crate::types::{DMat, DVec};
use nalgebra::{linalg::Cholesky, Dyn};
use std::f64::consts::PI;

/// Pre-factorised Gaussian, reusable across many evaluations.
#[derive(Clone, Debug)]
pub struct GaussianDensity {
    mean: DVec,
    chol: Cholesky<f64, Dyn>,
    /// −½ (k ln 2π + ln |Σ|)
    log_norm: f64,
}

impl GaussianDensity {
    pub fn new(mean: DVec, cov: &DMat) -> Result<Self> {
        let k = mean.len();
        if cov.nrows() != k || cov.ncols() != k {
            return Err(UmpireError::config(format!(
                "covariance is {}×{}, mean has dimension {k}",
                cov.nrows(),
                cov.ncols()
            )));
        }
        if k == 0 {
            return Err(UmpireError::config("density of dimension zero"));
        }
        let chol = cov
            .clone()
            .cholesky()
            .ok_or_else(|| UmpireError::config("covariance is singular or not positive definite"))?;
        let log_det: f64 = 2.0 * chol.l().diagonal().iter().map(|v| v.ln()).sum::<f64>();
        if !log_det.is_finite() {
            return Err(UmpireError::config("covariance determinant is not finite"));
        }
        let log_norm = -0.5 * (k as f64 * (2.0 * PI).ln() + log_det);
        Ok(Self {
            mean,
            chol,
            log_norm,
        })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Squared Mahalanobis distance of `x` from the mean.
    pub fn mahalanobis_sq(&self, x: &DVec) -> Result<f64> {
        if x.len() != self.dim() {
            return Err(UmpireError::config(format!(
                "point has dimension {}, density has {}",
                x.len(),
                self.dim()
            )));
        }
        let diff = x - &self.mean;
        let solved = self.chol.solve(&diff);
        Ok(diff.dot(&solved))
    }

    pub fn pdf(&self, x: &DVec) -> Result<f64> {
        Ok((self.log_norm - 0.5 * self.mahalanobis_sq(x)?).exp())
    }
}

/// One-shot density evaluation.
pub fn multivariate_normal_pdf(x: &DVec, mean: &DVec, cov: &DMat) -> Result<f64> {
    GaussianDensity::new(mean.clone(), cov)?.pdf(x)
}
