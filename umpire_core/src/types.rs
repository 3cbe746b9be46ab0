//! Fundamental types used across the entire workspace.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Scalar type: f64 throughout for numerical precision in the Kalman filter.
// ---------------------------------------------------------------------------

/// Runtime-dimensioned vector (state, measurement, sample point)
pub type DVec = DVector<f64>;

/// Runtime-dimensioned matrix (Ψ, Φ, Σ, K)
pub type DMat = DMatrix<f64>;

/// A decoded video frame.
pub type Frame = image::RgbImage;

/// A two-level foreground mask (0 or 255).
pub type Mask = image::GrayImage;

// ---------------------------------------------------------------------------
// Frame index — newtype so frame and step counters are never confused
// ---------------------------------------------------------------------------

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FrameIndex(pub usize);

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Candidate / Detection
// ---------------------------------------------------------------------------

/// A blob found in one frame, before temporal filtering.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Centroid x (pixels)
    pub x: f64,
    /// Centroid y (pixels)
    pub y: f64,
    /// sqrt(contour area); shrinks as the ball recedes
    pub size: f64,
}

impl Candidate {
    /// Emitted for a frame in which no contour was found.
    pub const SENTINEL: Candidate = Candidate {
        x: -1.0,
        y: -1.0,
        size: -1.0,
    };

    pub fn new(x: f64, y: f64, size: f64) -> Self {
        Self { x, y, size }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    /// Euclidean pixel distance to `(x, y)`.
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }

    pub fn distance(&self, other: &Candidate) -> f64 {
        self.distance_to(other.x, other.y)
    }
}

/// How the candidate filter arrived at a detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionSource {
    /// Nearest to the user-supplied initial ball position
    Bootstrap,
    /// Passed the travel-distance constraint
    Motion,
    /// No candidate passed; nearest to the previous accepted centroid
    CentroidFallback,
    /// No candidate survived the size band; previous detection repeated
    CarriedForward,
}

/// The single candidate accepted for a frame: one Kalman measurement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub frame: FrameIndex,
    pub candidate: Candidate,
    pub source: DetectionSource,
}

// ---------------------------------------------------------------------------
// Posterior
// ---------------------------------------------------------------------------

/// Estimator belief after incorporating the measurement of `step`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    /// Number of measurements incorporated so far
    pub step: usize,
    pub mean: DVec,
    pub cov: DMat,
}
