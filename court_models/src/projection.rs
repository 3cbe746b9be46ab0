//! Pixel → world mappings.
//!
//! Camera calibration happens elsewhere; this module only defines how a
//! calibrated mapping is applied to a detection `(px, py, size)`.
//!
//! # Mappings supported
//! - **Affine**: `w = A·[px, py, size]ᵀ + b`, exactly invertible; used by the
//!   synthetic renderer and tests.
//! - **Planar homography**: `(px, py)` projected onto the front-wall plane
//!   through a 3×3 homography, depth taken linearly from the blob size
//!   (apparent size shrinks as the ball moves away from the camera).

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Maps a pixel-space detection to world coordinates (metres).
pub trait WorldMapping {
    fn to_world(&self, px: f64, py: f64, size: f64) -> Vector3<f64>;
}

/// Affine pixel → world mapping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineMapping {
    pub linear: Matrix3<f64>,
    pub offset: Vector3<f64>,
}

impl AffineMapping {
    pub fn new(linear: Matrix3<f64>, offset: Vector3<f64>) -> Self {
        Self { linear, offset }
    }

    /// Identity mapping: world = (px, py, size).
    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// World → (px, py, size). `None` if the linear part is singular.
    pub fn to_pixel(&self, world: &Vector3<f64>) -> Option<Vector3<f64>> {
        let inv = self.linear.try_inverse()?;
        Some(inv * (world - self.offset))
    }
}

impl WorldMapping for AffineMapping {
    fn to_world(&self, px: f64, py: f64, size: f64) -> Vector3<f64> {
        self.linear * Vector3::new(px, py, size) + self.offset
    }
}

/// Homography onto a vertical plane plus a size-driven depth model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanarHomography {
    /// Image → plane homography; the plane's (u, v) are world (x, y).
    pub homography: Matrix3<f64>,
    /// Depth (world z) of a blob whose size surrogate is zero.
    pub depth_offset: f64,
    /// Change of world z per unit of size surrogate.
    pub depth_per_size: f64,
}

impl PlanarHomography {
    pub fn new(homography: Matrix3<f64>, depth_offset: f64, depth_per_size: f64) -> Self {
        Self {
            homography,
            depth_offset,
            depth_per_size,
        }
    }
}

impl WorldMapping for PlanarHomography {
    fn to_world(&self, px: f64, py: f64, size: f64) -> Vector3<f64> {
        let h = self.homography * Vector3::new(px, py, 1.0);
        // Points at infinity keep the unnormalised coordinates.
        let w = if h.z.abs() < 1e-12 { 1.0 } else { h.z };
        Vector3::new(
            h.x / w,
            h.y / w,
            self.depth_offset + self.depth_per_size * size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn affine_roundtrip() {
        let m = AffineMapping::new(
            Matrix3::new(0.01, 0.0, 0.0, 0.0, -0.01, 0.0, 0.0, 0.0, -0.5),
            Vector3::new(-3.2, 5.0, 8.0),
        );
        let w = m.to_world(320.0, 240.0, 4.0);
        let p = m.to_pixel(&w).unwrap();
        assert_abs_diff_eq!(p.x, 320.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 240.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.z, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn homography_scales_and_sets_depth() {
        let h = Matrix3::new(2.0, 0.0, 1.0, 0.0, 2.0, -1.0, 0.0, 0.0, 2.0);
        let m = PlanarHomography::new(h, 4.0, -0.5);
        let w = m.to_world(3.0, 5.0, 2.0);
        assert_abs_diff_eq!(w.x, 3.5, epsilon = 1e-12);
        assert_abs_diff_eq!(w.y, 4.5, epsilon = 1e-12);
        assert_abs_diff_eq!(w.z, 3.0, epsilon = 1e-12);
    }
}
