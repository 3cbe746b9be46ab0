//! Candidate extraction: external contours of a mask → `(x, y, size)` blobs.
//!
//! Centroids come from the polygon moments of each outer contour
//! (`cx = m10 / (m00 + ε)`, `cy = m01 / (m00 + ε)`), size is `sqrt(area)`.
//! A mask without any contour yields the single [`Candidate::SENTINEL`].

use crate::error::{Result, UmpireError};
use crate::types::{Candidate, Mask};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Added to m00 before dividing, keeps degenerate contours finite
    pub moment_epsilon: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            moment_epsilon: 1e-5,
        }
    }
}

impl ExtractConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.moment_epsilon.is_finite() && self.moment_epsilon > 0.0) {
            return Err(UmpireError::config(format!(
                "moment_epsilon must be finite and positive, got {}",
                self.moment_epsilon
            )));
        }
        Ok(())
    }
}

/// Zeroth and first order moments of a closed polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PolygonMoments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

/// Green's-theorem moments of the polygon through `points` (closed
/// implicitly). Orientation-independent: m00 is always ≥ 0.
pub fn polygon_moments(points: &[Point<i32>]) -> PolygonMoments {
    let n = points.len();
    if n < 3 {
        return PolygonMoments::default();
    }
    let mut m = PolygonMoments::default();
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        let (xi, yi, xj, yj) = (p.x as f64, p.y as f64, q.x as f64, q.y as f64);
        let cross = xi * yj - xj * yi;
        m.m00 += cross;
        m.m10 += (xi + xj) * cross;
        m.m01 += (yi + yj) * cross;
    }
    m.m00 *= 0.5;
    m.m10 /= 6.0;
    m.m01 /= 6.0;
    if m.m00 < 0.0 {
        m.m00 = -m.m00;
        m.m10 = -m.m10;
        m.m01 = -m.m01;
    }
    m
}

fn contour_candidate(contour: &Contour<i32>, eps: f64) -> Candidate {
    let m = polygon_moments(&contour.points);
    Candidate {
        x: m.m10 / (m.m00 + eps),
        y: m.m01 / (m.m00 + eps),
        size: m.m00.sqrt(),
    }
}

/// Candidates of one mask, in contour-tracing order.
pub fn extract_candidates(mask: &Mask, cfg: &ExtractConfig) -> Vec<Candidate> {
    let candidates: Vec<Candidate> = find_contours::<i32>(mask)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| contour_candidate(c, cfg.moment_epsilon))
        .collect();
    if candidates.is_empty() {
        vec![Candidate::SENTINEL]
    } else {
        candidates
    }
}

/// Extract every mask in parallel; output index matches mask index.
pub fn extract_all(masks: &[Mask], cfg: &ExtractConfig) -> Vec<Vec<Candidate>> {
    masks
        .par_iter()
        .map(|m| extract_candidates(m, cfg))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{GrayImage, Luma};

    fn with_rect(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn square_moments() {
        let pts = [
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(4, 4),
            Point::new(0, 4),
        ];
        let m = polygon_moments(&pts);
        assert_abs_diff_eq!(m.m00, 16.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.m10 / m.m00, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.m01 / m.m00, 2.0, epsilon = 1e-12);

        let reversed: Vec<_> = pts.iter().rev().copied().collect();
        assert_eq!(polygon_moments(&reversed), m);
    }

    #[test]
    fn non_positive_epsilon_is_rejected() {
        for eps in [0.0, -1e-5, f64::NAN, f64::INFINITY] {
            let cfg = ExtractConfig { moment_epsilon: eps };
            assert!(matches!(cfg.validate(), Err(UmpireError::Configuration(_))));
        }
        assert!(ExtractConfig::default().validate().is_ok());
    }

    #[test]
    fn single_pixel_blob_has_finite_centroid() {
        let mut mask = GrayImage::new(10, 10);
        mask.put_pixel(4, 6, Luma([255]));
        let cands = extract_candidates(&mask, &ExtractConfig::default());
        assert_eq!(cands.len(), 1);
        assert!(cands[0].x.is_finite() && cands[0].y.is_finite());
        assert_abs_diff_eq!(cands[0].size, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_mask_gives_sentinel() {
        let mask = GrayImage::new(20, 20);
        assert_eq!(
            extract_candidates(&mask, &ExtractConfig::default()),
            vec![Candidate::SENTINEL]
        );
    }

    #[test]
    fn blob_centroid_and_size() {
        let mut mask = GrayImage::new(40, 40);
        with_rect(&mut mask, 10, 20, 16, 26);
        let cands = extract_candidates(&mask, &ExtractConfig::default());
        assert_eq!(cands.len(), 1);
        let c = cands[0];
        assert_abs_diff_eq!(c.x, 13.0, epsilon = 1e-3);
        assert_abs_diff_eq!(c.y, 23.0, epsilon = 1e-3);
        // Boundary through pixel centres: 6 × 6 polygon
        assert_abs_diff_eq!(c.size, 6.0, epsilon = 1e-9);
    }

    #[test]
    fn holes_are_not_candidates() {
        let mut mask = GrayImage::new(40, 40);
        with_rect(&mut mask, 5, 5, 25, 25);
        for y in 12..=18 {
            for x in 12..=18 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        with_rect(&mut mask, 32, 32, 35, 35);
        let cands = extract_candidates(&mask, &ExtractConfig::default());
        assert_eq!(cands.len(), 2);
    }

    #[test]
    fn extract_all_preserves_order() {
        let mut a = GrayImage::new(30, 30);
        with_rect(&mut a, 2, 2, 6, 6);
        let b = GrayImage::new(30, 30);
        let out = extract_all(&[a, b], &ExtractConfig::default());
        assert_eq!(out.len(), 2);
        assert!(!out[0][0].is_sentinel());
        assert!(out[1][0].is_sentinel());
    }
}
