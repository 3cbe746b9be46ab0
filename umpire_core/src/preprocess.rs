//! Frame preprocessing: blur → triple-frame difference → binarize → morphology.
//!
//! # Design choices
//! - Every per-frame stage is pure, so frames are processed in parallel with
//!   `rayon`; output order always matches input order.
//! - Differencing is done on wrapped 8-bit values and combined with a bitwise
//!   AND: a pixel survives only if it changed both into and out of frame `i`.
//!   Slow movers (players) cancel out, fast movers (the ball) remain.
//! - N input frames give N − 2 masks; mask `k` belongs to frame `k + 1`.
//!
//! ## Binarization
//! 1. min–max normalise all channels of the difference frame to 0..255
//! 2. greyscale = channel mean
//! 3. threshold (fixed level or Otsu); `value > level` → 255, else 0

use crate::error::{Result, UmpireError};
use crate::types::{Frame, Mask};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::separable_filter;
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask as StructuringElement};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Gaussian blur applied to every input frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Kernel width in pixels (odd, ≥ 1)
    pub kernel_width: u32,
    /// Kernel height in pixels (odd, ≥ 1)
    pub kernel_height: u32,
    /// Standard deviation; ≤ 0 derives it from the kernel size
    pub sigma: f32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            kernel_width: 81,
            kernel_height: 81,
            sigma: 4.0,
        }
    }
}

impl BlurConfig {
    /// 1×1 kernel: frames pass through unchanged.
    pub fn disabled() -> Self {
        Self {
            kernel_width: 1,
            kernel_height: 1,
            sigma: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, k) in [("width", self.kernel_width), ("height", self.kernel_height)] {
            if k == 0 || k % 2 == 0 {
                return Err(UmpireError::config(format!(
                    "blur kernel {name} must be odd and positive, got {k}"
                )));
            }
        }
        if !self.sigma.is_finite() {
            return Err(UmpireError::config("blur sigma must be finite"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ThresholdMode {
    /// Fixed grey level
    Fixed { level: u8 },
    /// Level chosen per frame by Otsu's method
    Otsu,
}

impl Default for ThresholdMode {
    fn default() -> Self {
        ThresholdMode::Otsu
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MorphOp {
    Erode,
    Dilate,
    /// erode × n, then dilate × n
    Open,
    /// dilate × n, then erode × n
    Close,
}

impl fmt::Display for MorphOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MorphOp::Erode => "erode",
            MorphOp::Dilate => "dilate",
            MorphOp::Open => "open",
            MorphOp::Close => "close",
        };
        f.write_str(s)
    }
}

impl FromStr for MorphOp {
    type Err = UmpireError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "erode" => Ok(MorphOp::Erode),
            "dilate" => Ok(MorphOp::Dilate),
            "open" => Ok(MorphOp::Open),
            "close" => Ok(MorphOp::Close),
            other => Err(UmpireError::config(format!(
                "unknown morphological operation '{other}'"
            ))),
        }
    }
}

/// Shape of the structuring element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuringShape {
    Rect,
    Cross,
    Ellipse,
}

impl FromStr for StructuringShape {
    type Err = UmpireError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rect" => Ok(StructuringShape::Rect),
            "cross" => Ok(StructuringShape::Cross),
            "ellipse" => Ok(StructuringShape::Ellipse),
            other => Err(UmpireError::config(format!(
                "unknown structuring element '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyConfig {
    pub op: MorphOp,
    pub shape: StructuringShape,
    /// Element spans (2·radius + 1) pixels per side
    pub radius: u8,
    pub iterations: u32,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            op: MorphOp::Close,
            shape: StructuringShape::Rect,
            radius: 4,
            iterations: 8,
        }
    }
}

impl MorphologyConfig {
    fn element(&self) -> StructuringElement {
        match self.shape {
            StructuringShape::Rect => StructuringElement::square(self.radius),
            StructuringShape::Cross => StructuringElement::diamond(self.radius),
            StructuringShape::Ellipse => StructuringElement::disk(self.radius),
        }
    }
}

/// All preprocessing parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub blur: BlurConfig,
    pub threshold: ThresholdMode,
    pub morphology: MorphologyConfig,
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        self.blur.validate()
    }
}

// ---------------------------------------------------------------------------
// Blur
// ---------------------------------------------------------------------------

/// Normalised 1D Gaussian kernel of odd length `size`.
///
/// A non-positive `sigma` is replaced by `0.3·((size − 1)·0.5 − 1) + 0.8`.
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0];
    }
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let half = (size / 2) as f32;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - half;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

pub fn blur_frame(frame: &Frame, cfg: &BlurConfig) -> Frame {
    if cfg.kernel_width <= 1 && cfg.kernel_height <= 1 {
        return frame.clone();
    }
    let kx = gaussian_kernel(cfg.kernel_width, cfg.sigma);
    let ky = gaussian_kernel(cfg.kernel_height, cfg.sigma);
    separable_filter(frame, &kx, &ky)
}

// ---------------------------------------------------------------------------
// Triple-frame difference
// ---------------------------------------------------------------------------

/// `(cur − prev) AND (next − cur)` per channel, wrapping in 8 bits.
pub fn triple_difference(prev: &Frame, cur: &Frame, next: &Frame) -> Frame {
    let (w, h) = cur.dimensions();
    let mut out = RgbImage::new(w, h);
    let buf: &mut [u8] = &mut out;
    for ((o, (p, c)), n) in buf
        .iter_mut()
        .zip(prev.as_raw().iter().zip(cur.as_raw().iter()))
        .zip(next.as_raw().iter())
    {
        *o = c.wrapping_sub(*p) & n.wrapping_sub(*c);
    }
    out
}

/// Difference every interior frame with its neighbours: N frames → N − 2.
///
/// Fewer than three frames yield an empty output. Frames of differing
/// dimensions are a data error.
pub fn difference_frames(frames: &[Frame]) -> Result<Vec<Frame>> {
    if let Some(first) = frames.first() {
        let dims = first.dimensions();
        if let Some((i, f)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.dimensions() != dims)
        {
            return Err(UmpireError::data(format!(
                "frame {i} is {:?}, expected {:?}",
                f.dimensions(),
                dims
            )));
        }
    }
    if frames.len() < 3 {
        return Ok(Vec::new());
    }
    Ok(frames
        .par_windows(3)
        .map(|w| triple_difference(&w[0], &w[1], &w[2]))
        .collect())
}

// ---------------------------------------------------------------------------
// Binarize
// ---------------------------------------------------------------------------

/// Normalise, convert to grey and threshold a difference frame.
pub fn binarize_frame(frame: &Frame, mode: ThresholdMode) -> Mask {
    let raw = frame.as_raw();
    let (lo, hi) = raw
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let scale = if hi > lo {
        255.0 / (hi - lo) as f32
    } else {
        0.0
    };

    let (w, h) = frame.dimensions();
    let mut grey = GrayImage::new(w, h);
    for (dst, px) in grey.pixels_mut().zip(frame.pixels()) {
        let sum: f32 = px
            .0
            .iter()
            .map(|&v| ((v - lo) as f32 * scale).round())
            .sum();
        *dst = Luma([(sum / 3.0) as u8]);
    }

    let level = match mode {
        ThresholdMode::Fixed { level } => level,
        ThresholdMode::Otsu => otsu_level(&grey),
    };
    for px in grey.pixels_mut() {
        px.0[0] = if px.0[0] > level { 255 } else { 0 };
    }
    grey
}

// ---------------------------------------------------------------------------
// Morphology
// ---------------------------------------------------------------------------

pub fn apply_morphology(mask: &Mask, cfg: &MorphologyConfig) -> Mask {
    let element = cfg.element();
    let dilate = |m: Mask| -> Mask {
        (0..cfg.iterations).fold(m, |acc, _| grayscale_dilate(&acc, &element))
    };
    let erode = |m: Mask| -> Mask {
        (0..cfg.iterations).fold(m, |acc, _| grayscale_erode(&acc, &element))
    };
    match cfg.op {
        MorphOp::Dilate => dilate(mask.clone()),
        MorphOp::Erode => erode(mask.clone()),
        MorphOp::Close => erode(dilate(mask.clone())),
        MorphOp::Open => dilate(erode(mask.clone())),
    }
}

// ---------------------------------------------------------------------------
// Full stage
// ---------------------------------------------------------------------------

/// Run the whole preprocessing stage: N frames in, N − 2 masks out.
pub fn preprocess(frames: &[Frame], cfg: &PreprocessConfig) -> Result<Vec<Mask>> {
    cfg.validate()?;
    let blurred: Vec<Frame> = frames.par_iter().map(|f| blur_frame(f, &cfg.blur)).collect();
    let diffs = difference_frames(&blurred)?;
    Ok(diffs
        .par_iter()
        .map(|d| apply_morphology(&binarize_frame(d, cfg.threshold), &cfg.morphology))
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    fn flat(w: u32, h: u32, v: u8) -> Frame {
        RgbImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let k = gaussian_kernel(7, 1.5);
        assert_eq!(k.len(), 7);
        assert_abs_diff_eq!(k.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(k[0], k[6], epsilon = 1e-7);
        assert!(k[3] > k[2]);
    }

    #[test]
    fn kernel_sigma_derived_from_size() {
        // sigma = 0.3 * (2 - 1) + 0.8 = 1.1 for size 5
        let derived = gaussian_kernel(5, 0.0);
        let explicit = gaussian_kernel(5, 1.1);
        for (a, b) in derived.iter().zip(explicit.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn blur_config_rejects_even_kernel() {
        let cfg = BlurConfig {
            kernel_width: 4,
            ..BlurConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(UmpireError::Configuration(_))));
    }

    #[test]
    fn difference_yields_n_minus_two() {
        let frames: Vec<Frame> = (0..5).map(|i| flat(8, 6, i * 10)).collect();
        let diffs = difference_frames(&frames).unwrap();
        assert_eq!(diffs.len(), 3);
        assert!(difference_frames(&frames[..2]).unwrap().is_empty());
    }

    #[test]
    fn difference_keeps_transient_and_drops_static() {
        let bg = flat(10, 10, 60);
        let mut ball = bg.clone();
        ball.put_pixel(4, 4, Rgb([188, 188, 188]));
        let d = triple_difference(&bg, &ball, &bg);
        // 128 & (256 - 128) = 128
        assert_eq!(d.get_pixel(4, 4).0, [128, 128, 128]);
        assert_eq!(d.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn difference_uses_wrapping_arithmetic() {
        let a = flat(1, 1, 250);
        let b = flat(1, 1, 10);
        let c = flat(1, 1, 250);
        // (10 - 250) mod 256 = 16; (250 - 10) = 240; 16 & 240 = 16
        let d = triple_difference(&a, &b, &c);
        assert_eq!(d.get_pixel(0, 0).0[0], 16);
    }

    #[test]
    fn mismatched_frames_are_data_error() {
        let frames = vec![flat(4, 4, 0), flat(4, 5, 0), flat(4, 4, 0)];
        assert!(matches!(
            difference_frames(&frames),
            Err(UmpireError::Data(_))
        ));
    }

    #[test]
    fn binarize_is_two_level() {
        let mut f = flat(6, 6, 0);
        f.put_pixel(2, 2, Rgb([8, 8, 8]));
        f.put_pixel(3, 2, Rgb([4, 4, 4]));
        let m = binarize_frame(&f, ThresholdMode::Fixed { level: 100 });
        assert_eq!(m.get_pixel(2, 2).0[0], 255);
        assert_eq!(m.get_pixel(3, 2).0[0], 255);
        assert_eq!(m.get_pixel(0, 0).0[0], 0);
        assert!(m.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn binarize_blank_frame_is_empty() {
        let m = binarize_frame(&flat(5, 5, 0), ThresholdMode::Otsu);
        assert!(m.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn close_fills_single_pixel_hole() {
        let mut m = GrayImage::from_pixel(9, 9, Luma([0]));
        for y in 2..7 {
            for x in 2..7 {
                m.put_pixel(x, y, Luma([255]));
            }
        }
        m.put_pixel(4, 4, Luma([0]));
        let cfg = MorphologyConfig {
            op: MorphOp::Close,
            shape: StructuringShape::Rect,
            radius: 1,
            iterations: 1,
        };
        let closed = apply_morphology(&m, &cfg);
        assert_eq!(closed.get_pixel(4, 4).0[0], 255);
        assert_eq!(closed.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn open_removes_speck() {
        let mut m = GrayImage::from_pixel(9, 9, Luma([0]));
        m.put_pixel(4, 4, Luma([255]));
        let cfg = MorphologyConfig {
            op: MorphOp::Open,
            shape: StructuringShape::Cross,
            radius: 1,
            iterations: 1,
        };
        assert!(apply_morphology(&m, &cfg).pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn zero_iterations_is_identity() {
        let mut m = GrayImage::from_pixel(9, 9, Luma([0]));
        m.put_pixel(4, 4, Luma([255]));
        m.put_pixel(1, 7, Luma([255]));
        for op in [MorphOp::Erode, MorphOp::Dilate, MorphOp::Open, MorphOp::Close] {
            let cfg = MorphologyConfig {
                op,
                iterations: 0,
                ..MorphologyConfig::default()
            };
            assert_eq!(apply_morphology(&m, &cfg), m, "{op}");
        }
    }

    #[test]
    fn morph_op_parses_case_insensitively() {
        assert_eq!("Close".parse::<MorphOp>().unwrap(), MorphOp::Close);
        assert!("smear".parse::<MorphOp>().is_err());
    }
}
