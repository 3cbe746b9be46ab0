//! Synthetic video renderer.
//!
//! Rasterises ball positions into RGB frames for end-to-end runs:
//! - uniform static background
//! - a player-sized block drifting slowly along the bottom of the frame
//! - the ball as a solid disc whose apparent size follows its depth
//!
//! World → pixel goes through the inverse of an `AffineMapping`, so the same
//! mapping turns detections back into world measurements.

use anyhow::{anyhow, Result};
use court_models::AffineMapping;
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Grey levels of the scene elements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneStyle {
    pub background: u8,
    pub ball: u8,
    pub player: u8,
}

impl Default for SceneStyle {
    fn default() -> Self {
        Self {
            background: 60,
            ball: 188,
            player: 120,
        }
    }
}

/// A slow-moving rectangle standing in for a player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerBlock {
    /// Top-left corner in frame 0
    pub x: f64,
    pub y: f64,
    pub width: u32,
    pub height: u32,
    /// Horizontal drift per frame (pixels)
    pub speed: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRenderer {
    pub width: u32,
    pub height: u32,
    /// Pixel → world; inverted for drawing
    pub mapping: AffineMapping,
    pub style: SceneStyle,
    pub player: Option<PlayerBlock>,
}

impl FrameRenderer {
    /// 640×480 view of a standard court with one player.
    pub fn standard() -> Self {
        Self {
            width: 640,
            height: 480,
            mapping: Self::court_mapping(),
            style: SceneStyle::default(),
            player: Some(PlayerBlock {
                x: 60.0,
                y: 400.0,
                width: 40,
                height: 70,
                speed: 1.0,
            }),
        }
    }

    /// Pixel → world for the standard view:
    /// `x = px/80 − 4`, `y = (400 − py)/60`, `z = (8 − size)/0.6`.
    pub fn court_mapping() -> AffineMapping {
        AffineMapping::new(
            Matrix3::new(
                1.0 / 80.0, 0.0, 0.0, //
                0.0, -1.0 / 60.0, 0.0, //
                0.0, 0.0, -1.0 / 0.6,
            ),
            Vector3::new(-4.0, 400.0 / 60.0, 8.0 / 0.6),
        )
    }

    /// `(px, py, size)` of every world position.
    pub fn ball_pixels(&self, positions: &[[f64; 3]]) -> Result<Vec<[f64; 3]>> {
        positions
            .iter()
            .map(|p| {
                self.mapping
                    .to_pixel(&Vector3::from(*p))
                    .map(|v| [v.x, v.y, v.z])
                    .ok_or_else(|| anyhow!("pixel mapping is not invertible"))
            })
            .collect()
    }

    /// One frame per position.
    pub fn render(&self, positions: &[[f64; 3]]) -> Result<Vec<RgbImage>> {
        let pixels = self.ball_pixels(positions)?;
        Ok(pixels
            .iter()
            .enumerate()
            .map(|(i, ball)| self.render_frame(i, ball))
            .collect())
    }

    fn render_frame(&self, index: usize, ball: &[f64; 3]) -> RgbImage {
        let s = &self.style;
        let mut img = RgbImage::from_pixel(self.width, self.height, Rgb([s.background; 3]));

        if let Some(p) = &self.player {
            let x0 = (p.x + p.speed * index as f64).round() as i64;
            let y0 = p.y.round() as i64;
            fill(&mut img, x0, y0, x0 + p.width as i64, y0 + p.height as i64, |_, _| true, s.player);
        }

        let [cx, cy, size] = *ball;
        if size > 0.0 {
            // Traced contours run through boundary pixel centres; half a pixel
            // of padding makes the traced area come out close to size².
            let r = size / std::f64::consts::PI.sqrt() + 0.5;
            let (x0, y0) = ((cx - r).floor() as i64, (cy - r).floor() as i64);
            let (x1, y1) = ((cx + r).ceil() as i64 + 1, (cy + r).ceil() as i64 + 1);
            fill(
                &mut img,
                x0,
                y0,
                x1,
                y1,
                |x, y| (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2) <= r * r,
                s.ball,
            );
        }
        img
    }
}

/// Paint pixels of `[x0, x1) × [y0, y1)` (clipped) for which `inside` holds.
fn fill(
    img: &mut RgbImage,
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
    inside: impl Fn(i64, i64) -> bool,
    value: u8,
) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            if inside(x, y) {
                img.put_pixel(x as u32, y as u32, Rgb([value; 3]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use court_models::WorldMapping;

    #[test]
    fn mapping_roundtrip() {
        let r = FrameRenderer::standard();
        let px = r.ball_pixels(&[[1.0, 1.2, 2.0]]).unwrap()[0];
        assert_abs_diff_eq!(px[0], 400.0, epsilon = 1e-9);
        assert_abs_diff_eq!(px[1], 328.0, epsilon = 1e-9);
        assert_abs_diff_eq!(px[2], 6.8, epsilon = 1e-9);
        let w = r.mapping.to_world(px[0], px[1], px[2]);
        assert_abs_diff_eq!(w.z, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn ball_is_drawn_at_its_pixel_position() {
        let r = FrameRenderer {
            player: None,
            ..FrameRenderer::standard()
        };
        let frames = r.render(&[[0.0, 2.0, 0.0]]).unwrap();
        assert_eq!(frames.len(), 1);
        // (0, 2, 0) → (320, 280)
        assert_eq!(frames[0].get_pixel(320, 280).0, [188; 3]);
        assert_eq!(frames[0].get_pixel(10, 10).0, [60; 3]);
    }

    #[test]
    fn player_drifts() {
        let r = FrameRenderer::standard();
        let frames = r.render(&[[0.0, 2.0, 0.0]; 3]).unwrap();
        assert_eq!(frames[0].get_pixel(60, 410).0, [120; 3]);
        assert_eq!(frames[2].get_pixel(60, 410).0, [60; 3]);
        assert_eq!(frames[2].get_pixel(62, 410).0, [120; 3]);
    }

    #[test]
    fn off_screen_ball_is_clipped() {
        let r = FrameRenderer::standard();
        assert!(r.render(&[[-10.0, -10.0, 0.0]]).is_ok());
    }
}
