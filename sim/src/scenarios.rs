//! Rally scenario definitions.
//!
//! Each scenario is one ball flight from a launch point to a contact point
//! chosen relative to the court's zones. All scenarios are deterministic
//! given the same seed.

use crate::trajectory::{Ball, BallMotion, GRAVITY};
use court_models::CourtDimensions;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Which pre-defined rally to build.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum RallyKind {
    /// Straight line through the middle of the court, no wall contact
    InCourt,
    /// Lob ending above the front-wall out line
    FrontWallOut,
    /// Drive ending above the back-wall out line
    BackWallOut,
    /// Low drive ending in the tin
    Tin,
}

impl RallyKind {
    pub fn expected_out(&self) -> bool {
        !matches!(self, RallyKind::InCourt)
    }

    /// Registry name of the zone the rally ends in.
    pub fn expected_zone(&self) -> Option<&'static str> {
        match self {
            RallyKind::InCourt => None,
            RallyKind::FrontWallOut => Some("front_wall_out"),
            RallyKind::BackWallOut => Some("back_wall_out"),
            RallyKind::Tin => Some("tin"),
        }
    }
}

/// A fully configured rally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RallyScenario {
    pub name: String,
    pub kind: RallyKind,
    pub seed: u64,
    /// Camera frame rate
    pub fps: f64,
    /// Flight time, launch to contact (s)
    pub duration: f64,
    pub ball: Ball,
    /// Std-dev of the Gaussian noise added to measurements (m)
    pub measurement_noise_std: f64,
}

impl RallyScenario {
    pub const DEFAULT_FPS: f64 = 50.0;

    /// Build the named rally on a standard court. Uses `seed` for repeatability.
    pub fn build(kind: RallyKind, seed: u64) -> Self {
        Self::build_on(kind, seed, &CourtDimensions::default())
    }

    pub fn build_on(kind: RallyKind, seed: u64, d: &CourtDimensions) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut jitter = |scale: f64| (rng.gen::<f64>() * 2.0 - 1.0) * scale;
        let hl = d.half_length();
        // Contact points sit mid-way into the zone behind the wall.
        let behind = d.zone_depth * 0.5;

        let (start, target, duration, motion) = match kind {
            RallyKind::InCourt => (
                [-1.0 + jitter(0.2), 1.0 + jitter(0.1), -2.5 + jitter(0.2)],
                [1.0 + jitter(0.2), 1.2 + jitter(0.1), 2.5 + jitter(0.2)],
                0.5,
                BallMotion::ConstantVelocity,
            ),
            RallyKind::FrontWallOut => (
                [-0.5 + jitter(0.2), 1.0 + jitter(0.1), -1.0 + jitter(0.2)],
                [
                    0.5 + jitter(0.2),
                    d.front_out_line + 0.8 + jitter(0.1),
                    hl + behind + jitter(0.05),
                ],
                0.6,
                BallMotion::Ballistic { gravity: GRAVITY },
            ),
            RallyKind::BackWallOut => (
                [jitter(0.2), 1.0 + jitter(0.1), 1.5 + jitter(0.2)],
                [
                    -0.5 + jitter(0.2),
                    d.back_out_line + 1.0 + jitter(0.1),
                    -hl - behind + jitter(0.05),
                ],
                0.6,
                BallMotion::Ballistic { gravity: GRAVITY },
            ),
            RallyKind::Tin => (
                [0.3 + jitter(0.2), 1.2 + jitter(0.1), jitter(0.2)],
                [
                    0.3 + jitter(0.2),
                    d.tin_height * 0.5 + jitter(0.05),
                    hl + behind + jitter(0.05),
                ],
                0.5,
                BallMotion::Ballistic { gravity: GRAVITY },
            ),
        };

        Self {
            name: format!("{kind:?}"),
            kind,
            seed,
            fps: Self::DEFAULT_FPS,
            duration,
            ball: Ball::aimed(start, target, duration, motion),
            measurement_noise_std: 0.0,
        }
    }

    pub fn with_noise(mut self, std: f64) -> Self {
        self.measurement_noise_std = std;
        self
    }

    pub fn dt(&self) -> f64 {
        1.0 / self.fps
    }

    /// Samples from launch to contact, both included.
    pub fn frame_count(&self) -> usize {
        (self.duration * self.fps).round() as usize + 1
    }

    /// True ball positions, one per frame.
    pub fn ground_truth(&self) -> Vec<[f64; 3]> {
        self.ball.sample_positions(self.frame_count(), self.dt())
    }

    /// Ground truth plus Gaussian noise (deterministic per seed).
    pub fn measurements(&self) -> Vec<[f64; 3]> {
        let truth = self.ground_truth();
        let noise = match Normal::new(0.0, self.measurement_noise_std) {
            Ok(n) if self.measurement_noise_std > 0.0 => n,
            _ => return truth,
        };
        // Separate stream from the one that placed the ball.
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(0x9e37_79b9));
        truth
            .into_iter()
            .map(|p| p.map(|v| v + noise.sample(&mut rng)))
            .collect()
    }
}
