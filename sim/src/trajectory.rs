//! Ball trajectory models and state propagation.
//!
//! The ball has a true state [px, py, pz, vx, vy, vz] in court coordinates
//! (x across, y up, z towards the front wall) and a `BallMotion` describing
//! how it moves between samples.

use serde::{Deserialize, Serialize};

/// Standard gravity (m/s²), acting along −y.
pub const GRAVITY: f64 = 9.81;

/// How the ball moves between samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BallMotion {
    /// No acceleration.
    ConstantVelocity,
    /// Free flight under gravity, drag ignored.
    Ballistic { gravity: f64 },
}

impl BallMotion {
    pub fn acceleration(&self) -> [f64; 3] {
        match self {
            BallMotion::ConstantVelocity => [0.0; 3],
            BallMotion::Ballistic { gravity } => [0.0, -gravity, 0.0],
        }
    }
}

/// A simulated ball with ground-truth state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    /// True state [px, py, pz, vx, vy, vz]
    pub state: [f64; 6],
    pub motion: BallMotion,
}

impl Ball {
    pub fn new(position: [f64; 3], velocity: [f64; 3], motion: BallMotion) -> Self {
        Self {
            state: [
                position[0],
                position[1],
                position[2],
                velocity[0],
                velocity[1],
                velocity[2],
            ],
            motion,
        }
    }

    /// Ball launched from `start` so that it reaches `target` after `duration` seconds.
    pub fn aimed(start: [f64; 3], target: [f64; 3], duration: f64, motion: BallMotion) -> Self {
        let a = motion.acceleration();
        let v = [0usize, 1, 2].map(|i| (target[i] - start[i] - 0.5 * a[i] * duration * duration) / duration);
        Self::new(start, v, motion)
    }

    pub fn position(&self) -> [f64; 3] {
        [self.state[0], self.state[1], self.state[2]]
    }

    /// Propagate the true state by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let a = self.motion.acceleration();
        let s = &mut self.state;
        for i in 0..3 {
            s[i] += s[i + 3] * dt + 0.5 * a[i] * dt * dt;
            s[i + 3] += a[i] * dt;
        }
    }

    /// Positions at `t = 0, dt, …, (n − 1)·dt`; does not mutate `self`.
    pub fn sample_positions(&self, n: usize, dt: f64) -> Vec<[f64; 3]> {
        let mut ball = self.clone();
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(ball.position());
            ball.step(dt);
        }
        out
    }
}
