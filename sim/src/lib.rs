//! `sim` — Synthetic rallies: ball trajectories, rendered video, replay logs.

pub mod render;
pub mod replay;
pub mod scenarios;
pub mod trajectory;

pub use render::{FrameRenderer, PlayerBlock, SceneStyle};
pub use replay::{load_replay, save_replay, ReplayLog};
pub use scenarios::{RallyKind, RallyScenario};
pub use trajectory::{Ball, BallMotion};
