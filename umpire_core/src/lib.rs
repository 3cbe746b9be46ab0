//! `umpire_core` — Ball detection, state estimation and in/out calls.
//!
//! # Module layout
//! - [`types`]            — Fundamental types (frames, candidates, detections, posteriors)
//! - [`error`]            — `UmpireError` taxonomy
//! - [`preprocess`]       — Blur, triple-frame difference, binarize, morphology
//! - [`extract`]          — Contours → candidate blobs
//! - [`candidate_filter`] — Size / travel filtering down to one detection per frame
//! - [`kf`]               — Kalman filter over a measurement sequence
//! - [`gaussian`]         — Multivariate normal density
//! - [`interpreter`]      — Zone probabilities per step, whole-trajectory call
//! - [`pipeline`]         — Full pipeline orchestrator
//! - [`metrics`]          — Detection pixel error, tracking RMSE

pub mod candidate_filter;
pub mod error;
pub mod extract;
pub mod gaussian;
pub mod interpreter;
pub mod kf;
pub mod metrics;
pub mod pipeline;
pub mod preprocess;
pub mod types;

pub use candidate_filter::{CandidateFilter, FilterConfig, TieBreak};
pub use error::{Result, UmpireError};
pub use interpreter::{Call, Classification, InterpreterConfig, StepReport, TrajectoryInterpreter};
pub use kf::{KalmanConfig, KalmanFilter, StateEstimator};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput, Stage};
pub use types::{Candidate, DMat, DVec, Detection, DetectionSource, FrameIndex, Posterior};
