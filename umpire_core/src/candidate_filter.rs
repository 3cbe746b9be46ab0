//! Temporal candidate filter: many blobs per frame → one ball detection.
//!
//! # Rules, applied per frame in order
//! 1. **Size band**: discard candidates with `size` outside `[min_size, max_size]`
//!    and the empty-frame sentinel. Duplicates within the frame are dropped.
//! 2. **Bootstrap** (no accepted frame yet): keep only the survivor nearest to
//!    the initial ball position.
//! 3. **Motion**: accept every survivor not already accepted in the previous
//!    frame whose distance to some previously accepted candidate lies strictly
//!    inside `(min_travel, max_travel)`.
//! 4. **Fallback**: if nothing passed, accept the single survivor nearest to
//!    the centroid of the previous accepted set.
//!
//! The accepted set of frame `i` is what frame `i + 1` is compared with; the
//! detection handed downstream is one member of it, chosen by [`TieBreak`].
//!
//! A frame whose size band leaves nothing is a per-frame `Data` error. The
//! filter still advances: the previous accepted set stays the reference.

use crate::error::{Result, UmpireError};
use crate::types::{Candidate, Detection, DetectionSource, FrameIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// How to pick the detection when several candidates pass the motion rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First accepted, in extraction order
    #[default]
    First,
    /// Largest `size`
    Largest,
    /// Nearest to the previous detection
    NearestPrevious,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_size: f64,
    pub max_size: f64,
    /// Exclusive lower bound on inter-frame travel (pixels)
    pub min_travel: f64,
    /// Exclusive upper bound on inter-frame travel (pixels)
    pub max_travel: f64,
    pub tie_break: TieBreak,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_size: 2.0,
            max_size: 65.0,
            min_travel: 5.0,
            max_travel: 130.0,
            tie_break: TieBreak::First,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        let finite = [self.min_size, self.max_size, self.min_travel, self.max_travel]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(UmpireError::config("filter bounds must be finite"));
        }
        if self.min_size > self.max_size {
            return Err(UmpireError::config(format!(
                "size band is empty: [{}, {}]",
                self.min_size, self.max_size
            )));
        }
        if self.min_travel < 0.0 || self.min_travel >= self.max_travel {
            return Err(UmpireError::config(format!(
                "travel band is empty: ({}, {})",
                self.min_travel, self.max_travel
            )));
        }
        Ok(())
    }

    fn in_size_band(&self, c: &Candidate) -> bool {
        !c.is_sentinel() && self.min_size <= c.size && c.size <= self.max_size
    }

    fn in_travel_band(&self, d: f64) -> bool {
        self.min_travel < d && d < self.max_travel
    }
}

impl TieBreak {
    fn choose(&self, accepted: &[Candidate], previous: Option<&Candidate>) -> Candidate {
        match (self, previous) {
            (TieBreak::Largest, _) => first_best(accepted, |c| -c.size),
            (TieBreak::NearestPrevious, Some(p)) => first_best(accepted, |c| c.distance(p)),
            _ => accepted[0],
        }
    }
}

/// Candidate minimising `key`; the earliest wins on ties. `cands` is non-empty.
fn first_best(cands: &[Candidate], key: impl Fn(&Candidate) -> f64) -> Candidate {
    cands
        .iter()
        .copied()
        .reduce(|best, c| if key(&c) < key(&best) { c } else { best })
        .unwrap_or(cands[0])
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Result of filtering a whole candidate stream.
#[derive(Clone, Debug, Default)]
pub struct FilterReport {
    /// One detection per frame from the first successfully filtered frame on
    pub detections: Vec<Detection>,
    /// Per-frame data errors absorbed while filtering
    pub errors: Vec<(FrameIndex, UmpireError)>,
}

/// Stateful, strictly sequential candidate filter.
#[derive(Clone, Debug)]
pub struct CandidateFilter {
    config: FilterConfig,
    initial: (f64, f64),
    previous: Option<Vec<Candidate>>,
    last_detection: Option<Detection>,
    next_frame: usize,
}

impl CandidateFilter {
    pub fn new(config: FilterConfig, initial_position: (f64, f64)) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            initial: initial_position,
            previous: None,
            last_detection: None,
            next_frame: 0,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Candidates accepted in the last successfully filtered frame.
    pub fn accepted(&self) -> Option<&[Candidate]> {
        self.previous.as_deref()
    }

    pub fn last_detection(&self) -> Option<&Detection> {
        self.last_detection.as_ref()
    }

    /// Index the next pushed frame will receive.
    pub fn next_frame(&self) -> FrameIndex {
        FrameIndex(self.next_frame)
    }

    /// Filter the next frame's candidates.
    pub fn push(&mut self, candidates: &[Candidate]) -> Result<Detection> {
        let frame = FrameIndex(self.next_frame);
        self.next_frame += 1;

        let mut survivors: Vec<Candidate> = Vec::with_capacity(candidates.len());
        for c in candidates.iter().filter(|c| self.config.in_size_band(c)) {
            if !survivors.contains(c) {
                survivors.push(*c);
            }
        }
        if survivors.is_empty() {
            return Err(UmpireError::data(format!(
                "{frame}: no candidate within size band [{}, {}]",
                self.config.min_size, self.config.max_size
            )));
        }

        let (accepted, source) = match &self.previous {
            None => {
                let (x0, y0) = self.initial;
                (vec![nearest(&survivors, x0, y0)], DetectionSource::Bootstrap)
            }
            Some(prev) => {
                let moved: Vec<Candidate> = survivors
                    .iter()
                    .filter(|c| !prev.contains(c))
                    .filter(|c| prev.iter().any(|p| self.config.in_travel_band(c.distance(p))))
                    .copied()
                    .collect();
                if moved.is_empty() {
                    let n = prev.len() as f64;
                    let cx = prev.iter().map(|p| p.x).sum::<f64>() / n;
                    let cy = prev.iter().map(|p| p.y).sum::<f64>() / n;
                    debug!("{frame}: no candidate within travel band, falling back to centroid");
                    (
                        vec![nearest(&survivors, cx, cy)],
                        DetectionSource::CentroidFallback,
                    )
                } else {
                    (moved, DetectionSource::Motion)
                }
            }
        };

        let chosen = self
            .config
            .tie_break
            .choose(&accepted, self.last_detection.as_ref().map(|d| &d.candidate));
        let detection = Detection {
            frame,
            candidate: chosen,
            source,
        };
        self.previous = Some(accepted);
        self.last_detection = Some(detection);
        Ok(detection)
    }

    /// Filter a whole stream. Frames that fail with a data error repeat the
    /// previous detection (`CarriedForward`); failures before the first
    /// accepted frame produce no detection.
    pub fn run(&mut self, frames: &[Vec<Candidate>]) -> FilterReport {
        let mut report = FilterReport::default();
        for candidates in frames {
            match self.push(candidates) {
                Ok(d) => report.detections.push(d),
                Err(e) => {
                    let frame = FrameIndex(self.next_frame - 1);
                    warn!("candidate filter: {e}");
                    if let Some(last) = self.last_detection {
                        report.detections.push(Detection {
                            frame,
                            candidate: last.candidate,
                            source: DetectionSource::CarriedForward,
                        });
                    }
                    report.errors.push((frame, e));
                }
            }
        }
        report
    }
}

fn nearest(cands: &[Candidate], x: f64, y: f64) -> Candidate {
    first_best(cands, |c| c.distance_to(x, y))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
