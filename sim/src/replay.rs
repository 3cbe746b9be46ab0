//! Replay: serialize/deserialize rally logs for offline classification.

use crate::scenarios::{RallyKind, RallyScenario};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A recorded rally: what the estimator sees plus what really happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    pub scenario_name: String,
    pub seed: u64,
    pub fps: f64,
    /// World-space measurements (m), one per frame
    pub measurements: Vec<[f64; 3]>,
    /// True ball positions (m), one per frame
    pub ground_truth: Vec<[f64; 3]>,
    /// Known outcome, when the log comes from a synthetic scenario
    pub expected_kind: Option<RallyKind>,
}

impl ReplayLog {
    pub fn from_scenario(s: &RallyScenario) -> Self {
        Self {
            scenario_name: s.name.clone(),
            seed: s.seed,
            fps: s.fps,
            measurements: s.measurements(),
            ground_truth: s.ground_truth(),
            expected_kind: Some(s.kind),
        }
    }
}

/// Save a replay log to a JSON file.
pub fn save_replay(log: &ReplayLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a replay log from a JSON file.
pub fn load_replay(path: &Path) -> anyhow::Result<ReplayLog> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let log: ReplayLog = serde_json::from_reader(reader)?;
    if log.measurements.is_empty() {
        anyhow::bail!("replay {} has no measurements", path.display());
    }
    Ok(log)
}
