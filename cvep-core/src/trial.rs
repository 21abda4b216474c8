use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrialOutcome {
    Completed,
    Aborted,
    Abandoned,
}

/// Archived trial, written out once its markers have been emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub run: usize,
    pub trial: usize,
    pub target: usize,
    pub label: String,
    pub cue_onset_ns: u64,
    pub stim_onset_ns: Option<u64>,
    pub stim_offset_ns: Option<u64>,
    pub end_ns: u64,
    pub outcome: TrialOutcome,
}
