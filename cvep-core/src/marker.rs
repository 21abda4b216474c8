use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

/// Lifecycle transition recorded alongside the EEG stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerKind {
    /// Session parameters as `key=value` pairs.
    Settings(Vec<(String, String)>),
    RunStart { run: usize },
    CueOnset {
        trial: usize,
        target: usize,
        key: String,
    },
    StimOnset { trial: usize },
    StimOffset { trial: usize },
    RunEnd { run: usize },
    TrialAbandoned { trial: usize },
    Abort,
}

impl MarkerKind {
    pub fn name(&self) -> &'static str {
        match self {
            MarkerKind::Settings(_) => "settings",
            MarkerKind::RunStart { .. } => "run-start",
            MarkerKind::CueOnset { .. } => "cue-onset",
            MarkerKind::StimOnset { .. } => "stim-onset",
            MarkerKind::StimOffset { .. } => "stim-offset",
            MarkerKind::RunEnd { .. } => "run-end",
            MarkerKind::TrialAbandoned { .. } => "trial-abandoned",
            MarkerKind::Abort => "abort",
        }
    }

    /// Markers that belong to a running trial.
    pub fn is_trial_marker(&self) -> bool {
        matches!(
            self,
            MarkerKind::CueOnset { .. }
                | MarkerKind::StimOnset { .. }
                | MarkerKind::StimOffset { .. }
        )
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            MarkerKind::Settings(pairs) => {
                for (k, v) in pairs {
                    write!(f, ";{k}={v}")?;
                }
                Ok(())
            }
            MarkerKind::RunStart { run } | MarkerKind::RunEnd { run } => write!(f, ";run={run}"),
            MarkerKind::CueOnset { trial, target, key } => {
                write!(f, ";trial={trial};target={target};key={key}")
            }
            MarkerKind::StimOnset { trial }
            | MarkerKind::StimOffset { trial }
            | MarkerKind::TrialAbandoned { trial } => write!(f, ";trial={trial}"),
            MarkerKind::Abort => Ok(()),
        }
    }
}

/// A labelled, timestamped marker. Never mutated after emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerEvent {
    pub kind: MarkerKind,
    pub timestamp_ns: u64,
}

impl MarkerEvent {
    pub fn new(kind: MarkerKind, timestamp_ns: u64) -> Self {
        Self { kind, timestamp_ns }
    }

    pub fn label(&self) -> String {
        self.kind.to_string()
    }
}

impl Serialize for MarkerEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("MarkerEvent", 2)?;
        s.serialize_field("label", &self.label())?;
        s.serialize_field("timestamp_ns", &self.timestamp_ns)?;
        s.end()
    }
}
