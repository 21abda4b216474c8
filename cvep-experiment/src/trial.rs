use crate::config::TimingConfig;
use crate::error::ConfigError;
use crate::stimulation::{FrameSchedule, frames_for};
use cvep_core::{Symbol, TrialOutcome, TrialRecord};
use std::time::Duration;

/// Phase lengths of every trial, in display refreshes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialTiming {
    pub frame_rate: f64,
    pub frame_period: Duration,
    pub cue_frames: usize,
    pub stimulation: FrameSchedule,
    pub inter_trial_frames: usize,
    pub drift_tolerance: Duration,
}

impl TrialTiming {
    pub fn new(config: &TimingConfig, frame_rate: f64) -> Result<Self, ConfigError> {
        if !(frame_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "frame rate {frame_rate} must be positive"
            )));
        }
        let stimulation =
            FrameSchedule::from_rates(frame_rate, config.presentation_rate, config.stimulation_s)?;
        let cue_frames = frames_for(config.cue_s, frame_rate);
        if cue_frames == 0 || stimulation.total_frames() == 0 {
            return Err(ConfigError::Invalid(format!(
                "cue and stimulation must last at least one frame at {frame_rate} Hz"
            )));
        }
        let frame_period = seconds(1.0 / frame_rate, "frame period")?;
        let drift_tolerance = match config.drift_tolerance_ms {
            Some(ms) => seconds(ms / 1000.0, "drift tolerance")?,
            None => frame_period / 2,
        };
        Ok(Self {
            frame_rate,
            frame_period,
            cue_frames,
            stimulation,
            inter_trial_frames: frames_for(config.inter_trial_s, frame_rate),
            drift_tolerance,
        })
    }

    pub fn frames_per_trial(&self) -> usize {
        self.cue_frames + self.stimulation.total_frames() + self.inter_trial_frames
    }

    /// Length of one run cueing every symbol once, in seconds.
    pub fn run_seconds(&self, symbols: usize) -> f64 {
        (self.frames_per_trial() * symbols) as f64 / self.frame_rate
    }
}

fn seconds(value: f64, what: &str) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| ConfigError::Invalid(format!("{what} of {value} s is out of range")))
}

/// The trial currently on screen. Archived as a `TrialRecord` once it ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTrial {
    pub run: usize,
    pub number: usize,
    pub target: usize,
    pub label: String,
    pub cue_onset_ns: u64,
    pub stim_onset_ns: Option<u64>,
    pub stim_offset_ns: Option<u64>,
    /// Frames shown in the current phase.
    pub frames: usize,
}

impl ActiveTrial {
    pub fn new(run: usize, number: usize, symbol: &Symbol, cue_onset_ns: u64) -> Self {
        Self {
            run,
            number,
            target: symbol.index,
            label: symbol.label.clone(),
            cue_onset_ns,
            stim_onset_ns: None,
            stim_offset_ns: None,
            frames: 0,
        }
    }

    pub fn into_record(self, outcome: TrialOutcome, end_ns: u64) -> TrialRecord {
        TrialRecord {
            run: self.run,
            trial: self.number,
            target: self.target,
            label: self.label,
            cue_onset_ns: self.cue_onset_ns,
            stim_onset_ns: self.stim_onset_ns,
            stim_offset_ns: self.stim_offset_ns,
            end_ns,
            outcome,
        }
    }
}
