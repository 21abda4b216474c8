use crate::error::ConfigError;
use cvep_core::{Code, VisualState};
use std::sync::Arc;

/// Frame-level timing of a stimulation window: how long each code bit is held
/// and how many refreshes the window lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchedule {
    frames_per_bit: usize,
    total_frames: usize,
}

impl FrameSchedule {
    pub fn new(frames_per_bit: usize, total_frames: usize) -> Self {
        Self {
            frames_per_bit: frames_per_bit.max(1),
            total_frames,
        }
    }

    /// The refresh rate must be a whole multiple of the presentation rate.
    pub fn from_rates(
        frame_rate: f64,
        presentation_rate: f64,
        duration_s: f64,
    ) -> Result<Self, ConfigError> {
        let ratio = frame_rate / presentation_rate;
        let frames_per_bit = ratio.round();
        if frames_per_bit < 1.0 || (ratio - frames_per_bit).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "frame rate {frame_rate} Hz is not a multiple of the presentation rate {presentation_rate} Hz"
            )));
        }
        Ok(Self::new(
            frames_per_bit as usize,
            frames_for(duration_s, frame_rate),
        ))
    }

    pub fn frames_per_bit(&self) -> usize {
        self.frames_per_bit
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn clock(&self, code: Arc<Code>) -> StimulationClock {
        StimulationClock {
            code,
            schedule: *self,
            frame: 0,
        }
    }
}

/// Refresh count covering `duration_s`.
pub fn frames_for(duration_s: f64, frame_rate: f64) -> usize {
    (duration_s * frame_rate).round() as usize
}

/// Per-refresh on/off states of one code, wrapping the code when the window
/// is longer than a period.
///
/// The output is the intended sequence; a late display does not skip bits.
#[derive(Debug, Clone)]
pub struct StimulationClock {
    code: Arc<Code>,
    schedule: FrameSchedule,
    frame: usize,
}

impl StimulationClock {
    pub fn bit_index(&self, frame: usize) -> usize {
        (frame / self.schedule.frames_per_bit) % self.code.len()
    }

    pub fn state_at(&self, frame: usize) -> VisualState {
        VisualState::from(self.code.bit(self.bit_index(frame)))
    }

    /// Frames delivered so far.
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn is_exhausted(&self) -> bool {
        self.frame >= self.schedule.total_frames
    }

    pub fn restart(&mut self) {
        self.frame = 0;
    }
}

impl Iterator for StimulationClock {
    type Item = VisualState;

    fn next(&mut self) -> Option<VisualState> {
        if self.is_exhausted() {
            return None;
        }
        let state = self.state_at(self.frame);
        self.frame += 1;
        Some(state)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.schedule.total_frames.saturating_sub(self.frame);
        (left, Some(left))
    }
}

impl ExactSizeIterator for StimulationClock {}
