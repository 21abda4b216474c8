/// Observable lifecycle state of the trial state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrialPhase {
    #[default]
    Idle,
    Cueing,
    Stimulating,
    InterTrialInterval,
    Aborted,
}

impl TrialPhase {
    pub fn name(&self) -> &'static str {
        match self {
            TrialPhase::Idle => "idle",
            TrialPhase::Cueing => "cueing",
            TrialPhase::Stimulating => "stimulating",
            TrialPhase::InterTrialInterval => "inter-trial",
            TrialPhase::Aborted => "aborted",
        }
    }

    pub fn in_trial(&self) -> bool {
        matches!(
            self,
            TrialPhase::Cueing | TrialPhase::Stimulating | TrialPhase::InterTrialInterval
        )
    }
}

/// Per-key rendering instruction for one frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualState {
    #[default]
    Off = 0,
    On = 1,
    Cue = 2,
}

impl From<bool> for VisualState {
    fn from(bit: bool) -> Self {
        if bit { VisualState::On } else { VisualState::Off }
    }
}

/// Text shown in the field above the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusMessage {
    #[default]
    None,
    WaitingToStart,
    RunComplete,
    Finished,
    Aborted,
}

impl StatusMessage {
    pub const ALL: [StatusMessage; 5] = [
        StatusMessage::None,
        StatusMessage::WaitingToStart,
        StatusMessage::RunComplete,
        StatusMessage::Finished,
        StatusMessage::Aborted,
    ];

    pub fn text(&self) -> &'static str {
        match self {
            StatusMessage::None => "",
            StatusMessage::WaitingToStart => "Waiting to start",
            StatusMessage::RunComplete => "Run complete, press continue",
            StatusMessage::Finished => "Finished",
            StatusMessage::Aborted => "Aborted",
        }
    }
}
