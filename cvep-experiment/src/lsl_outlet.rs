use crate::recorder::{MarkerSink, RecorderError};
use cvep_core::MarkerEvent;
use lsl::Pushable;
use tracing::info;

/// Publishes marker labels as a single-channel irregular-rate string stream,
/// the form LabRecorder picks up next to the EEG.
pub struct LslOutlet {
    outlet: lsl::StreamOutlet,
}

impl LslOutlet {
    /// Announces the stream on the network. `name` doubles as the source id so
    /// a restarted speller is reattached by recorders.
    pub fn open(name: &str) -> Result<Self, RecorderError> {
        let info = lsl::StreamInfo::new(
            name,
            "Markers",
            1,
            lsl::IRREGULAR_RATE,
            lsl::ChannelFormat::String,
            name,
        )
        .map_err(|e| RecorderError::Unavailable(format!("stream info for {name}: {e:?}")))?;
        let outlet = lsl::StreamOutlet::new(&info, 0, 360)
            .map_err(|e| RecorderError::Unavailable(format!("outlet {name}: {e:?}")))?;
        info!(stream = name, "LSL marker outlet open");
        Ok(Self { outlet })
    }
}

impl MarkerSink for LslOutlet {
    fn push(&mut self, event: &MarkerEvent) -> Result<(), RecorderError> {
        self.outlet
            .push_sample(&vec![event.label()])
            .map_err(|e| RecorderError::Dropped(format!("{e:?}")))
    }
}
