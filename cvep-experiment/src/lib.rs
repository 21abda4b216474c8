pub mod config;
pub mod error;
pub mod input;
pub mod lab_recorder;
#[cfg(feature = "lsl")]
pub mod lsl_outlet;
pub mod recorder;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod stimulation;
pub mod trial;

pub use config::{
    CodeConfig, GridConfig, GridLayout, KeyConfig, MarkerOutput, RecorderConfig,
    RemoteControlConfig, SessionInfo, SpellerConfig, TimingConfig,
};
pub use error::{ConfigError, SessionError};
pub use input::{InputController, InputSignal, KeyAction};
pub use lab_recorder::LabRecorder;
#[cfg(feature = "lsl")]
pub use lsl_outlet::LslOutlet;
pub use recorder::{JsonLinesRecorder, MarkerEmitter, MarkerSink, MemoryRecorder, RecorderError};
pub use scheduler::{Run, TrialScheduler};
pub use session::{Session, build_layout, build_session};
pub use state::{SpellerStateMachine, TickStatus};
pub use stimulation::{FrameSchedule, StimulationClock};
pub use trial::{ActiveTrial, TrialTiming};
