pub mod drift;
pub mod timer;

pub use drift::{DriftMonitor, TimingDrift};
pub use timer::{CalibrationStats, HighPrecisionTimer, ManualTimer, Timer};
