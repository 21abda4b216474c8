pub mod code;
pub mod codebank;
pub mod error;
pub mod grid;
pub mod layout;
pub mod marker;
pub mod phase;
pub mod symbol;
pub mod trial;

pub use code::Code;
pub use codebank::{CodeBank, CodeFamily};
pub use error::{CodeBankError, LayoutError, ParseCodeError};
pub use grid::{GridPreset, KeyGeometry, Monitor};
pub use layout::Layout;
pub use marker::{MarkerEvent, MarkerKind};
pub use phase::{StatusMessage, TrialPhase, VisualState};
pub use symbol::{Position, Symbol};
pub use trial::{TrialOutcome, TrialRecord};
