use crate::recorder::RecorderError;
use cvep_core::{CodeBankError, LayoutError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that stop a session. Construction errors surface before any frame
/// is drawn; a lost recorder stops a running session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("code bank: {0}")]
    CodeBank(#[from] CodeBankError),
    #[error("layout: {0}")]
    Layout(#[from] LayoutError),
    #[error("recorder: {0}")]
    Recorder(#[from] RecorderError),
    #[error("no display refresh rate available and none configured")]
    ClockUnavailable,
}
