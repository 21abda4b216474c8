use thiserror::Error;

/// Failures while assembling the code bank.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodeBankError {
    #[error(
        "only {available} codes of length {length} satisfy the correlation bound, {requested} requested"
    )]
    InsufficientCodes {
        requested: usize,
        available: usize,
        length: usize,
    },
    #[error("code length {requested} does not match the {family} period {natural}")]
    InvalidLength {
        family: &'static str,
        requested: usize,
        natural: usize,
    },
    #[error("no {family} generator for degree {degree}")]
    UnsupportedDegree { family: &'static str, degree: u32 },
    #[error("correlation threshold {0} outside (0, 1]")]
    InvalidThreshold(f64),
    #[error("code table entry {index}: {reason}")]
    InvalidTable { index: usize, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layout needs at least one symbol")]
    Empty,
    #[error("{positions} positions but {codes} codes")]
    LayoutMismatch { positions: usize, codes: usize },
    #[error("{labels} labels but {positions} positions")]
    LabelMismatch { labels: usize, positions: usize },
    #[error("symbols {first} and {second} share a code")]
    DuplicateCode { first: usize, second: usize },
    #[error("symbols {first} and {second} share a position")]
    DuplicatePosition { first: usize, second: usize },
    #[error("symbols {first} and {second} share the label {label:?}")]
    DuplicateLabel {
        first: usize,
        second: usize,
        label: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid code {input:?}: {reason}")]
pub struct ParseCodeError {
    pub input: String,
    pub reason: &'static str,
}
