use crate::code::Code;
use crate::error::CodeBankError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Feedback taps of one primitive polynomial per LFSR degree.
const PRIMITIVE_TAPS: &[(u32, &[u32])] = &[
    (3, &[3, 2]),
    (4, &[4, 3]),
    (5, &[5, 3]),
    (6, &[6, 5]),
    (7, &[7, 6]),
    (8, &[8, 6, 5, 4]),
    (9, &[9, 5]),
    (10, &[10, 7]),
];

/// Preferred pairs of m-sequence generators for Gold families.
const PREFERRED_PAIRS: &[(u32, &[u32], &[u32])] = &[
    (5, &[5, 2], &[5, 4, 3, 2]),
    (6, &[6, 1], &[6, 5, 2, 1]),
    (7, &[7, 3], &[7, 3, 2, 1]),
    (9, &[9, 4], &[9, 6, 4, 3]),
    (10, &[10, 3], &[10, 8, 3, 2]),
];

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Where the candidate codes come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "kebab-case")]
pub enum CodeFamily {
    /// Circular shifts of a single m-sequence.
    ShiftedMSequence {
        degree: u32,
        #[serde(default)]
        lag_stride: Option<usize>,
    },
    /// Gold codes modulated with a double-frequency bit clock.
    ModulatedGold { degree: u32 },
    /// Codes given verbatim.
    Table { codes: Vec<Code> },
}

impl Default for CodeFamily {
    fn default() -> Self {
        CodeFamily::ShiftedMSequence {
            degree: 6,
            lag_stride: None,
        }
    }
}

impl CodeFamily {
    pub fn name(&self) -> &'static str {
        match self {
            CodeFamily::ShiftedMSequence { .. } => "shifted m-sequence",
            CodeFamily::ModulatedGold { .. } => "modulated gold codes",
            CodeFamily::Table { .. } => "code table",
        }
    }

    /// Code length the family produces, if it has one.
    pub fn natural_length(&self) -> Option<usize> {
        match self {
            CodeFamily::ShiftedMSequence { degree, .. } => Some(period(*degree)),
            CodeFamily::ModulatedGold { degree } => Some(2 * period(*degree)),
            CodeFamily::Table { codes } => codes.first().map(Code::len),
        }
    }
}

/// Immutable set of codes, one per symbol, with bounded pairwise correlation.
#[derive(Debug, Clone)]
pub struct CodeBank {
    codes: Vec<Arc<Code>>,
    threshold: f64,
    family: &'static str,
}

impl CodeBank {
    /// Picks `count` codes of `length` from `family` whose pairwise zero-lag
    /// correlation magnitude stays at or below `threshold`.
    ///
    /// Candidates are accepted greedily in generation order, so the same
    /// request always yields the same bank.
    pub fn build(
        family: &CodeFamily,
        count: usize,
        length: usize,
        threshold: f64,
    ) -> Result<Self, CodeBankError> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(CodeBankError::InvalidThreshold(threshold));
        }
        let candidates = match family {
            CodeFamily::ShiftedMSequence { degree, lag_stride } => {
                let base = m_sequence(*degree)?;
                check_length(family, length, base.len())?;
                shifted(&base, count, *lag_stride)
            }
            CodeFamily::ModulatedGold { degree } => {
                let codes = gold_codes(*degree)?;
                check_length(family, length, 2 * period(*degree))?;
                codes.iter().map(modulate).collect()
            }
            CodeFamily::Table { codes } => {
                for (index, code) in codes.iter().enumerate() {
                    if code.len() != length {
                        return Err(CodeBankError::InvalidTable {
                            index,
                            reason: format!("length {} but {} requested", code.len(), length),
                        });
                    }
                }
                codes.clone()
            }
        };

        let codes = select(candidates, count, threshold, length)?;
        Ok(Self {
            codes: codes.into_iter().map(Arc::new).collect(),
            threshold,
            family: family.name(),
        })
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Code>> {
        self.codes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Code>> {
        self.codes.iter()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn code_length(&self) -> usize {
        self.codes.first().map_or(0, |c| c.len())
    }

    /// Largest pairwise |correlation| in the bank.
    pub fn max_abs_correlation(&self) -> f64 {
        let mut max = 0.0f64;
        for (i, a) in self.codes.iter().enumerate() {
            for b in &self.codes[i + 1..] {
                max = max.max(a.correlation(b).abs());
            }
        }
        max
    }
}

fn period(degree: u32) -> usize {
    (1usize << degree) - 1
}

fn check_length(
    family: &CodeFamily,
    requested: usize,
    natural: usize,
) -> Result<(), CodeBankError> {
    if requested != natural {
        return Err(CodeBankError::InvalidLength {
            family: family.name(),
            requested,
            natural,
        });
    }
    Ok(())
}

fn select(
    candidates: Vec<Code>,
    count: usize,
    threshold: f64,
    length: usize,
) -> Result<Vec<Code>, CodeBankError> {
    let mut accepted: Vec<Code> = Vec::with_capacity(count);
    for candidate in candidates {
        if accepted.len() == count {
            break;
        }
        let fits = accepted
            .iter()
            .all(|a| *a != candidate && a.correlation(&candidate).abs() <= threshold);
        if fits {
            accepted.push(candidate);
        }
    }
    if accepted.len() < count {
        return Err(CodeBankError::InsufficientCodes {
            requested: count,
            available: accepted.len(),
            length,
        });
    }
    Ok(accepted)
}

/// Output of a Fibonacci LFSR over one full period, seeded with all ones.
fn lfsr(degree: u32, taps: &[u32]) -> Code {
    let n = degree as usize;
    let mut state = vec![true; n];
    let bits = (0..period(degree))
        .map(|_| {
            let out = state[n - 1];
            let feedback = taps
                .iter()
                .fold(false, |acc, &t| acc ^ state[t as usize - 1]);
            state.rotate_right(1);
            state[0] = feedback;
            out
        })
        .collect();
    // period >= 7 for every supported degree
    Code::from_bits(bits).expect("non-empty period")
}

/// Maximal-length sequence of period 2^degree - 1.
pub fn m_sequence(degree: u32) -> Result<Code, CodeBankError> {
    PRIMITIVE_TAPS
        .iter()
        .find(|(d, _)| *d == degree)
        .map(|(d, taps)| lfsr(*d, taps))
        .ok_or(CodeBankError::UnsupportedDegree {
            family: "m-sequence",
            degree,
        })
}

/// Gold family: both generators plus every XOR of the first with a shift of the second.
pub fn gold_codes(degree: u32) -> Result<Vec<Code>, CodeBankError> {
    let (_, taps_a, taps_b) = PREFERRED_PAIRS
        .iter()
        .find(|(d, _, _)| *d == degree)
        .ok_or(CodeBankError::UnsupportedDegree {
            family: "gold",
            degree,
        })?;
    let a = lfsr(degree, taps_a);
    let b = lfsr(degree, taps_b);
    let mut codes = Vec::with_capacity(period(degree) + 2);
    codes.push(a.clone());
    codes.push(b.clone());
    codes.extend((0..period(degree)).map(|lag| a.xor(&b.rotated(lag))));
    Ok(codes)
}

/// Holds each bit for two slots and XORs with a `0101...` clock.
pub fn modulate(code: &Code) -> Code {
    let bits = code.bits().iter().flat_map(|&b| [b, !b]).collect();
    Code::from_bits(bits).expect("modulating a non-empty code")
}

fn shifted(base: &Code, count: usize, lag_stride: Option<usize>) -> Vec<Code> {
    let period = base.len();
    // Widest spacing that still leaves `count` distinct lags.
    let stride = lag_stride
        .unwrap_or_else(|| (period - 1) / count.saturating_sub(1).max(1))
        .max(1);
    (0..period)
        .step_by(stride)
        .map(|lag| base.rotated(lag))
        .collect()
}
