use crate::error::ParseCodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binary stimulation sequence. One entry per presentation slot, `true` is "on".
///
/// Serialized as a bit string such as `"0110100"` so code tables stay readable
/// in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code {
    bits: Vec<bool>,
}

impl Code {
    /// Returns `None` for an empty sequence.
    pub fn from_bits(bits: Vec<bool>) -> Option<Self> {
        if bits.is_empty() {
            None
        } else {
            Some(Self { bits })
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Bit at slot `index`, wrapping around the code period.
    pub fn bit(&self, index: usize) -> bool {
        self.bits[index % self.bits.len()]
    }

    pub fn ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Circular left shift by `lag` slots.
    pub fn rotated(&self, lag: usize) -> Self {
        let mut bits = self.bits.clone();
        let len = bits.len();
        bits.rotate_left(lag % len);
        Self { bits }
    }

    /// Element-wise XOR; both codes must have the same length.
    pub fn xor(&self, other: &Code) -> Self {
        debug_assert_eq!(self.len(), other.len());
        Self {
            bits: self
                .bits
                .iter()
                .zip(&other.bits)
                .map(|(a, b)| a ^ b)
                .collect(),
        }
    }

    /// Zero-lag normalized correlation of the bipolar (+1/-1) forms.
    ///
    /// 1.0 for identical codes, -1.0 for complements. Codes of different
    /// length are compared over the shorter one.
    pub fn correlation(&self, other: &Code) -> f64 {
        let n = self.len().min(other.len());
        let agree = self
            .bits
            .iter()
            .zip(&other.bits)
            .filter(|(a, b)| a == b)
            .count() as i64;
        let score = 2 * agree - n as i64;
        score as f64 / n as f64
    }

    #[cfg(test)]
    pub(crate) fn circular_correlation(&self, other: &Code, lag: usize) -> f64 {
        self.correlation(&other.rotated(lag))
    }
}

impl FromStr for Code {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                _ => Err(ParseCodeError {
                    input: s.to_string(),
                    reason: "only 0 and 1 are allowed",
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Code::from_bits(bits).ok_or_else(|| ParseCodeError {
            input: s.to_string(),
            reason: "empty code",
        })
    }
}

impl TryFrom<String> for Code {
    type Error = ParseCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.to_string()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.bits {
            f.write_str(if b { "1" } else { "0" })?;
        }
        Ok(())
    }
}
