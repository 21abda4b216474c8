use crate::codebank::CodeBank;
use crate::error::LayoutError;
use crate::symbol::{Position, Symbol};
use std::collections::HashMap;

/// Static symbol-to-code assignment for a session.
///
/// Built once and shared read-only; codes are held by reference into the bank.
#[derive(Debug, Clone)]
pub struct Layout {
    symbols: Vec<Symbol>,
}

impl Layout {
    /// Assigns `codes[i]` to the symbol at `positions[i]`, in the order given.
    pub fn new(
        labels: Vec<String>,
        positions: Vec<Position>,
        codes: &CodeBank,
    ) -> Result<Self, LayoutError> {
        if positions.is_empty() {
            return Err(LayoutError::Empty);
        }
        if positions.len() != codes.len() {
            return Err(LayoutError::LayoutMismatch {
                positions: positions.len(),
                codes: codes.len(),
            });
        }
        if labels.len() != positions.len() {
            return Err(LayoutError::LabelMismatch {
                labels: labels.len(),
                positions: positions.len(),
            });
        }

        let symbols: Vec<Symbol> = labels
            .into_iter()
            .zip(positions)
            .zip(codes.iter())
            .enumerate()
            .map(|(index, ((label, position), code))| Symbol {
                index,
                label,
                position,
                code: code.clone(),
            })
            .collect();

        let mut seen_pos = HashMap::new();
        let mut seen_code = HashMap::new();
        let mut seen_label = HashMap::new();
        for s in &symbols {
            if let Some(&first) = seen_pos.get(&s.position) {
                return Err(LayoutError::DuplicatePosition {
                    first,
                    second: s.index,
                });
            }
            if let Some(&first) = seen_code.get(s.code.as_ref()) {
                return Err(LayoutError::DuplicateCode {
                    first,
                    second: s.index,
                });
            }
            if let Some(&first) = seen_label.get(s.label.as_str()) {
                return Err(LayoutError::DuplicateLabel {
                    first,
                    second: s.index,
                    label: s.label.clone(),
                });
            }
            seen_pos.insert(s.position, s.index);
            seen_code.insert(s.code.as_ref(), s.index);
            seen_label.insert(s.label.as_str(), s.index);
        }

        Ok(Self { symbols })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    pub fn find(&self, label: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.label == label)
    }

    pub fn code_length(&self) -> usize {
        self.symbols.first().map_or(0, |s| s.code.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Code;
    use crate::codebank::{CodeFamily, DEFAULT_THRESHOLD};
    use crate::grid::{GridPreset, KeyGeometry, Monitor};
    use std::collections::HashSet;

    fn table(codes: &[&str]) -> CodeBank {
        let codes: Vec<Code> = codes.iter().map(|s| s.parse().unwrap()).collect();
        let len = codes[0].len();
        let n = codes.len();
        CodeBank::build(&CodeFamily::Table { codes }, n, len, 1.0).unwrap()
    }

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("S{i}")).collect()
    }

    #[test]
    fn assignment_follows_caller_order() {
        let bank = table(&["0011", "0101", "0110"]);
        let positions = vec![Position::new(0, 0), Position::new(10, 0), Position::new(20, 0)];
        let layout = Layout::new(labels(3), positions, &bank).unwrap();
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.symbol(2).unwrap().code.to_string(), "0110");
        assert_eq!(layout.symbol(1).unwrap().position, Position::new(10, 0));
        assert_eq!(layout.find("S1").unwrap().index, 1);
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let bank = table(&["0011", "0101"]);
        let positions = vec![Position::new(0, 0); 3];
        assert_eq!(
            Layout::new(labels(3), positions, &bank).unwrap_err(),
            LayoutError::LayoutMismatch {
                positions: 3,
                codes: 2
            }
        );
    }

    #[test]
    fn overlapping_positions_are_rejected() {
        let bank = table(&["0011", "0101"]);
        let positions = vec![Position::new(5, 5), Position::new(5, 5)];
        assert_eq!(
            Layout::new(labels(2), positions, &bank).unwrap_err(),
            LayoutError::DuplicatePosition {
                first: 0,
                second: 1
            }
        );
    }

    #[test]
    fn speller_layouts_have_unique_codes_and_positions() {
        let monitor = Monitor::default();
        let geometry = KeyGeometry::default();
        for (preset, family, length) in [
            (GridPreset::Matrix, CodeFamily::default(), 63),
            (
                GridPreset::Qwerty,
                CodeFamily::ModulatedGold { degree: 6 },
                126,
            ),
        ] {
            let bank = CodeBank::build(&family, preset.len(), length, DEFAULT_THRESHOLD).unwrap();
            let layout =
                Layout::new(preset.labels(), preset.positions(&geometry, &monitor), &bank).unwrap();
            let codes: HashSet<_> = layout.symbols().iter().map(|s| s.code.clone()).collect();
            let positions: HashSet<_> = layout.symbols().iter().map(|s| s.position).collect();
            assert_eq!(codes.len(), layout.len());
            assert_eq!(positions.len(), layout.len());
        }
    }
}
