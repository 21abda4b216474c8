use crate::symbol::Position;
use serde::{Deserialize, Serialize};

const MATRIX_KEYS: &[&[&str]] = &[
    &["A", "B", "C", "D", "E", "F", "G", "H"],
    &["I", "J", "K", "L", "M", "N", "O", "P"],
    &["Q", "R", "S", "T", "U", "V", "W", "X"],
    &["Y", "Z", "1", "2", "3", "4", "5", "6"],
];

const QWERTY_KEYS: &[&[&str]] = &[
    &[
        "!", "@", "#", "$", "%", "^", "&", "asterisk", "(", ")", "_", "=", "backspace",
    ],
    &["Q", "W", "E", "R", "T", "Y", "U", "I", "O", "P", "{", "}"],
    &[
        "shift", "A", "S", "D", "F", "G", "H", "J", "K", "L", "colon", "quote", "bar",
    ],
    &[
        "tilde", "Z", "X", "C", "V", "B", "N", "M", "smaller", "larger", "question",
    ],
    &["clear", "space", "autocomplete", "speaker"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GridPreset {
    #[default]
    Matrix,
    Qwerty,
}

impl GridPreset {
    pub fn rows(&self) -> &'static [&'static [&'static str]] {
        match self {
            GridPreset::Matrix => MATRIX_KEYS,
            GridPreset::Qwerty => QWERTY_KEYS,
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.rows()
            .iter()
            .flat_map(|row| row.iter().map(|k| k.to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows().iter().map(|r| r.len()).sum()
    }

    /// Row-major key centres. QWERTY rows are staggered like a keyboard.
    pub fn positions(&self, geometry: &KeyGeometry, monitor: &Monitor) -> Vec<Position> {
        let ppd = monitor.pixels_per_degree();
        let rows = self.rows();
        let step_x = (geometry.key_width_deg + geometry.key_space_deg) * ppd;
        let step_y = (geometry.key_height_deg + geometry.key_space_deg) * ppd;
        let text_field = geometry.text_field_height_deg * ppd;
        let n_rows = rows.len() as f64;

        let mut out = Vec::with_capacity(self.len());
        for (y, row) in rows.iter().enumerate() {
            let n_cols = row.len() as f64;
            for x in 0..row.len() {
                let mut px = ((x as f64 - n_cols / 2.0 + 0.5) * step_x) as i32;
                let py = (-(y as f64 - n_rows / 2.0) * step_y - text_field) as i32;
                if *self == GridPreset::Qwerty {
                    match y {
                        0 | 1 => px += (0.25 * geometry.key_width_deg * ppd) as i32,
                        3 | 4 => px -= (0.5 * geometry.key_width_deg * ppd) as i32,
                        _ => {}
                    }
                }
                out.push(Position::new(px, py));
            }
        }
        out
    }
}

/// Key sizes in degrees of visual angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyGeometry {
    pub key_width_deg: f64,
    pub key_height_deg: f64,
    pub key_space_deg: f64,
    pub text_field_height_deg: f64,
}

impl Default for KeyGeometry {
    fn default() -> Self {
        Self {
            key_width_deg: 2.5,
            key_height_deg: 2.5,
            key_space_deg: 0.5,
            text_field_height_deg: 3.0,
        }
    }
}

impl KeyGeometry {
    pub fn key_size_px(&self, monitor: &Monitor) -> (u32, u32) {
        let ppd = monitor.pixels_per_degree();
        (
            (self.key_width_deg * ppd) as u32,
            (self.key_height_deg * ppd) as u32,
        )
    }
}

/// Physical display used to convert visual angle to pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    pub resolution: (u32, u32),
    pub width_cm: f64,
    pub distance_cm: f64,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            resolution: (1920, 1080),
            width_cm: 53.5,
            distance_cm: 100.0,
        }
    }
}

impl Monitor {
    pub fn pixels_per_degree(&self) -> f64 {
        let cm_per_degree = self.distance_cm * 1f64.to_radians().tan();
        cm_per_degree * self.resolution.0 as f64 / self.width_cm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn presets_have_expected_sizes() {
        assert_eq!(GridPreset::Matrix.len(), 32);
        assert_eq!(GridPreset::Qwerty.len(), 53);
        assert_eq!(GridPreset::Matrix.labels()[26], "1");
    }

    #[test]
    fn pixels_per_degree_of_default_monitor() {
        let ppd = Monitor::default().pixels_per_degree();
        // 100 cm at 1920 px over 53.5 cm
        assert!((ppd - 62.64).abs() < 0.05, "{ppd}");
    }

    #[test]
    fn grid_positions_are_distinct_and_centred() {
        for preset in [GridPreset::Matrix, GridPreset::Qwerty] {
            let positions = preset.positions(&KeyGeometry::default(), &Monitor::default());
            assert_eq!(positions.len(), preset.len());
            let unique: HashSet<_> = positions.iter().collect();
            assert_eq!(unique.len(), positions.len());
        }
        let matrix = GridPreset::Matrix.positions(&KeyGeometry::default(), &Monitor::default());
        // first row mirrors around the vertical axis
        assert_eq!(matrix[0].x, -matrix[7].x);
        assert!(matrix[0].y > matrix[8].y);
    }
}
