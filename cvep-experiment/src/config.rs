use crate::error::ConfigError;
use cvep_core::codebank::DEFAULT_THRESHOLD;
use cvep_core::{CodeFamily, GridPreset, KeyGeometry, Monitor, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Top-level session parameters. Read once, never mutated while running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellerConfig {
    pub timing: TimingConfig,
    pub codes: CodeConfig,
    pub grid: GridConfig,
    pub keys: KeyConfig,
    pub recorder: RecorderConfig,
    pub session: SessionInfo,
    pub runs: usize,
    pub seed: Option<u64>,
}

impl Default for SpellerConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            codes: CodeConfig::default(),
            grid: GridConfig::default(),
            keys: KeyConfig::default(),
            recorder: RecorderConfig::default(),
            session: SessionInfo::default(),
            runs: 1,
            seed: None,
        }
    }
}

impl SpellerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        self.keys.validate()?;
        if self.runs == 0 {
            return invalid("runs must be at least 1");
        }
        let t = self.codes.threshold;
        if !(t > 0.0 && t <= 1.0) {
            return invalid(format!("correlation threshold {t} outside (0, 1]"));
        }
        if self.grid.symbol_count() == 0 {
            return invalid("grid has no keys");
        }
        if self.recorder.remote_control.is_some()
            && !matches!(self.recorder.markers, MarkerOutput::Lsl { .. })
        {
            return invalid("remote control needs an \"lsl\" marker output");
        }
        Ok(())
    }

    /// Code length to request: explicit, or the family's natural period.
    pub fn code_length(&self) -> Result<usize, ConfigError> {
        self.codes
            .length
            .or_else(|| self.codes.source.natural_length())
            .ok_or_else(|| {
                ConfigError::Invalid("code length unknown for an empty code table".into())
            })
    }

    /// Session parameters as emitted in the `settings` marker.
    pub fn settings_pairs(&self, frame_rate: f64) -> Vec<(String, String)> {
        let s = &self.session;
        let mut pairs = vec![
            ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
            ("subject".to_string(), s.subject.clone()),
            ("session".to_string(), s.session.clone()),
            ("task".to_string(), s.task.clone()),
        ];
        if let Some(age) = s.age {
            pairs.push(("age".into(), age.to_string()));
        }
        if let Some(sex) = &s.sex {
            pairs.push(("sex".into(), sex.clone()));
        }
        pairs.extend([
            ("screen_fr".to_string(), frame_rate.to_string()),
            (
                "presentation_rate".to_string(),
                self.timing.presentation_rate.to_string(),
            ),
            ("cue_time".to_string(), self.timing.cue_s.to_string()),
            ("trial_time".to_string(), self.timing.stimulation_s.to_string()),
            ("iti_time".to_string(), self.timing.inter_trial_s.to_string()),
            ("grid".to_string(), self.grid.layout.name().to_string()),
            ("codebook".to_string(), self.codes.source.name().to_string()),
            ("runs".to_string(), self.runs.to_string()),
        ]);
        if let Some(seed) = self.seed {
            pairs.push(("seed".into(), seed.to_string()));
        }
        pairs
    }
}

fn invalid<T>(msg: impl Into<String>) -> Result<T, ConfigError> {
    Err(ConfigError::Invalid(msg.into()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Display refresh in Hz; the monitor's reported rate is used when absent.
    pub frame_rate: Option<f64>,
    /// Code bits presented per second.
    pub presentation_rate: f64,
    pub cue_s: f64,
    pub stimulation_s: f64,
    pub inter_trial_s: f64,
    /// Lateness beyond one refresh period before a frame is reported; half a
    /// period when absent.
    pub drift_tolerance_ms: Option<f64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            frame_rate: None,
            presentation_rate: 60.0,
            cue_s: 0.8,
            stimulation_s: 4.2,
            inter_trial_s: 0.5,
            drift_tolerance_ms: None,
        }
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(fr) = self.frame_rate {
            if !(fr > 0.0) {
                return invalid(format!("frame rate {fr} must be positive"));
            }
        }
        if !(self.presentation_rate > 0.0) {
            return invalid("presentation rate must be positive");
        }
        if !(self.cue_s > 0.0) || !(self.stimulation_s > 0.0) {
            return invalid("cue and stimulation durations must be positive");
        }
        if !(self.inter_trial_s >= 0.0) {
            return invalid("inter-trial interval must not be negative");
        }
        if let Some(tol) = self.drift_tolerance_ms {
            if !(tol >= 0.0) || !tol.is_finite() {
                return invalid("drift tolerance must be a finite, non-negative number");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    pub source: CodeFamily,
    pub length: Option<usize>,
    pub threshold: f64,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            source: CodeFamily::default(),
            length: None,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomKey {
    pub label: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GridLayout {
    Matrix,
    Qwerty,
    /// Fixed pixel positions, relative to the screen centre.
    Custom { keys: Vec<CustomKey> },
}

impl GridLayout {
    pub fn name(&self) -> &'static str {
        match self {
            GridLayout::Matrix => "matrix",
            GridLayout::Qwerty => "qwerty",
            GridLayout::Custom { .. } => "custom",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub layout: GridLayout,
    pub geometry: KeyGeometry,
    pub monitor: Monitor,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            layout: GridLayout::Matrix,
            geometry: KeyGeometry::default(),
            monitor: Monitor::default(),
        }
    }
}

impl GridConfig {
    pub fn symbol_count(&self) -> usize {
        match &self.layout {
            GridLayout::Matrix => GridPreset::Matrix.len(),
            GridLayout::Qwerty => GridPreset::Qwerty.len(),
            GridLayout::Custom { keys } => keys.len(),
        }
    }

    /// Labels and positions in row-major order.
    pub fn keys(&self) -> (Vec<String>, Vec<Position>) {
        let preset = match &self.layout {
            GridLayout::Matrix => GridPreset::Matrix,
            GridLayout::Qwerty => GridPreset::Qwerty,
            GridLayout::Custom { keys } => {
                return keys
                    .iter()
                    .map(|k| (k.label.clone(), Position::new(k.x, k.y)))
                    .unzip();
            }
        };
        (
            preset.labels(),
            preset.positions(&self.geometry, &self.monitor),
        )
    }

    /// Key edge lengths in pixels.
    pub fn key_size_px(&self) -> (u32, u32) {
        self.geometry.key_size_px(&self.monitor)
    }
}

/// Logical key names as reported by the windowing layer, lower case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub continue_keys: Vec<String>,
    pub abort_keys: Vec<String>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            continue_keys: vec!["c".into()],
            abort_keys: vec!["q".into(), "escape".into()],
        }
    }
}

impl KeyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let cont: HashSet<String> = self.continue_keys.iter().map(|k| k.to_lowercase()).collect();
        let abort: HashSet<String> = self.abort_keys.iter().map(|k| k.to_lowercase()).collect();
        if cont.is_empty() {
            return invalid("at least one continue key is required");
        }
        if abort.len() < 2 {
            return invalid("at least two distinct abort keys are required");
        }
        if let Some(k) = cont.intersection(&abort).next() {
            return invalid(format!("key {k:?} is bound to both continue and abort"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MarkerOutput {
    #[default]
    Stdout,
    File { path: String },
    Tcp { address: String },
    /// Lab streaming layer outlet: one string channel of type `Markers`.
    Lsl {
        #[serde(default = "default_stream_name")]
        stream: String,
    },
}

fn default_stream_name() -> String {
    "MarkerStream".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteControlConfig {
    pub address: String,
    pub root: String,
    pub settle_ms: u64,
}

impl Default for RemoteControlConfig {
    fn default() -> Self {
        Self {
            address: "localhost:22345".into(),
            root: "data".into(),
            settle_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecorderConfig {
    pub markers: MarkerOutput,
    pub remote_control: Option<RemoteControlConfig>,
}

/// Participant and session metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionInfo {
    pub subject: String,
    pub session: String,
    pub run: u32,
    pub task: String,
    pub age: Option<u32>,
    pub sex: Option<String>,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            subject: "sub-01".into(),
            session: "01".into(),
            run: 1,
            task: "cvep".into(),
            age: None,
            sex: None,
        }
    }
}
