use anyhow::{Context, Result};
use clap::Parser;
use cvep_experiment::{MarkerOutput, SpellerConfig};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "c-VEP speller experiment controller")]
pub struct Args {
    /// Path to a JSON session configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seed for the trial order (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of runs (overrides config)
    #[arg(long)]
    pub runs: Option<usize>,

    /// Display refresh rate in Hz; the monitor's reported rate otherwise
    #[arg(long)]
    pub frame_rate: Option<f64>,

    /// Write markers as JSON lines to this file instead of the configured sink
    #[arg(long)]
    pub markers: Option<PathBuf>,

    /// Write trial records as JSON here on exit
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// TrueType font for key labels
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Log filter, e.g. `info` or `cvep_experiment=debug` (falls back to RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// Reads the configuration file, if any, and applies the command line on top.
    pub fn load_config(&self) -> Result<SpellerConfig> {
        let mut config = match &self.config {
            Some(path) => SpellerConfig::load(path)?,
            None => SpellerConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(runs) = self.runs {
            config.runs = runs;
        }
        if let Some(rate) = self.frame_rate {
            config.timing.frame_rate = Some(rate);
        }
        if let Some(path) = &self.markers {
            config.recorder.markers = MarkerOutput::File {
                path: path.to_string_lossy().into_owned(),
            };
        }
        config
            .validate()
            .context("configuration rejected after command-line overrides")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let args = Args::parse_from([
            "cvep-speller",
            "--seed",
            "9",
            "--runs",
            "3",
            "--frame-rate",
            "120",
            "--markers",
            "markers.jsonl",
        ]);
        let config = args.load_config().unwrap();
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.runs, 3);
        assert_eq!(config.timing.frame_rate, Some(120.0));
        assert_eq!(
            config.recorder.markers,
            MarkerOutput::File {
                path: "markers.jsonl".into()
            }
        );
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = Args::parse_from(["cvep-speller", "--runs", "0"]);
        assert!(args.load_config().is_err());
    }
}
