use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Mains frequency written to every EEG sidecar unless configured otherwise.
pub const DEFAULT_LINE_FREQ: f64 = 50.0;

/// Input/output locations and conversion settings for one pipeline run.
///
/// Every field has a default, so an empty TOML document (or no file at all)
/// reproduces the plain `bidsify` invocation in the current directory.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the participant table, metadata files and recordings.
    pub data_dir: PathBuf,
    pub participants_file: PathBuf,
    pub general_metadata_file: PathBuf,
    pub task_details_file: PathBuf,
    /// Output dataset directory, relative to `data_dir` unless absolute.
    pub bids_dir: PathBuf,
    /// Power-line frequency in Hz recorded as `PowerLineFrequency`.
    pub line_freq: f64,
    /// Filename suffix identifying the EEG sidecars to enrich.
    pub sidecar_suffix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            participants_file: PathBuf::from("info.csv"),
            general_metadata_file: PathBuf::from("general_metadata.json"),
            task_details_file: PathBuf::from("task_details.json"),
            bids_dir: PathBuf::from("BIDS"),
            line_freq: DEFAULT_LINE_FREQ,
            sidecar_suffix: "_eeg.json".into(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a TOML file; missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: PipelineConfig =
            toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn with_line_freq(mut self, line_freq: f64) -> Self {
        self.line_freq = line_freq;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.line_freq.is_finite() || self.line_freq <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "line_freq must be a positive number of Hz, got {}",
                self.line_freq
            )));
        }
        if self.sidecar_suffix.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "sidecar_suffix must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn participants_path(&self) -> PathBuf {
        self.resolve(&self.participants_file)
    }

    pub fn general_metadata_path(&self) -> PathBuf {
        self.resolve(&self.general_metadata_file)
    }

    pub fn task_details_path(&self) -> PathBuf {
        self.resolve(&self.task_details_file)
    }

    pub fn bids_root(&self) -> PathBuf {
        self.resolve(&self.bids_dir)
    }

    /// Resolve a recording path from the participant table.
    pub fn recording_path(&self, relative: &str) -> PathBuf {
        self.resolve(Path::new(relative))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}
