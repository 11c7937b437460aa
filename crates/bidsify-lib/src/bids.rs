use crate::error::PipelineError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Datatype directory every recording of this pipeline lands in.
pub const DATATYPE: &str = "eeg";

/// BIDS entities locating one recording inside a dataset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsPath {
    pub root: PathBuf,
    pub subject: String,
    pub session: Option<String>,
    pub task: String,
}

impl BidsPath {
    pub fn new(root: &Path, subject: &str, task: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            root: root.to_path_buf(),
            subject: check_label("sub", subject)?,
            session: None,
            task: check_label("task", task)?,
        })
    }

    pub fn with_session(mut self, session: Option<&str>) -> Result<Self, PipelineError> {
        self.session = session.map(|label| check_label("ses", label)).transpose()?;
        Ok(self)
    }

    /// `sub-<label>[_ses-<label>]_task-<label>`
    pub fn basename(&self) -> String {
        let mut name = format!("sub-{}", self.subject);
        if let Some(session) = &self.session {
            name.push_str(&format!("_ses-{}", session));
        }
        name.push_str(&format!("_task-{}", self.task));
        name
    }

    pub fn subject_dir(&self) -> PathBuf {
        self.root.join(format!("sub-{}", self.subject))
    }

    /// Directory holding the subject (and session) level files.
    pub fn session_dir(&self) -> PathBuf {
        match &self.session {
            Some(session) => self.subject_dir().join(format!("ses-{}", session)),
            None => self.subject_dir(),
        }
    }

    pub fn datatype_dir(&self) -> PathBuf {
        self.session_dir().join(DATATYPE)
    }

    /// `<basename>_<suffix><extension>` inside the datatype directory.
    pub fn file(&self, suffix: &str, extension: &str) -> PathBuf {
        self.datatype_dir()
            .join(format!("{}_{}{}", self.basename(), suffix, extension))
    }

    /// `sub-<label>[_ses-<label>]_scans.tsv`
    pub fn scans_file(&self) -> PathBuf {
        let mut name = format!("sub-{}", self.subject);
        if let Some(session) = &self.session {
            name.push_str(&format!("_ses-{}", session));
        }
        self.session_dir().join(format!("{}_scans.tsv", name))
    }

    /// Path of the recording relative to the scans file, as listed in it.
    pub fn scans_entry(&self, extension: &str) -> String {
        format!("{}/{}_{}{}", DATATYPE, self.basename(), DATATYPE, extension)
    }
}

/// Accept a BIDS entity label, which must be non-empty and alphanumeric.
pub fn check_label(entity: &'static str, raw: &str) -> Result<String, PipelineError> {
    let label = raw.trim();
    if label.is_empty() || !label.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(PipelineError::InvalidLabel {
            entity,
            value: raw.to_string(),
        });
    }
    Ok(label.to_string())
}

/// Zero-padded subject label for a numeric participant id.
pub fn subject_label(participant_id: u32) -> String {
    format!("{:03}", participant_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Eeg,
    Eog,
    Ecg,
    Emg,
    Trig,
    Misc,
}

impl ChannelType {
    /// Infer the type from an EDF label prefix; anything unrecognised is EEG.
    pub fn infer(label: &str) -> Self {
        let upper = label.trim().to_ascii_uppercase();
        let first = upper
            .split(|ch: char| ch.is_whitespace() || ch == '-' || ch == '_')
            .next()
            .unwrap_or("");
        match first {
            "EOG" | "HEOG" | "VEOG" => ChannelType::Eog,
            "ECG" | "EKG" => ChannelType::Ecg,
            "EMG" => ChannelType::Emg,
            "TRIG" | "TRIGGER" | "STATUS" | "STIM" => ChannelType::Trig,
            "MISC" | "RESP" | "TEMP" | "SPO2" => ChannelType::Misc,
            _ => ChannelType::Eeg,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ChannelType::Eeg => "ElectroEncephaloGram",
            ChannelType::Eog => "ElectroOculoGram",
            ChannelType::Ecg => "ElectroCardioGram",
            ChannelType::Emg => "ElectroMyoGram",
            ChannelType::Trig => "Trigger",
            ChannelType::Misc => "Miscellaneous",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelType::Eeg => "EEG",
            ChannelType::Eog => "EOG",
            ChannelType::Ecg => "ECG",
            ChannelType::Emg => "EMG",
            ChannelType::Trig => "TRIG",
            ChannelType::Misc => "MISC",
        };
        f.write_str(name)
    }
}

/// BIDS spelling of an EDF physical dimension.
pub fn normalize_unit(unit: &str) -> String {
    match unit.trim() {
        "" => crate::tsv::NA.to_string(),
        "uV" | "uv" | "microV" => "µV".to_string(),
        other => other.to_string(),
    }
}

/// Extract `(low_cutoff, high_cutoff)` in Hz from an EDF prefilter string
/// such as `HP:0.1Hz LP:70Hz N:50Hz`.
pub fn parse_prefilter(prefilter: &str) -> (Option<f64>, Option<f64>) {
    let mut high_pass = None;
    let mut low_pass = None;
    for token in prefilter.split_whitespace() {
        let upper = token.to_ascii_uppercase();
        let Some((kind, value)) = upper.split_once(':') else {
            continue;
        };
        let value = value.trim_end_matches("HZ").trim().parse::<f64>().ok();
        match kind {
            "HP" => high_pass = value,
            "LP" => low_pass = value,
            _ => {}
        }
    }
    (high_pass, low_pass)
}
