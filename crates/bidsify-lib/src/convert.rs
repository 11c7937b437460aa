use crate::bids::{normalize_unit, parse_prefilter, BidsPath, ChannelType};
use crate::description;
use crate::edf::Recording;
use crate::error::PipelineError;
use crate::sidecar::write_json;
use crate::tsv::{TsvTable, NA};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Knobs for a single recording conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Written verbatim as `PowerLineFrequency`; never detected from the data.
    pub line_freq: f64,
    pub session: Option<String>,
    /// Replace files already written for the same subject/session/task.
    pub overwrite: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            line_freq: crate::config::DEFAULT_LINE_FREQ,
            session: None,
            overwrite: false,
        }
    }
}

/// Files produced for one converted recording.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub bids_path: BidsPath,
    pub data_file: PathBuf,
    pub sidecar: PathBuf,
    pub channels_file: PathBuf,
    pub events_file: Option<PathBuf>,
    pub channel_count: usize,
    pub event_count: usize,
}

#[derive(Debug, Serialize)]
struct EegSidecar {
    #[serde(rename = "TaskName")]
    task_name: String,
    #[serde(rename = "Manufacturer")]
    manufacturer: &'static str,
    #[serde(rename = "PowerLineFrequency")]
    power_line_frequency: Value,
    #[serde(rename = "SamplingFrequency")]
    sampling_frequency: f64,
    #[serde(rename = "SoftwareFilters")]
    software_filters: &'static str,
    #[serde(rename = "RecordingDuration")]
    recording_duration: f64,
    #[serde(rename = "RecordingType")]
    recording_type: &'static str,
    #[serde(rename = "EEGReference")]
    eeg_reference: &'static str,
    #[serde(rename = "EEGGround")]
    eeg_ground: &'static str,
    #[serde(rename = "EEGPlacementScheme")]
    eeg_placement_scheme: &'static str,
    #[serde(rename = "EEGChannelCount")]
    eeg_channel_count: usize,
    #[serde(rename = "EOGChannelCount")]
    eog_channel_count: usize,
    #[serde(rename = "ECGChannelCount")]
    ecg_channel_count: usize,
    #[serde(rename = "EMGChannelCount")]
    emg_channel_count: usize,
    #[serde(rename = "MiscChannelCount")]
    misc_channel_count: usize,
    #[serde(rename = "TriggerChannelCount")]
    trigger_channel_count: usize,
}

impl EegSidecar {
    fn new(recording: &Recording, task: &str, line_freq: f64) -> Self {
        let mut counts: HashMap<ChannelType, usize> = HashMap::new();
        for channel in recording.data_channels() {
            *counts.entry(ChannelType::infer(&channel.label)).or_default() += 1;
        }
        let count = |kind: ChannelType| counts.get(&kind).copied().unwrap_or(0);
        Self {
            task_name: task.to_string(),
            manufacturer: NA,
            power_line_frequency: json_number(line_freq),
            sampling_frequency: recording.sampling_frequency(),
            software_filters: NA,
            recording_duration: recording.duration_s(),
            recording_type: "continuous",
            eeg_reference: NA,
            eeg_ground: NA,
            eeg_placement_scheme: NA,
            eeg_channel_count: count(ChannelType::Eeg),
            eog_channel_count: count(ChannelType::Eog),
            ecg_channel_count: count(ChannelType::Ecg),
            emg_channel_count: count(ChannelType::Emg),
            misc_channel_count: count(ChannelType::Misc),
            trigger_channel_count: count(ChannelType::Trig),
        }
    }
}

/// Whole numbers serialize as JSON integers (`50`, not `50.0`).
fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Convert one EDF recording into the BIDS layout under `bids_root`.
///
/// The recording is read fully into memory, copied to
/// `sub-<subject>/eeg/sub-<subject>_task-<task>_eeg.edf` and described by the
/// `_eeg.json`, `_channels.tsv` and (for EDF+ annotations) `_events.tsv`
/// files next to it. The subject's scans table is updated and a placeholder
/// `dataset_description.json` is created when the dataset has none yet.
pub fn convert(
    recording_path: &Path,
    bids_root: &Path,
    subject: &str,
    task: &str,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    let bids_path =
        BidsPath::new(bids_root, subject, task)?.with_session(options.session.as_deref())?;
    let recording = Recording::read(recording_path)?;

    let data_file = bids_path.file("eeg", ".edf");
    if data_file.exists() {
        if !options.overwrite {
            return Err(PipelineError::RecordingExists(data_file).into());
        }
        remove_existing(&bids_path)?;
    }
    let datatype_dir = bids_path.datatype_dir();
    fs::create_dir_all(&datatype_dir)
        .with_context(|| format!("creating {}", datatype_dir.display()))?;

    fs::write(&data_file, &recording.bytes)
        .with_context(|| format!("writing {}", data_file.display()))?;

    let sidecar = bids_path.file("eeg", ".json");
    write_json(
        &sidecar,
        &EegSidecar::new(&recording, &bids_path.task, options.line_freq),
    )?;

    let channels_file = bids_path.file("channels", ".tsv");
    let channel_count = write_channels_tsv(&channels_file, &recording)?;

    let events_file = if recording.annotations.is_empty() {
        None
    } else {
        let path = bids_path.file("events", ".tsv");
        write_events_tsv(&path, &recording)?;
        Some(path)
    };

    update_scans(&bids_path, &recording)?;
    description::ensure_placeholder(bids_root)?;

    println!(
        "Converted {} → BIDS (sub-{}, task-{})",
        recording_path.display(),
        bids_path.subject,
        bids_path.task
    );
    Ok(ConversionReport {
        bids_path,
        data_file,
        sidecar,
        channels_file,
        events_file,
        channel_count,
        event_count: recording.annotations.len(),
    })
}

fn remove_existing(bids_path: &BidsPath) -> Result<()> {
    let dir = bids_path.datatype_dir();
    let prefix = format!("{}_", bids_path.basename());
    for entry in fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            debug!("removing stale {}", entry.path().display());
            fs::remove_file(entry.path())
                .with_context(|| format!("removing {}", entry.path().display()))?;
        }
    }
    Ok(())
}

fn format_hz(value: Option<f64>) -> String {
    value
        .map(|hz| hz.to_string())
        .unwrap_or_else(|| NA.to_string())
}

fn write_channels_tsv(path: &Path, recording: &Recording) -> Result<usize> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(file);
    writer.write_record([
        "name",
        "type",
        "units",
        "low_cutoff",
        "high_cutoff",
        "description",
        "sampling_frequency",
        "status",
        "status_description",
    ])?;
    let mut written = 0;
    for channel in recording.data_channels() {
        let kind = ChannelType::infer(&channel.label);
        let (low_cutoff, high_cutoff) = parse_prefilter(&channel.prefilter);
        writer.write_record(&[
            channel.label.clone(),
            kind.to_string(),
            normalize_unit(&channel.unit),
            format_hz(low_cutoff),
            format_hz(high_cutoff),
            kind.description().to_string(),
            recording.channel_sfreq(channel).to_string(),
            "good".to_string(),
            NA.to_string(),
        ])?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

fn write_events_tsv(path: &Path, recording: &Recording) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(file);
    writer.write_record(["onset", "duration", "trial_type", "sample"])?;
    let sfreq = recording.sampling_frequency();
    for annotation in &recording.annotations {
        writer.write_record(&[
            annotation.onset.to_string(),
            annotation.duration.unwrap_or(0.0).to_string(),
            annotation.description.clone(),
            ((annotation.onset * sfreq).round() as i64).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn update_scans(bids_path: &BidsPath, recording: &Recording) -> Result<()> {
    let scans_file = bids_path.scans_file();
    let mut scans = TsvTable::read_or_new(&scans_file, ["filename", "acq_time"])?;
    let acq_time = recording
        .start
        .map(|start| start.format("%Y-%m-%dT%H:%M:%S").to_string());
    scans.upsert(
        &bids_path.scans_entry(".edf"),
        &[("acq_time", acq_time.as_deref())],
    );
    scans.write(&scans_file)
}
