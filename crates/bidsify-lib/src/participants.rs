use crate::bids::subject_label;
use crate::error::PipelineError;
use crate::tsv::TsvTable;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::{Path, PathBuf};

pub const REQUIRED_COLUMNS: [&str; 3] = ["edf_file", "participant_id", "task"];
pub const OPTIONAL_COLUMNS: [&str; 5] = ["age", "sex", "hand", "weight", "height"];
pub const REGISTRY_FILE: &str = "participants.tsv";

/// One recording listed in the participant table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantRow {
    pub edf_file: String,
    pub participant_id: u32,
    pub task: String,
    /// Optional demographic columns present in the table, in table order.
    pub demographics: Vec<(String, Option<String>)>,
}

impl ParticipantRow {
    /// Zero-padded subject label, e.g. `007`.
    pub fn subject(&self) -> String {
        subject_label(self.participant_id)
    }

    /// Registry key, e.g. `sub-007`.
    pub fn bids_id(&self) -> String {
        format!("sub-{}", self.subject())
    }
}

/// Parsed participant table.
#[derive(Debug, Clone, Default)]
pub struct ParticipantTable {
    pub rows: Vec<ParticipantRow>,
    /// Optional demographic columns the input table provides.
    pub optional_columns: Vec<String>,
}

/// Read the participant table, validating the required columns up front.
pub fn read_participant_table(path: &Path) -> Result<ParticipantTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening participant table {}", path.display()))?;
    let headers = reader.headers().context("reading header")?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| locate(&headers, column).is_none())
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MissingColumns {
            expected: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            missing,
        }
        .into());
    }
    let edf_idx = locate(&headers, "edf_file").unwrap_or_default();
    let id_idx = locate(&headers, "participant_id").unwrap_or_default();
    let task_idx = locate(&headers, "task").unwrap_or_default();
    let optional: Vec<(String, usize)> = OPTIONAL_COLUMNS
        .iter()
        .filter_map(|column| locate(&headers, column).map(|idx| (column.to_string(), idx)))
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading participant row {}", idx + 1))?;
        let field = |col: usize| record.get(col).unwrap_or("").to_string();
        let raw_id = field(id_idx);
        let participant_id =
            parse_participant_id(&raw_id).ok_or(PipelineError::InvalidParticipantId {
                row: idx + 1,
                value: raw_id.clone(),
            })?;
        let demographics = optional
            .iter()
            .map(|(name, col)| {
                let value = record
                    .get(*col)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string);
                (name.clone(), value)
            })
            .collect();
        rows.push(ParticipantRow {
            edf_file: field(edf_idx),
            participant_id,
            task: field(task_idx),
            demographics,
        });
    }
    Ok(ParticipantTable {
        rows,
        optional_columns: optional.into_iter().map(|(name, _)| name).collect(),
    })
}

fn locate(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}

/// Accepts `7` as well as spreadsheet exports such as `7.0`.
fn parse_participant_id(raw: &str) -> Option<u32> {
    if let Ok(id) = raw.parse::<u32>() {
        return Some(id);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64).then_some(value as u32)
}

/// The dataset's `participants.tsv`, one row per participant.
#[derive(Debug, Clone)]
pub struct ParticipantsRegistry {
    path: PathBuf,
    table: TsvTable,
}

impl ParticipantsRegistry {
    /// Load the registry under `bids_root`, or start one with the default header.
    pub fn open(bids_root: &Path) -> Result<Self> {
        let path = bids_root.join(REGISTRY_FILE);
        let headers = std::iter::once("participant_id").chain(OPTIONAL_COLUMNS);
        let table = TsvTable::read_or_new(&path, headers)?;
        Ok(Self { path, table })
    }

    /// Overwrite the participant's available demographics, or append a new row.
    pub fn upsert(&mut self, row: &ParticipantRow) {
        let values: Vec<(&str, Option<&str>)> = row
            .demographics
            .iter()
            .map(|(column, value)| (column.as_str(), value.as_deref()))
            .collect();
        self.table.upsert(&row.bids_id(), &values);
    }

    pub fn save(&self) -> Result<()> {
        self.table.write(&self.path)
    }

    pub fn table(&self) -> &TsvTable {
        &self.table
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read-modify-write the registry for one converted row.
pub fn record_participant(bids_root: &Path, row: &ParticipantRow) -> Result<()> {
    let mut registry = ParticipantsRegistry::open(bids_root)?;
    registry.upsert(row);
    registry.save()
}
