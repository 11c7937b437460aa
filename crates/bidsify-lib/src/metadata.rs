use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Read a JSON document, failing with [`PipelineError::MetadataNotFound`] when absent.
pub fn load_metadata(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(PipelineError::MetadataNotFound(path.to_path_buf()).into());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .with_context(|| format!("parsing metadata {}", path.display()))?;
    Ok(value)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// A list of names that may be written either as a JSON array or as a single
/// `", "`-separated string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct StringList(pub Vec<String>);

impl From<OneOrMany> for StringList {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(joined) => StringList(
                joined
                    .split(", ")
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            OneOrMany::Many(items) => StringList(items),
        }
    }
}

/// Dataset-level fields feeding `dataset_description.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatasetMeta {
    pub name: String,
    pub authors: StringList,
    pub license: String,
    #[serde(default)]
    pub acknowledgements: Option<String>,
    #[serde(default)]
    pub funding: Option<StringList>,
    #[serde(default)]
    pub how_to_acknowledge: Option<String>,
}

/// Contents of `general_metadata.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralMetadata {
    pub dataset: DatasetMeta,
    /// Fields merged into every EEG sidecar, winning over task overrides.
    pub eeg_general: Map<String, Value>,
}

impl GeneralMetadata {
    pub fn load(path: &Path) -> Result<Self> {
        let value = load_metadata(path)?;
        let metadata = serde_json::from_value(value).map_err(|err| {
            PipelineError::InvalidMetadata {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        })?;
        Ok(metadata)
    }
}

/// Sidecar overrides keyed by filename suffix, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDetails {
    entries: Vec<(String, Map<String, Value>)>,
}

impl TaskDetails {
    pub fn load(path: &Path) -> Result<Self> {
        let value = load_metadata(path)?;
        Self::from_value(value).map_err(|reason| {
            anyhow::Error::from(PipelineError::InvalidMetadata {
                path: path.to_path_buf(),
                reason,
            })
        })
    }

    fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(map) = value else {
            return Err("task details must be a JSON object".into());
        };
        let mut entries = Vec::with_capacity(map.len());
        for (suffix, updates) in map {
            match updates {
                Value::Object(updates) => entries.push((suffix, updates)),
                other => {
                    return Err(format!(
                        "override for {:?} must be an object, found {}",
                        suffix, other
                    ))
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First override whose key is a suffix of `filename`.
    pub fn override_for(&self, filename: &str) -> Option<&Map<String, Value>> {
        self.entries
            .iter()
            .find(|(suffix, _)| filename.ends_with(suffix.as_str()))
            .map(|(_, updates)| updates)
    }
}
