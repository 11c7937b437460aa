use crate::metadata::DatasetMeta;
use crate::sidecar::write_json;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

pub const BIDS_VERSION: &str = "1.9.0";
pub const DESCRIPTION_FILE: &str = "dataset_description.json";
pub const PARTICIPANTS_JSON: &str = "participants.json";
pub const README_FILE: &str = "README";

const README_PLACEHOLDER: &str = "\
This dataset was converted from EDF recordings to the Brain Imaging Data Structure (BIDS).

Describe the study, its participants and the recording setup here.

See https://bids-specification.readthedocs.io for the format.
";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DatasetDescription<'a> {
    name: &'a str,
    #[serde(rename = "BIDSVersion")]
    bids_version: &'static str,
    dataset_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    license: Option<&'a str>,
    #[serde(skip_serializing_if = "is_empty")]
    authors: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    acknowledgements: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    how_to_acknowledge: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    funding: Option<&'a [String]>,
}

fn is_empty(authors: &&[String]) -> bool {
    authors.is_empty()
}

/// Write `dataset_description.json` at the dataset root, replacing any existing one.
pub fn write_dataset_description(root: &Path, meta: &DatasetMeta) -> Result<PathBuf> {
    let path = root.join(DESCRIPTION_FILE);
    let description = DatasetDescription {
        name: &meta.name,
        bids_version: BIDS_VERSION,
        dataset_type: "raw",
        license: Some(meta.license.as_str()),
        authors: &meta.authors.0,
        acknowledgements: meta.acknowledgements.as_deref(),
        how_to_acknowledge: meta.how_to_acknowledge.as_deref(),
        funding: meta.funding.as_ref().map(|funding| funding.0.as_slice()),
    };
    write_json(&path, &description)?;
    Ok(path)
}

/// Create a minimal description and `README` so a partially converted tree is
/// still a dataset. Existing files are left untouched.
pub fn ensure_placeholder(root: &Path) -> Result<()> {
    fs::create_dir_all(root).with_context(|| format!("creating {}", root.display()))?;
    let readme = root.join(README_FILE);
    if !readme.exists() {
        fs::write(&readme, README_PLACEHOLDER)
            .with_context(|| format!("writing {}", readme.display()))?;
    }
    let path = root.join(DESCRIPTION_FILE);
    if path.exists() {
        return Ok(());
    }
    let description = DatasetDescription {
        name: "[Unspecified]",
        bids_version: BIDS_VERSION,
        dataset_type: "raw",
        license: None,
        authors: &[],
        acknowledgements: None,
        how_to_acknowledge: None,
        funding: None,
    };
    write_json(&path, &description)
}

/// Describe the demographic columns of `participants.tsv`.
pub fn write_participants_json(root: &Path) -> Result<PathBuf> {
    let path = root.join(PARTICIPANTS_JSON);
    let fields = json!({
        "participant_id": {
            "Description": "Unique participant identifier"
        },
        "age": {
            "Description": "Age of the participant at time of testing",
            "Units": "years"
        },
        "sex": {
            "Description": "Biological sex of the participant",
            "Levels": { "F": "female", "M": "male" }
        },
        "hand": {
            "Description": "Handedness of the participant",
            "Levels": { "R": "right", "L": "left", "A": "ambidextrous" }
        },
        "weight": {
            "Description": "Body weight of the participant",
            "Units": "kg"
        },
        "height": {
            "Description": "Body height of the participant",
            "Units": "m"
        }
    });
    write_json(&path, &fields)?;
    Ok(path)
}
