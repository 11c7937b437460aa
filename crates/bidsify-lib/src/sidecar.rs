use crate::bids::DATATYPE;
use crate::metadata::TaskDetails;
use anyhow::{Context, Result};
use log::{debug, error};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Serializer, Value};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Write `value` as JSON indented with four spaces.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut serializer)
        .with_context(|| format!("serializing {}", path.display()))?;
    buf.push(b'\n');
    fs::write(path, buf).with_context(|| format!("writing {}", path.display()))
}

/// Outcome of one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub updated: usize,
    pub skipped: usize,
}

/// Merge `updates` into `target`; keys already present are replaced.
pub fn merge_into(target: &mut Map<String, Value>, updates: &Map<String, Value>) {
    for (key, value) in updates {
        target.insert(key.clone(), value.clone());
    }
}

/// Walk `root` and merge metadata into every sidecar ending in `suffix` that
/// lives below an `eeg` directory.
///
/// The first task override whose key is a suffix of the filename is applied,
/// then the general fields, so general metadata wins on key collisions.
/// Sidecars that are not JSON objects are reported and left untouched.
pub fn enrich_sidecars(
    root: &Path,
    general: &Map<String, Value>,
    task_details: &TaskDetails,
    suffix: &str,
) -> Result<EnrichSummary> {
    println!("\nUpdating EEG JSON metadata...\n");
    let mut summary = EnrichSummary::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() || !in_datatype_dir(root, entry.path()) {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if !file_name.ends_with(suffix) {
            continue;
        }
        let path = entry.path();
        println!("Processing: {}", path.display());
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let mut existing = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                error!("Sidecar is not a JSON object: {}", path.display());
                summary.skipped += 1;
                continue;
            }
            Err(err) => {
                error!("Error decoding JSON: {} ({})", path.display(), err);
                summary.skipped += 1;
                continue;
            }
        };
        if let Some(updates) = task_details.override_for(&file_name) {
            debug!("{}: applying {} task field(s)", file_name, updates.len());
            merge_into(&mut existing, updates);
        }
        merge_into(&mut existing, general);
        write_json(path, &existing)?;
        summary.updated += 1;
    }
    Ok(summary)
}

fn in_datatype_dir(root: &Path, path: &Path) -> bool {
    path.parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(|relative| {
            relative
                .components()
                .any(|component| component.as_os_str() == DATATYPE)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn task_details(value: Value) -> TaskDetails {
        let dir = tempdir().unwrap();
        let path = dir.path().join("task_details.json");
        fs::write(&path, value.to_string()).unwrap();
        TaskDetails::load(&path).unwrap()
    }

    fn read(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn general_metadata_wins_over_task_override() {
        let dir = tempdir().unwrap();
        let eeg = dir.path().join("sub-001/eeg");
        fs::create_dir_all(&eeg).unwrap();
        let sidecar = eeg.join("sub-001_task-rest_eeg.json");
        write_json(&sidecar, &json!({"TaskName": "rest", "EEGReference": "n/a"})).unwrap();

        let general = object(json!({"EEGReference": "Cz", "CapManufacturer": "EasyCap"}));
        let details = task_details(json!({
            "task-rest_eeg.json": {"EEGReference": "Fz", "TaskDescription": "eyes closed"},
            "_eeg.json": {"TaskDescription": "fallback"}
        }));
        let summary = enrich_sidecars(dir.path(), &general, &details, "_eeg.json").unwrap();
        assert_eq!(summary, EnrichSummary { updated: 1, skipped: 0 });

        let merged = read(&sidecar);
        assert_eq!(merged["EEGReference"], "Cz");
        assert_eq!(merged["TaskDescription"], "eyes closed");
        assert_eq!(merged["CapManufacturer"], "EasyCap");
        assert_eq!(merged["TaskName"], "rest");
        let text = fs::read_to_string(&sidecar).unwrap();
        assert!(text.contains("\n    \"TaskName\": \"rest\""));
    }

    #[test]
    fn enrichment_is_idempotent() {
        let dir = tempdir().unwrap();
        let eeg = dir.path().join("sub-002/eeg");
        fs::create_dir_all(&eeg).unwrap();
        let sidecar = eeg.join("sub-002_task-rest_eeg.json");
        write_json(&sidecar, &json!({"TaskName": "rest"})).unwrap();
        let general = object(json!({"InstitutionName": "Lab"}));
        let details = TaskDetails::default();
        enrich_sidecars(dir.path(), &general, &details, "_eeg.json").unwrap();
        let first = fs::read_to_string(&sidecar).unwrap();
        enrich_sidecars(dir.path(), &general, &details, "_eeg.json").unwrap();
        assert_eq!(fs::read_to_string(&sidecar).unwrap(), first);
    }

    #[test]
    fn malformed_and_misplaced_files_are_skipped() {
        let dir = tempdir().unwrap();
        let eeg = dir.path().join("sub-003/eeg");
        fs::create_dir_all(&eeg).unwrap();
        fs::write(eeg.join("sub-003_task-a_eeg.json"), "{not json").unwrap();
        fs::write(eeg.join("sub-003_task-b_eeg.json"), "[1, 2]").unwrap();
        let good = eeg.join("sub-003_task-c_eeg.json");
        write_json(&good, &json!({})).unwrap();
        let outside = dir.path().join("sub-003/sub-003_task-d_eeg.json");
        write_json(&outside, &json!({})).unwrap();

        let general = object(json!({"EEGGround": "AFz"}));
        let summary =
            enrich_sidecars(dir.path(), &general, &TaskDetails::default(), "_eeg.json").unwrap();
        assert_eq!(summary, EnrichSummary { updated: 1, skipped: 2 });
        assert_eq!(read(&good)["EEGGround"], "AFz");
        assert!(read(&outside).get("EEGGround").is_none());
        assert_eq!(
            fs::read_to_string(eeg.join("sub-003_task-a_eeg.json")).unwrap(),
            "{not json"
        );
    }
}
