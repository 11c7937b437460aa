use crate::config::PipelineConfig;
use crate::convert::{convert, ConvertOptions};
use crate::description::{write_dataset_description, write_participants_json};
use crate::error::PipelineError;
use crate::metadata::{GeneralMetadata, TaskDetails};
use crate::participants::{read_participant_table, record_participant};
use crate::sidecar::{enrich_sidecars, EnrichSummary};
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// What a pipeline run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Rows whose recording was converted.
    pub converted: usize,
    /// Recording files listed in the table but missing on disk.
    pub skipped: Vec<String>,
    pub sidecars: EnrichSummary,
}

/// Run the whole conversion: load metadata and the participant table, rebuild
/// the dataset directory, convert every row, then write the dataset
/// description and enrich the EEG sidecars.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;
    println!("\n===== BIDS Conversion Pipeline =====\n");

    let general = GeneralMetadata::load(&config.general_metadata_path())?;
    let task_details = TaskDetails::load(&config.task_details_path())?;
    let table = read_participant_table(&config.participants_path())?;
    info!(
        "{} participant row(s), optional columns {:?}, {} task override(s)",
        table.rows.len(),
        table.optional_columns,
        task_details.len()
    );

    let bids_root = config.bids_root();
    recreate_dir(&config.data_dir, &bids_root)?;

    let options = ConvertOptions {
        line_freq: config.line_freq,
        session: None,
        overwrite: true,
    };
    let mut summary = RunSummary::default();
    for row in &table.rows {
        let recording = config.recording_path(&row.edf_file);
        if !recording.exists() {
            warn!("Missing file {} → skipping.", row.edf_file);
            summary.skipped.push(row.edf_file.clone());
            continue;
        }
        convert(&recording, &bids_root, &row.subject(), &row.task, &options)
            .with_context(|| format!("converting {}", recording.display()))?;
        record_participant(&bids_root, row)?;
        summary.converted += 1;
    }

    write_dataset_description(&bids_root, &general.dataset)?;
    write_participants_json(&bids_root)?;
    summary.sidecars = enrich_sidecars(
        &bids_root,
        &general.eeg_general,
        &task_details,
        &config.sidecar_suffix,
    )?;

    println!("\n===== Conversion complete! =====\n");
    Ok(summary)
}

/// Delete and recreate the output directory, refusing to wipe the inputs.
fn recreate_dir(data_dir: &Path, bids_root: &Path) -> Result<()> {
    if bids_root.exists() {
        let root = bids_root.canonicalize()?;
        let data = data_dir.canonicalize()?;
        if data.starts_with(&root) {
            return Err(PipelineError::InvalidConfig(format!(
                "output directory {} contains the input directory",
                bids_root.display()
            ))
            .into());
        }
        fs::remove_dir_all(bids_root)
            .with_context(|| format!("removing {}", bids_root.display()))?;
    }
    fs::create_dir_all(bids_root).with_context(|| format!("creating {}", bids_root.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::EdfBuilder;
    use crate::tsv::TsvTable;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_inputs(dir: &Path, csv: &str) {
        fs::write(dir.join("info.csv"), csv).unwrap();
        fs::write(
            dir.join("general_metadata.json"),
            json!({
                "dataset": {
                    "Name": "Resting state",
                    "Authors": ["A. Author"],
                    "License": "CC-BY-4.0"
                },
                "eeg_general": { "EEGReference": "Cz", "CapManufacturer": "EasyCap" }
            })
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.join("task_details.json"),
            json!({ "task-rest_eeg.json": { "TaskDescription": "eyes closed rest" } }).to_string(),
        )
        .unwrap();
    }

    fn config(dir: &Path) -> PipelineConfig {
        PipelineConfig::default().with_data_dir(dir.to_path_buf())
    }

    fn read_json(path: PathBuf) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn converts_rows_and_skips_missing_recordings() {
        let dir = tempdir().unwrap();
        write_inputs(
            dir.path(),
            "edf_file,participant_id,task,age,sex\n\
             rest7.edf,7,rest,31,F\n\
             gone.edf,8,rest,40,M\n\
             odd12.edf,12,oddball,25,\n",
        );
        EdfBuilder::new(&["Fp1", "Fp2"]).write(&dir.path().join("rest7.edf"));
        EdfBuilder::new(&["Cz"]).write(&dir.path().join("odd12.edf"));

        let summary = run(&config(dir.path())).unwrap();
        assert_eq!(summary.converted, 2);
        assert_eq!(summary.skipped, vec!["gone.edf".to_string()]);
        assert_eq!(summary.sidecars.updated, 2);

        let root = dir.path().join("BIDS");
        assert!(root.join("sub-007").is_dir());
        assert!(root.join("sub-012").is_dir());
        assert!(!root.join("sub-008").exists());

        let rest = read_json(root.join("sub-007/eeg/sub-007_task-rest_eeg.json"));
        assert_eq!(rest["PowerLineFrequency"], 50);
        assert_eq!(rest["EEGReference"], "Cz");
        assert_eq!(rest["TaskDescription"], "eyes closed rest");
        let odd = read_json(root.join("sub-012/eeg/sub-012_task-oddball_eeg.json"));
        assert!(odd.get("TaskDescription").is_none());
        assert_eq!(odd["CapManufacturer"], "EasyCap");

        let participants = TsvTable::read(&root.join("participants.tsv")).unwrap();
        let keys: Vec<_> = participants.keys().collect();
        assert_eq!(keys, vec!["sub-007", "sub-012"]);
        assert_eq!(participants.get("sub-007", "age"), Some("31"));
        assert_eq!(participants.get("sub-012", "sex"), Some("n/a"));
        assert_eq!(participants.get("sub-012", "hand"), Some("n/a"));

        let description = read_json(root.join("dataset_description.json"));
        assert_eq!(description["Name"], "Resting state");
        assert!(root.join("participants.json").exists());
    }

    #[test]
    fn repeated_participant_keeps_last_row() {
        let dir = tempdir().unwrap();
        write_inputs(
            dir.path(),
            "edf_file,participant_id,task,age\nrest3.edf,3,rest,20\nrest3.edf,3,rest,21\n",
        );
        EdfBuilder::new(&["Cz"]).write(&dir.path().join("rest3.edf"));
        let summary = run(&config(dir.path())).unwrap();
        assert_eq!(summary.converted, 2);
        let participants = TsvTable::read(&dir.path().join("BIDS/participants.tsv")).unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants.get("sub-003", "age"), Some("21"));
    }

    #[test]
    fn rerun_rebuilds_output_tree() {
        let dir = tempdir().unwrap();
        write_inputs(dir.path(), "edf_file,participant_id,task\nrest1.edf,1,rest\n");
        EdfBuilder::new(&["Cz"]).write(&dir.path().join("rest1.edf"));
        let stale = dir.path().join("BIDS/sub-099");
        fs::create_dir_all(&stale).unwrap();
        run(&config(dir.path())).unwrap();
        assert!(!stale.exists());
        assert!(dir.path().join("BIDS/sub-001").is_dir());
    }

    #[test]
    fn missing_metadata_aborts_before_touching_output() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("info.csv"), "edf_file,participant_id,task\n").unwrap();
        let marker = dir.path().join("BIDS/keep.txt");
        fs::create_dir_all(marker.parent().unwrap()).unwrap();
        fs::write(&marker, "x").unwrap();
        let err = run(&config(dir.path())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MetadataNotFound(_))
        ));
        assert!(marker.exists());
    }

    #[test]
    fn output_directory_may_not_contain_inputs() {
        let dir = tempdir().unwrap();
        write_inputs(dir.path(), "edf_file,participant_id,task\n");
        let mut config = config(dir.path());
        config.bids_dir = PathBuf::from(".");
        let err = run(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidConfig(_))
        ));
        assert!(dir.path().join("info.csv").exists());
    }
}
