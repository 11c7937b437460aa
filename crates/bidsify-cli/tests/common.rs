#![allow(dead_code)]

use serde_json::json;
use std::fs;
use std::path::Path;

/// Minimal EDF file with `labels` as 128 Hz signals over `records` one-second records.
pub fn write_edf(path: &Path, labels: &[&str], records: usize) {
    let samples = 128;
    let mut out = Vec::new();
    let field = |value: &str, width: usize| {
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(width, b' ');
        bytes
    };
    let ns = labels.len();
    for (value, width) in [
        ("0", 8),
        ("X X X X", 80),
        ("Startdate 15-JAN-2024 X X X", 80),
        ("15.01.24", 8),
        ("10.30.00", 8),
    ] {
        out.extend(field(value, width));
    }
    out.extend(field(&(256 * (ns + 1)).to_string(), 8));
    out.extend(field("", 44));
    out.extend(field(&records.to_string(), 8));
    out.extend(field("1", 8));
    out.extend(field(&ns.to_string(), 4));
    for label in labels {
        out.extend(field(*label, 16));
    }
    let per_signal: [(&str, usize); 8] = [
        ("AgAgCl electrode", 80),
        ("uV", 8),
        ("-3200", 8),
        ("3200", 8),
        ("-32768", 8),
        ("32767", 8),
        ("HP:0.1Hz LP:70Hz", 80),
        ("128", 8),
    ];
    for (value, width) in per_signal {
        for _ in labels {
            out.extend(field(value, width));
        }
    }
    for _ in labels {
        out.extend(field("", 32));
    }
    for _ in 0..records * ns * samples {
        out.extend_from_slice(&0i16.to_le_bytes());
    }
    fs::write(path, out).unwrap();
}

pub fn write_metadata(dir: &Path) {
    fs::write(
        dir.join("general_metadata.json"),
        json!({
            "dataset": {
                "Name": "Resting state EEG",
                "Authors": "A. Author, B. Author",
                "License": "CC0",
                "Acknowledgements": "Thanks to all participants"
            },
            "eeg_general": {
                "EEGReference": "Cz",
                "InstitutionName": "Example Lab"
            }
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        dir.join("task_details.json"),
        json!({
            "task-rest_eeg.json": { "TaskDescription": "eyes closed", "EEGReference": "Fz" }
        })
        .to_string(),
    )
    .unwrap();
}
