use std::fs;
use std::path::Path;

const ANNOTATION_SAMPLES: usize = 64;

/// Builds small EDF/EDF+ files for tests.
pub struct EdfBuilder {
    labels: Vec<String>,
    samples_per_record: usize,
    records: usize,
    annotations: Vec<(f64, Option<f64>, String)>,
}

impl EdfBuilder {
    pub fn new(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|label| label.to_string()).collect(),
            samples_per_record: 128,
            records: 2,
            annotations: Vec::new(),
        }
    }

    pub fn samples_per_record(mut self, samples: usize) -> Self {
        self.samples_per_record = samples;
        self
    }

    pub fn records(mut self, records: usize) -> Self {
        self.records = records;
        self
    }

    pub fn annotation(mut self, onset: f64, duration: Option<f64>, text: &str) -> Self {
        self.annotations.push((onset, duration, text.to_string()));
        self
    }

    pub fn write(&self, path: &Path) {
        fs::write(path, self.build()).unwrap();
    }

    pub fn build(&self) -> Vec<u8> {
        let plus = !self.annotations.is_empty();
        let ns = self.labels.len() + usize::from(plus);
        let mut out = Vec::new();
        push_field(&mut out, "0", 8);
        push_field(&mut out, "X X X X", 80);
        push_field(&mut out, "Startdate 15-JAN-2024 X X X", 80);
        push_field(&mut out, "15.01.24", 8);
        push_field(&mut out, "10.30.00", 8);
        push_field(&mut out, &(256 * (ns + 1)).to_string(), 8);
        push_field(&mut out, if plus { "EDF+C" } else { "" }, 44);
        push_field(&mut out, &self.records.to_string(), 8);
        push_field(&mut out, "1", 8);
        push_field(&mut out, &ns.to_string(), 4);

        let mut signals: Vec<[String; 8]> = self
            .labels
            .iter()
            .map(|label| {
                [
                    label.clone(),
                    "AgAgCl electrode".into(),
                    "uV".into(),
                    "-3200".into(),
                    "3200".into(),
                    "HP:0.1Hz LP:70Hz".into(),
                    self.samples_per_record.to_string(),
                    String::new(),
                ]
            })
            .collect();
        if plus {
            signals.push([
                "EDF Annotations".into(),
                String::new(),
                String::new(),
                "-1".into(),
                "1".into(),
                String::new(),
                ANNOTATION_SAMPLES.to_string(),
                String::new(),
            ]);
        }
        let widths = [(0, 16), (1, 80), (2, 8), (3, 8), (4, 8)];
        for (idx, width) in widths {
            for signal in &signals {
                push_field(&mut out, &signal[idx], width);
            }
        }
        for _ in &signals {
            push_field(&mut out, "-32768", 8);
        }
        for _ in &signals {
            push_field(&mut out, "32767", 8);
        }
        for (idx, width) in [(5, 80), (6, 8), (7, 32)] {
            for signal in &signals {
                push_field(&mut out, &signal[idx], width);
            }
        }

        for record in 0..self.records {
            for sample in 0..self.labels.len() * self.samples_per_record {
                let value = ((sample % 64) as i16 - 32) * 100;
                out.extend_from_slice(&value.to_le_bytes());
            }
            if plus {
                let mut block = format!("+{}\x14\x14\x00", record).into_bytes();
                if record == 0 {
                    for (onset, duration, text) in &self.annotations {
                        block.extend(format!("+{}", onset).bytes());
                        if let Some(duration) = duration {
                            block.extend(format!("\x15{}", duration).bytes());
                        }
                        block.extend(format!("\x14{}\x14\x00", text).bytes());
                    }
                }
                block.resize(ANNOTATION_SAMPLES * 2, 0);
                out.extend(block);
            }
        }
        out
    }
}

fn push_field(out: &mut Vec<u8>, value: &str, width: usize) {
    let mut field = value.as_bytes().to_vec();
    field.resize(width, b' ');
    out.extend(field);
}
