use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::path::Path;

/// Placeholder BIDS uses for missing cells.
pub const NA: &str = "n/a";

/// Small tab-separated table keyed by its first column.
///
/// Cells are kept as text so values round-trip exactly as they were read;
/// blank cells are normalised to [`NA`].
#[derive(Debug, Clone, PartialEq)]
pub struct TsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TsvTable {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Read an existing table, or start a fresh one with `headers` if the file is absent.
    pub fn read_or_new<S: Into<String>>(
        path: &Path,
        headers: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        if path.exists() {
            Self::read(path)
        } else {
            Ok(Self::new(headers))
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .trim(Trim::All)
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("reading header of {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() {
            return Err(anyhow!("{} has no header row", path.display()));
        }
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("reading {}", path.display()))?;
            let row = (0..headers.len())
                .map(|idx| cell(record.get(idx)))
                .collect();
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Append a column (filled with [`NA`]) unless it already exists.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(NA.to_string());
        }
        self.headers.len() - 1
    }

    /// Row whose key (first column) equals `key`.
    pub fn row(&self, key: &str) -> Option<&[String]> {
        self.rows
            .iter()
            .find(|row| row.first().map(String::as_str) == Some(key))
            .map(Vec::as_slice)
    }

    /// Cell lookup by key and column name.
    pub fn get(&self, key: &str, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.row(key).and_then(|row| row.get(idx)).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(|row| row.first().map(String::as_str))
    }

    /// Overwrite the given columns of the row keyed by `key`, or append a new
    /// row with every other column set to [`NA`].
    pub fn upsert(&mut self, key: &str, values: &[(&str, Option<&str>)]) {
        let indices: Vec<(usize, String)> = values
            .iter()
            .map(|(column, value)| (self.ensure_column(column), cell(*value)))
            .collect();
        let width = self.headers.len();
        let position = self
            .rows
            .iter()
            .position(|row| row.first().map(String::as_str) == Some(key));
        let row_idx = match position {
            Some(idx) => idx,
            None => {
                let mut fresh = vec![NA.to_string(); width];
                fresh[0] = key.to_string();
                self.rows.push(fresh);
                self.rows.len() - 1
            }
        };
        let row = &mut self.rows[row_idx];
        for (idx, value) in indices {
            if idx > 0 {
                row[idx] = value;
            }
        }
    }
}

fn cell(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => NA.to_string(),
    }
}
