//! CSV file handling
//!
//! Reads CSV files into a [`Buffer`] with one inferred type per column,
//! writes buffers back out, and provides [`CsvFileSink`], a sink appending
//! every flushed batch to `<dir>/<destination>.csv`.

use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::writer_utils::record::{Buffer, FieldValue};
use crate::writer_utils::sink::Sink;

/// Read a CSV file with a header row into a buffer
pub fn read_csv_buffer<P: AsRef<Path>>(path: P) -> Result<Buffer> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut raw_columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (i, column) in raw_columns.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let columns: Vec<Vec<FieldValue>> = raw_columns.iter().map(|c| infer_column(c)).collect();
    let rows = columns.first().map_or(0, Vec::len);

    let mut buffer = Buffer::new(headers);
    for i in 0..rows {
        buffer.push_row(columns.iter().map(|c| c[i].clone()).collect())?;
    }
    Ok(buffer)
}

/// Give a whole column one type: integer, float, bool, else text. Empty cells are null.
fn infer_column(raw: &[String]) -> Vec<FieldValue> {
    if raw.iter().all(|s| s.is_empty()) {
        return vec![FieldValue::Null; raw.len()];
    }
    if let Some(values) = convert_all(raw, |s| s.parse::<i64>().ok().map(FieldValue::Int)) {
        return values;
    }
    if let Some(values) = convert_all(raw, |s| s.parse::<f64>().ok().map(FieldValue::Float)) {
        return values;
    }
    if let Some(values) = convert_all(raw, |s| match s {
        "true" | "True" => Some(FieldValue::Bool(true)),
        "false" | "False" => Some(FieldValue::Bool(false)),
        _ => None,
    }) {
        return values;
    }
    raw.iter()
        .map(|s| {
            if s.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::Text(s.clone())
            }
        })
        .collect()
}

/// Convert every non-empty cell with `parse`, or `None` if any cell does not parse
fn convert_all<F>(raw: &[String], parse: F) -> Option<Vec<FieldValue>>
where
    F: Fn(&str) -> Option<FieldValue>,
{
    raw.iter()
        .map(|s| if s.is_empty() { Some(FieldValue::Null) } else { parse(s) })
        .collect()
}

/// Write `buffer` to a new CSV file.
///
/// With `index_label`, a leading column with that header holds the row number.
pub fn write_csv<P: AsRef<Path>>(path: P, buffer: &Buffer, index_label: Option<&str>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;

    let mut header: Vec<&str> = Vec::new();
    if let Some(label) = index_label {
        header.push(label);
    }
    header.extend(buffer.fields());
    writer.write_record(&header)?;

    for (i, row) in buffer.rows().enumerate() {
        let mut cells: Vec<String> = Vec::with_capacity(row.len() + 1);
        if index_label.is_some() {
            cells.push(i.to_string());
        }
        cells.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

/// Sink appending batches to CSV files in a directory, one file per destination
pub struct CsvFileSink {
    dir: PathBuf,
}

impl CsvFileSink {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_path(&self, destination: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", destination))
    }
}

#[async_trait]
impl Sink for CsvFileSink {
    async fn write(&mut self, buffer: &Buffer, destination: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.file_path(destination);
        let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(buffer.fields())?;
        }
        for row in buffer.rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;

        info!("Appended {} records to {:?}", buffer.len(), path);
        Ok(())
    }
}
