//! Record and column buffer types
//!
//! A `Record` is one row keyed by field name. A `Buffer` stores many records
//! column by column, keeping every column the same length.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{HandlerError, Result};

/// Format used whenever a timestamp is rendered as text (millisecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One scalar value of a record
///
/// Deserialization is untagged, so plain JSON/YAML scalars map directly.
/// Strings shaped like `2024-01-01T12:00:00.123` become timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Parse a raw text cell (CSV) into the narrowest matching value
    pub fn parse_text(raw: &str) -> FieldValue {
        if raw.is_empty() {
            return FieldValue::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return FieldValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return FieldValue::Float(f);
        }
        match raw {
            "true" | "True" => FieldValue::Bool(true),
            "false" | "False" => FieldValue::Bool(false),
            _ => FieldValue::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(v: NaiveDateTime) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// One data entry, field name to value
pub type Record = HashMap<String, FieldValue>;

/// Build a [`Record`] from `key => value` pairs.
///
/// ```rust,ignore
/// let row = record! { "t" => 1, "v" => 10.5 };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::Record::new();
        $(
            row.insert($key.to_string(), $crate::FieldValue::from($value));
        )+
        row
    }};
}

/// A named column of a [`Buffer`]
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<FieldValue>,
}

/// Column-oriented accumulation of records
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Buffer {
    columns: Vec<Column>,
}

impl Buffer {
    /// Create an empty buffer with one column per field, in the given order
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = fields
            .into_iter()
            .map(|name| Column {
                name: name.into(),
                values: Vec::new(),
            })
            .collect();
        Self { columns }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[FieldValue]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Number of buffered rows, taken from the first column (0 without fields)
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every buffered value, keeping the fields
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.values.clear();
        }
    }

    /// Append one record.
    ///
    /// Fields of `record` that the buffer does not know are ignored. Every
    /// field of the buffer must be present in `record`; otherwise nothing is
    /// appended and `MissingField` is returned.
    pub fn push_record(&mut self, record: &Record) -> Result<()> {
        if let Some(missing) = self
            .columns
            .iter()
            .find(|c| !record.contains_key(&c.name))
        {
            return Err(HandlerError::MissingField(missing.name.clone()));
        }

        for column in &mut self.columns {
            if let Some(value) = record.get(&column.name) {
                column.values.push(value.clone());
            }
        }
        Ok(())
    }

    /// Append one row given in column order
    pub fn push_row(&mut self, row: Vec<FieldValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(HandlerError::Config(format!(
                "row has {} values but buffer has {} fields",
                row.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.values.push(value);
        }
        Ok(())
    }

    /// Values of row `index` in column order
    pub fn row(&self, index: usize) -> Option<Vec<&FieldValue>> {
        if index >= self.len() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&FieldValue>> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// Row `index` as a [`Record`]
    pub fn record(&self, index: usize) -> Option<Record> {
        if index >= self.len() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.clone(), c.values[index].clone()))
                .collect(),
        )
    }

    /// Copy of rows `start..end` (clamped to the buffer length)
    pub fn slice(&self, start: usize, end: usize) -> Buffer {
        let end = end.min(self.len());
        let start = start.min(end);
        Buffer {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values[start..end].to_vec(),
                })
                .collect(),
        }
    }

    /// Split into consecutive buffers of at most `size` rows
    pub fn chunks(&self, size: usize) -> Vec<Buffer> {
        let size = size.max(1);
        (0..self.len())
            .step_by(size)
            .map(|start| self.slice(start, start + size))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_push_record_ignores_unknown_fields() {
        let mut buffer = Buffer::new(["t", "v"]);
        buffer
            .push_record(&record! { "t" => 1, "v" => 10, "extra" => "x" })
            .unwrap();

        assert_eq!(buffer.len(), 1);
        assert!(!buffer.has_field("extra"));
        assert_eq!(buffer.column("v").unwrap(), &[FieldValue::Int(10)]);
    }

    #[test]
    fn test_push_record_missing_field_leaves_buffer_untouched() {
        let mut buffer = Buffer::new(["t", "v"]);
        buffer.push_record(&record! { "t" => 1, "v" => 10 }).unwrap();

        let err = buffer.push_record(&record! { "t" => 2 }).unwrap_err();
        assert!(matches!(err, HandlerError::MissingField(ref f) if f == "v"));
        assert_eq!(buffer.column("t").unwrap().len(), 1);
        assert_eq!(buffer.column("v").unwrap().len(), 1);
    }

    #[test]
    fn test_len_without_fields_is_zero() {
        let mut buffer = Buffer::new(Vec::<String>::new());
        buffer.push_record(&record! { "t" => 1 }).unwrap();
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_chunks_split_rows() {
        let mut buffer = Buffer::new(["n"]);
        for i in 0..250 {
            buffer.push_row(vec![FieldValue::Int(i)]).unwrap();
        }
        let chunks = buffer.chunks(100);
        assert_eq!(chunks.iter().map(Buffer::len).collect::<Vec<_>>(), vec![100, 100, 50]);
        assert_eq!(chunks[2].column("n").unwrap()[0], FieldValue::Int(200));
    }

    #[test]
    fn test_field_value_deserialize_untagged() {
        let row: Record = serde_json::from_str(
            r#"{"ts": "2024-03-01T08:30:00.250", "price": 1.5, "qty": 3, "side": "buy", "ok": true, "note": null}"#,
        )
        .unwrap();

        let expected_ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(8, 30, 0, 250)
            .unwrap();
        assert_eq!(row["ts"], FieldValue::Timestamp(expected_ts));
        assert_eq!(row["price"], FieldValue::Float(1.5));
        assert_eq!(row["qty"], FieldValue::Int(3));
        assert_eq!(row["side"], FieldValue::Text("buy".to_string()));
        assert_eq!(row["ok"], FieldValue::Bool(true));
        assert!(row["note"].is_null());
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(FieldValue::parse_text(""), FieldValue::Null);
        assert_eq!(FieldValue::parse_text("42"), FieldValue::Int(42));
        assert_eq!(FieldValue::parse_text("4.2"), FieldValue::Float(4.2));
        assert_eq!(FieldValue::parse_text("True"), FieldValue::Bool(true));
        assert_eq!(FieldValue::parse_text("BTCUSDT"), FieldValue::Text("BTCUSDT".to_string()));
    }

    #[test]
    fn test_timestamp_display_uses_milliseconds() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_micro_opt(3, 4, 5, 678_901)
            .unwrap();
        assert_eq!(FieldValue::from(ts).to_string(), "2024-01-02 03:04:05.678");
    }
}
