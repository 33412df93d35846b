//! Column-oriented sample table and its CSV form

use crate::error::{PipelineError, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Named columns of sampled values; columns may differ in length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    columns: Vec<(String, Vec<f64>)>,
}

impl SampleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; columns keep insertion order
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.columns.push((name.into(), values));
    }

    pub fn columns(&self) -> &[(String, Vec<f64>)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Length of the longest column
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0)
    }

    /// Header row, then one row per position; short columns get empty cells
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        if !self.columns.is_empty() {
            csv.write_record(self.column_names())?;
            for row in 0..self.row_count() {
                csv.write_record(self.columns.iter().map(|(_, values)| {
                    values.get(row).map(|&v| format_value(v)).unwrap_or_default()
                }))?;
            }
        }
        csv.flush().map_err(|e| PipelineError::io("<csv>", e))?;
        Ok(())
    }

    /// Write the table to `path`, replacing any existing file
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        self.write_csv_to(file)
    }
}

/// Plain decimal; NaN spelled out so it is not mistaken for padding
fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        v.to_string()
    }
}
