use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::engine::{PortProtocolCounts, TagCounts};
use crate::error::{FlowTagError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!("unknown report format '{s}': expected csv or json")),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Csv => write!(f, "csv"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

/// One output cell. Numbers stay numbers in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(u64),
}

impl fmt::Display for Cell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A frequency table that can be written as a report.
pub trait ReportTable {
    const COLUMNS: &'static [&'static str];

    /// Rows in the table's iteration order, one cell per column.
    fn rows(&self) -> Vec<Vec<Cell<'_>>>;
}

impl ReportTable for TagCounts {
    const COLUMNS: &'static [&'static str] = &["Tag", "Count"];

    fn rows(&self) -> Vec<Vec<Cell<'_>>> {
        self.iter()
            .map(|(tag, count)| vec![Cell::Text(tag), Cell::Number(count)])
            .collect()
    }
}

impl ReportTable for PortProtocolCounts {
    const COLUMNS: &'static [&'static str] = &["Port", "Protocol", "Count"];

    fn rows(&self) -> Vec<Vec<Cell<'_>>> {
        self.iter()
            .map(|(key, count)| {
                vec![
                    Cell::Number(u64::from(key.port)),
                    Cell::Text(key.protocol.as_str()),
                    Cell::Number(count),
                ]
            })
            .collect()
    }
}

/// Write `table` to `path`, creating parent directories first.
pub fn write_report<T: ReportTable>(table: &T, path: &Path, format: ReportFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| FlowTagError::io(parent, e))?;
    }

    let file = File::create(path).map_err(|e| FlowTagError::io(path, e))?;
    let rows = table.rows();

    match format {
        ReportFormat::Csv => write_csv(file, T::COLUMNS, &rows),
        ReportFormat::Json => write_json(file, T::COLUMNS, &rows),
    }
    .map_err(|e| FlowTagError::io(path, e))?;

    tracing::info!(path = %path.display(), rows = rows.len(), %format, "report written");
    Ok(())
}

fn write_csv(file: File, columns: &[&str], rows: &[Vec<Cell<'_>>]) -> std::io::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file);

    wtr.write_record(columns)?;
    for row in rows {
        wtr.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    wtr.flush()
}

fn write_json(file: File, columns: &[&str], rows: &[Vec<Cell<'_>>]) -> std::io::Result<()> {
    let objects: Vec<IndexMap<&str, &Cell<'_>>> = rows
        .iter()
        .map(|row| columns.iter().copied().zip(row.iter()).collect())
        .collect();

    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &objects)?;
    out.write_all(b"\n")?;
    out.flush()
}
