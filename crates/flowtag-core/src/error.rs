//! Error types for flowtag.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the classification pipeline.
///
/// Everything except [`FlowTagError::Record`] is fatal: the run stops before
/// any report is written.
#[derive(Error, Debug)]
pub enum FlowTagError {
    /// A required input does not exist
    #[error("the path {} does not exist", path.display())]
    Configuration { path: PathBuf },

    /// A setting has a value the pipeline cannot use
    #[error("invalid {setting}: {reason}")]
    InvalidSetting {
        setting: &'static str,
        reason: String,
    },

    /// A required column is missing from a table header
    #[error("{table} {} is missing required column '{column}'", path.display())]
    Schema {
        table: &'static str,
        path: PathBuf,
        column: String,
    },

    /// A single row could not be used; callers skip it and carry on
    #[error("line {line}: {source}")]
    Record {
        line: u64,
        #[source]
        source: RecordError,
    },

    /// Reading an input or writing a report failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FlowTagError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FlowTagError::Record { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FlowTagError::Io {
            path: path.into(),
            source,
        }
    }

    /// Map a csv error to either a fatal I/O error or a recoverable row error.
    pub(crate) fn from_csv(path: &std::path::Path, line: u64, err: csv::Error) -> Self {
        match err.into_kind() {
            csv::ErrorKind::Io(source) => FlowTagError::io(path, source),
            csv::ErrorKind::Utf8 { err, .. } => FlowTagError::Record {
                line,
                source: RecordError::Malformed {
                    reason: err.to_string(),
                },
            },
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => FlowTagError::Record {
                line,
                source: RecordError::Malformed {
                    reason: format!("expected {expected_len} fields, found {len}"),
                },
            },
            other => FlowTagError::Record {
                line,
                source: RecordError::Malformed {
                    reason: format!("{other:?}"),
                },
            },
        }
    }
}

/// Why one row was dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing value for '{field}'")]
    MissingField { field: &'static str },

    #[error("'{field}' is not an integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("empty record")]
    EmptyRecord,

    #[error("malformed row: {reason}")]
    Malformed { reason: String },

    /// The unassigned protocol range row of the IANA table. Expected, so
    /// loaders drop it without a warning.
    #[error("reserved range {value:?}")]
    ReservedRange { value: String },
}

impl RecordError {
    /// Rows that are known to be irregular and are skipped without a warning.
    pub fn is_expected(&self) -> bool {
        matches!(self, RecordError::ReservedRange { .. })
    }
}

pub type Result<T> = std::result::Result<T, FlowTagError>;
