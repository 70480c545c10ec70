use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::error::{FlowTagError, RecordError, Result};
use crate::table::{open_reader, Header, RecordReader, Row};

/// Column layout of a default-format (version 2) VPC flow log line.
pub const FLOW_FIELDS: [&str; 14] = [
    "version",
    "account-id",
    "interface-id",
    "srcaddr",
    "dstaddr",
    "srcport",
    "dstport",
    "protocol",
    "packets",
    "bytes",
    "start",
    "end",
    "action",
    "log-status",
];

pub const REQUIRED_FLOW_FIELDS: [&str; 2] = ["dstport", "protocol"];

const TABLE: &str = "flow log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FlowLogFormat {
    /// Headerless, space-delimited, [`FLOW_FIELDS`] in order.
    Default,
    /// First line is a header naming the columns.
    Custom { delimiter: char },
}

impl Default for FlowLogFormat {
    fn default() -> Self {
        FlowLogFormat::Default
    }
}

impl FlowLogFormat {
    pub fn custom() -> Self {
        FlowLogFormat::Custom { delimiter: ' ' }
    }

    pub fn has_header(&self) -> bool {
        matches!(self, FlowLogFormat::Custom { .. })
    }

    /// The delimiter as a single byte; it must be ASCII and not the quote
    /// or newline character.
    pub fn delimiter(&self) -> Result<u8> {
        match *self {
            FlowLogFormat::Default => Ok(b' '),
            FlowLogFormat::Custom { delimiter } => u8::try_from(delimiter)
                .ok()
                .filter(|b| b.is_ascii() && *b != b'"' && *b != b'\n')
                .ok_or_else(|| FlowTagError::InvalidSetting {
                    setting: "delimiter",
                    reason: format!("{delimiter:?} cannot delimit flow log columns"),
                }),
        }
    }
}

/// The fields of a flow record that take part in classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRecord {
    pub dst_port: u16,
    /// IANA protocol number, before resolution.
    pub protocol: u32,
}

impl FlowRecord {
    pub fn new(dst_port: u16, protocol: u32) -> Self {
        Self { dst_port, protocol }
    }

    fn from_row(row: &Row<'_>) -> std::result::Result<Self, RecordError> {
        if row.is_empty() {
            return Err(RecordError::EmptyRecord);
        }
        Ok(Self {
            dst_port: row.integer("dstport")?,
            protocol: row.integer("protocol")?,
        })
    }
}

// ---------------------------------------------------------------------------
// FlowLogReader: streams records out of a flow log file
// ---------------------------------------------------------------------------

pub struct FlowLogReader {
    path: PathBuf,
    reader: RecordReader,
    header: Header,
    record: StringRecord,
    done: bool,
}

impl FlowLogReader {
    /// Open a flow log and validate its columns.
    pub fn open(path: &Path, format: FlowLogFormat) -> Result<Self> {
        let mut reader = open_reader(path, format.delimiter()?, format.has_header())?;

        let header = if format.has_header() {
            let names = reader
                .headers()
                .map_err(|e| FlowTagError::from_csv(path, 1, e))?;
            Header::new(names.iter())
        } else {
            Header::new(FLOW_FIELDS)
        };
        header.require(TABLE, path, &REQUIRED_FLOW_FIELDS)?;

        tracing::debug!(path = %path.display(), ?format, "flow log opened");

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            header,
            record: StringRecord::new(),
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for FlowLogReader {
    /// `Err(FlowTagError::Record { .. })` is a skipped line; any other error
    /// ends the stream.
    type Item = Result<FlowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let read = self.reader.read(&mut self.record);
        let line = self.reader.line();
        match read {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => {
                Some(
                    FlowRecord::from_row(&self.header.row(&self.record))
                        .map_err(|source| FlowTagError::Record { line, source }),
                )
            }
            Err(e) => {
                let err = FlowTagError::from_csv(&self.path, line, e);
                if !err.is_recoverable() {
                    self.done = true;
                }
                Some(Err(err))
            }
        }
    }
}
