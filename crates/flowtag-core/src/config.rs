use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{FlowTagError, Result};
use crate::flowlog::FlowLogFormat;
use crate::report::ReportFormat;

pub const PROTOCOL_NUMBERS_PATH: &str = "input/protocol_numbers.csv";
pub const LOOKUP_TABLE_PATH: &str = "input/lookup_table.csv";
pub const FLOW_LOG_PATH: &str = "input/flow_data.log";
pub const TAG_COUNTS_PATH: &str = "output/tag_counts.csv";
pub const PORT_PROTOCOL_COUNTS_PATH: &str = "output/port_protocol_counts.csv";

/// Everything one pipeline run needs, resolved up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub protocol_numbers: PathBuf,
    pub lookup_table: PathBuf,
    pub flow_log: PathBuf,
    pub tag_counts: PathBuf,
    pub port_protocol_counts: PathBuf,
    pub flow_log_format: FlowLogFormat,
    pub report_format: ReportFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            protocol_numbers: PathBuf::from(PROTOCOL_NUMBERS_PATH),
            lookup_table: PathBuf::from(LOOKUP_TABLE_PATH),
            flow_log: PathBuf::from(FLOW_LOG_PATH),
            tag_counts: PathBuf::from(TAG_COUNTS_PATH),
            port_protocol_counts: PathBuf::from(PORT_PROTOCOL_COUNTS_PATH),
            flow_log_format: FlowLogFormat::Default,
            report_format: ReportFormat::Csv,
        }
    }
}

impl PipelineConfig {
    pub fn inputs(&self) -> [&PathBuf; 3] {
        [&self.protocol_numbers, &self.lookup_table, &self.flow_log]
    }

    /// Reject settings the readers cannot honor.
    pub fn validate(&self) -> Result<()> {
        self.flow_log_format.delimiter()?;
        if self.tag_counts == self.port_protocol_counts {
            return Err(FlowTagError::InvalidSetting {
                setting: "output",
                reason: format!(
                    "both reports would be written to {}",
                    self.tag_counts.display()
                ),
            });
        }
        Ok(())
    }
}
