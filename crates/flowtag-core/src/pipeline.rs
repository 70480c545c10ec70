use std::path::Path;

use crate::config::PipelineConfig;
use crate::engine::{classify_and_count, FlowCounts};
use crate::error::Result;
use crate::flowlog::FlowLogReader;
use crate::lookup::LookupTable;
use crate::protocol::ProtocolTable;
use crate::report::write_report;
use crate::table::ensure_exists;

/// Both reference tables, loaded once per run.
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    pub protocols: ProtocolTable,
    pub lookup: LookupTable,
}

/// One run over a validated configuration. Stages run strictly in order
/// and each opens and closes its own files.
pub struct Pipeline<'c> {
    config: &'c PipelineConfig,
}

impl<'c> Pipeline<'c> {
    /// Validate settings and check every input exists before anything is read.
    pub fn new(config: &'c PipelineConfig) -> Result<Self> {
        config.validate()?;
        for input in config.inputs() {
            ensure_exists(input)?;
        }
        Ok(Self { config })
    }

    pub fn load_tables(&self) -> Result<ReferenceTables> {
        Ok(ReferenceTables {
            protocols: ProtocolTable::load(&self.config.protocol_numbers)?,
            lookup: LookupTable::load(&self.config.lookup_table)?,
        })
    }

    pub fn open_flow_log(&self) -> Result<FlowLogReader> {
        FlowLogReader::open(&self.config.flow_log, self.config.flow_log_format)
    }

    pub fn count(&self, tables: &ReferenceTables) -> Result<FlowCounts> {
        let records = self.open_flow_log()?;
        classify_and_count(&tables.protocols, &tables.lookup, records)
    }

    pub fn write_reports(&self, counts: &FlowCounts) -> Result<()> {
        let format = self.config.report_format;
        write_report(&counts.tag_counts, &self.config.tag_counts, format)?;
        write_report(
            &counts.port_protocol_counts,
            &self.config.port_protocol_counts,
            format,
        )
    }

    pub fn report_paths(&self) -> [&Path; 2] {
        [
            self.config.tag_counts.as_path(),
            self.config.port_protocol_counts.as_path(),
        ]
    }
}

/// Load, classify, and write both reports. Nothing is written unless every
/// earlier stage succeeded.
pub fn run(config: &PipelineConfig) -> Result<FlowCounts> {
    let pipeline = Pipeline::new(config)?;
    let tables = pipeline.load_tables()?;
    let counts = pipeline.count(&tables)?;
    pipeline.write_reports(&counts)?;
    Ok(counts)
}
