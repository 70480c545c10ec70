pub mod config;
pub mod engine;
pub mod error;
pub mod flowlog;
pub mod lookup;
pub mod pipeline;
pub mod protocol;
pub mod report;
pub mod table;

pub use config::PipelineConfig;
pub use engine::{classify_and_count, Classifier, FlowCounts, PortProtocolCounts, TagCounts, UNTAGGED};
pub use error::{FlowTagError, RecordError};
pub use flowlog::{FlowLogFormat, FlowLogReader, FlowRecord};
pub use lookup::{LookupTable, PortProtocol};
pub use pipeline::{run, Pipeline, ReferenceTables};
pub use protocol::{Protocol, ProtocolTable, UNRESOLVED};
pub use report::{write_report, ReportFormat, ReportTable};
