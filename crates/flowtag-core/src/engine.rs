use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{FlowTagError, Result};
use crate::flowlog::FlowRecord;
use crate::lookup::{LookupTable, PortProtocol};
use crate::protocol::ProtocolTable;

/// Tag for any (port, protocol) pair the lookup table does not list.
pub const UNTAGGED: &str = "untagged";

// ---------------------------------------------------------------------------
// Counters: first-seen order is preserved for reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagCounts(IndexMap<String, u64>);

impl TagCounts {
    pub fn increment(&mut self, tag: &str) {
        match self.0.get_mut(tag) {
            Some(count) => *count += 1,
            None => {
                self.0.insert(tag.to_string(), 1);
            }
        }
    }

    pub fn get(&self, tag: &str) -> u64 {
        self.0.get(tag).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(tag, count)| (tag.as_str(), *count))
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortProtocolCounts(IndexMap<PortProtocol, u64>);

impl PortProtocolCounts {
    pub fn increment(&mut self, key: &PortProtocol) {
        match self.0.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.0.insert(key.clone(), 1);
            }
        }
    }

    pub fn get(&self, key: &PortProtocol) -> u64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PortProtocol, u64)> {
        self.0.iter().map(|(key, count)| (key, *count))
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Both frequency tables plus how many records fed them.
#[derive(Debug, Clone, Default)]
pub struct FlowCounts {
    pub tag_counts: TagCounts,
    pub port_protocol_counts: PortProtocolCounts,
    pub processed: u64,
    pub skipped: u64,
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

pub struct Classifier<'a> {
    protocols: &'a ProtocolTable,
    lookup: &'a LookupTable,
    counts: FlowCounts,
}

impl<'a> Classifier<'a> {
    pub fn new(protocols: &'a ProtocolTable, lookup: &'a LookupTable) -> Self {
        Self {
            protocols,
            lookup,
            counts: FlowCounts::default(),
        }
    }

    /// Count one well-formed record and return the tag it was given.
    pub fn observe(&mut self, record: &FlowRecord) -> &'a str {
        let lookup: &'a LookupTable = self.lookup;
        let key = PortProtocol::new(record.dst_port, self.protocols.protocol(record.protocol));

        self.counts.port_protocol_counts.increment(&key);

        let tag = lookup.tag_for(&key).unwrap_or(UNTAGGED);
        self.counts.tag_counts.increment(tag);
        self.counts.processed += 1;

        tag
    }

    /// Record a row that was dropped before classification.
    pub fn skip(&mut self, err: &FlowTagError) {
        self.counts.skipped += 1;
        if let FlowTagError::Record { line, source } = err {
            tracing::warn!(table = "flow log", line, reason = %source, "skipped row");
        }
    }

    pub fn finish(self) -> FlowCounts {
        tracing::info!(
            processed = self.counts.processed,
            skipped = self.counts.skipped,
            tags = self.counts.tag_counts.len(),
            port_protocol_pairs = self.counts.port_protocol_counts.len(),
            "classification complete"
        );
        self.counts
    }
}

/// Classify every record in `records` and tally both counters.
///
/// Record-level errors are logged and skipped; the first fatal error stops
/// the pass and is returned.
pub fn classify_and_count<I>(
    protocols: &ProtocolTable,
    lookup: &LookupTable,
    records: I,
) -> Result<FlowCounts>
where
    I: IntoIterator<Item = Result<FlowRecord>>,
{
    let mut classifier = Classifier::new(protocols, lookup);

    for item in records {
        match item {
            Ok(record) => {
                classifier.observe(&record);
            }
            Err(err) if err.is_recoverable() => classifier.skip(&err),
            Err(err) => return Err(err),
        }
    }

    Ok(classifier.finish())
}
