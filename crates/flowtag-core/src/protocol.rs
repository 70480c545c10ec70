use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::error::{RecordError, Result};
use crate::table::{load_table, ReferenceTable, Row};

/// The one protocol-table row that is known not to be a single number
/// (IANA's "Unassigned" block).
pub const RESERVED_PROTOCOL_RANGE: &str = "146-252";

/// Marker written for protocol numbers the table does not know.
pub const UNRESOLVED: &str = "unresolved";

// ---------------------------------------------------------------------------
// Protocol: a resolved keyword, or the explicit unresolved marker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Named(String),
    Unresolved,
}

impl Protocol {
    /// Normalizes the keyword to lowercase.
    pub fn named(keyword: &str) -> Self {
        Protocol::Named(keyword.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Named(name) => name,
            Protocol::Unresolved => UNRESOLVED,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Protocol::Named(_))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Protocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProtocolTable: IANA protocol number -> keyword
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ProtocolTable {
    keywords: HashMap<u8, String>,
}

struct ProtocolNumbers;

impl ReferenceTable for ProtocolNumbers {
    type Key = u8;
    type Value = String;

    const TABLE: &'static str = "protocol table";
    const REQUIRED_COLUMNS: &'static [&'static str] = &["decimal", "keyword"];

    fn parse_row(row: &Row<'_>) -> std::result::Result<(u8, String), RecordError> {
        let decimal = row.field("decimal")?;
        if decimal.trim() == RESERVED_PROTOCOL_RANGE {
            return Err(RecordError::ReservedRange {
                value: decimal.to_string(),
            });
        }
        Ok((row.integer("decimal")?, row.keyword("keyword")?))
    }
}

impl ProtocolTable {
    /// Load from a header-bearing CSV with at least `decimal` and `keyword`.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            keywords: load_table::<ProtocolNumbers>(path)?,
        })
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (u8, &'a str)>) -> Self {
        Self {
            keywords: entries
                .into_iter()
                .map(|(number, keyword)| (number, keyword.trim().to_lowercase()))
                .collect(),
        }
    }

    /// Keyword for a protocol number. Numbers outside 0-255 never resolve.
    pub fn resolve(&self, number: u32) -> Option<&str> {
        u8::try_from(number)
            .ok()
            .and_then(|n| self.keywords.get(&n))
            .map(String::as_str)
    }

    /// Like [`resolve`](Self::resolve), falling back to [`Protocol::Unresolved`].
    pub fn protocol(&self, number: u32) -> Protocol {
        match self.resolve(number) {
            Some(keyword) => Protocol::Named(keyword.to_string()),
            None => Protocol::Unresolved,
        }
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}
