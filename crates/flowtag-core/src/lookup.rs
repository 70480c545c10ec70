use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::{RecordError, Result};
use crate::protocol::Protocol;
use crate::table::{load_table, ReferenceTable, Row};

/// Composite key shared by the lookup table and the port/protocol counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PortProtocol {
    pub port: u16,
    pub protocol: Protocol,
}

impl PortProtocol {
    pub fn new(port: u16, protocol: Protocol) -> Self {
        Self { port, protocol }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// (dstport, protocol keyword) -> tag, everything lowercased.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    tags: HashMap<PortProtocol, String>,
}

struct LookupRows;

impl ReferenceTable for LookupRows {
    type Key = PortProtocol;
    type Value = String;

    const TABLE: &'static str = "lookup table";
    const REQUIRED_COLUMNS: &'static [&'static str] = &["dstport", "protocol", "tag"];

    fn parse_row(row: &Row<'_>) -> std::result::Result<(PortProtocol, String), RecordError> {
        let port = row.integer("dstport")?;
        let protocol = Protocol::named(row.field("protocol")?);
        let tag = row.keyword("tag")?;
        Ok((PortProtocol::new(port, protocol), tag))
    }
}

impl LookupTable {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            tags: load_table::<LookupRows>(path)?,
        })
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (u16, &'a str, &'a str)>) -> Self {
        Self {
            tags: entries
                .into_iter()
                .map(|(port, protocol, tag)| {
                    (
                        PortProtocol::new(port, Protocol::named(protocol)),
                        tag.trim().to_lowercase(),
                    )
                })
                .collect(),
        }
    }

    /// Tag for a key. Keys with an unresolved protocol never match.
    pub fn tag_for(&self, key: &PortProtocol) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_normalizes_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookup_table.csv");
        std::fs::write(
            &path,
            "DstPort,Protocol,Tag\n25,TCP,SV_P1\n443,tcp,sv_P2\n68,udp,sv_p2\nhttp,tcp,bad\n",
        )
        .unwrap();

        let table = LookupTable::load(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.tag_for(&PortProtocol::new(25, Protocol::named("tcp"))),
            Some("sv_p1")
        );
        assert_eq!(
            table.tag_for(&PortProtocol::new(443, Protocol::named("TCP"))),
            Some("sv_p2")
        );
        assert_eq!(
            table.tag_for(&PortProtocol::new(68, Protocol::named("tcp"))),
            None
        );
    }

    #[test]
    fn test_duplicate_keys_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookup_table.csv");
        std::fs::write(&path, "dstport,protocol,tag\n80,tcp,old\n80,TCP,new\n").unwrap();

        let table = LookupTable::load(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.tag_for(&PortProtocol::new(80, Protocol::named("tcp"))),
            Some("new")
        );
    }

    #[test]
    fn test_unresolved_never_matches() {
        let table = LookupTable::from_entries([(53, "unresolved", "odd")]);
        assert_eq!(
            table.tag_for(&PortProtocol::new(53, Protocol::Unresolved)),
            None
        );
    }

    #[test]
    fn test_missing_tag_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookup_table.csv");
        std::fs::write(&path, "dstport,protocol\n80,tcp\n").unwrap();

        assert!(matches!(
            LookupTable::load(&path),
            Err(crate::error::FlowTagError::Schema { .. })
        ));
    }
}
