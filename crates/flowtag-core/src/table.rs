use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::hash::Hash;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{FlowTagError, RecordError, Result};

// ---------------------------------------------------------------------------
// Header: lowercased column names resolved to positions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Header {
    columns: HashMap<String, usize>,
}

impl Header {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut columns = HashMap::new();
        for (idx, name) in names.into_iter().enumerate() {
            // first occurrence wins on duplicate column names
            columns.entry(name.trim().to_lowercase()).or_insert(idx);
        }
        Self { columns }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.get(column).copied()
    }

    /// Fail with a schema error on the first required column not present.
    pub fn require(&self, table: &'static str, path: &Path, required: &[&str]) -> Result<()> {
        for column in required {
            if self.position(column).is_none() {
                return Err(FlowTagError::Schema {
                    table,
                    path: path.to_path_buf(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn row<'a>(&'a self, record: &'a StringRecord) -> Row<'a> {
        Row {
            header: self,
            record,
        }
    }
}

// ---------------------------------------------------------------------------
// Row: typed field access for one record
// ---------------------------------------------------------------------------

pub struct Row<'a> {
    header: &'a Header,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    /// Raw field value; absent when the column is unknown or the row is short.
    pub fn get(&self, field: &'static str) -> Option<&'a str> {
        self.header
            .position(field)
            .and_then(|idx| self.record.get(idx))
    }

    pub fn field(&self, field: &'static str) -> std::result::Result<&'a str, RecordError> {
        self.get(field).ok_or(RecordError::MissingField { field })
    }

    pub fn integer<T: FromStr>(&self, field: &'static str) -> std::result::Result<T, RecordError> {
        let raw = self.field(field)?;
        raw.trim()
            .parse::<T>()
            .map_err(|_| RecordError::InvalidInteger {
                field,
                value: raw.to_string(),
            })
    }

    /// Lowercased string field.
    pub fn keyword(&self, field: &'static str) -> std::result::Result<String, RecordError> {
        Ok(self.field(field)?.trim().to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.record.iter().all(|f| f.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Reference tables
// ---------------------------------------------------------------------------

/// One kind of header-bearing reference file and how its rows become entries.
pub trait ReferenceTable {
    type Key: Eq + Hash;
    type Value;

    /// Name used in logs and schema errors.
    const TABLE: &'static str;
    const REQUIRED_COLUMNS: &'static [&'static str];

    fn parse_row(row: &Row<'_>) -> std::result::Result<(Self::Key, Self::Value), RecordError>;
}

/// Fail with a configuration error if `path` does not exist.
pub fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(FlowTagError::Configuration {
            path: path.to_path_buf(),
        })
    }
}

// ---------------------------------------------------------------------------
// RecordReader: csv records tagged with the file line they ended on
// ---------------------------------------------------------------------------

/// Remembers where every newline passed through, so a byte offset reported by
/// the csv reader can be turned back into a 1-based file line.
struct LineCounter<R> {
    inner: R,
    offset: u64,
    pending: VecDeque<u64>,
    passed: u64,
}

impl<R> LineCounter<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            pending: VecDeque::new(),
            passed: 0,
        }
    }

    /// Line holding the byte at `offset`. Offsets must not go backwards.
    fn line_at(&mut self, offset: u64) -> u64 {
        while self.pending.front().is_some_and(|&nl| nl < offset) {
            self.pending.pop_front();
            self.passed += 1;
        }
        self.passed + 1
    }
}

impl<R: Read> Read for LineCounter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for (idx, byte) in buf[..n].iter().enumerate() {
            if *byte == b'\n' {
                self.pending.push_back(self.offset + idx as u64);
            }
        }
        self.offset += n as u64;
        Ok(n)
    }
}

pub(crate) struct RecordReader {
    csv: csv::Reader<LineCounter<File>>,
    line: u64,
}

impl RecordReader {
    pub(crate) fn headers(&mut self) -> csv::Result<&StringRecord> {
        self.csv.headers()
    }

    /// Read the next record. Blank lines are skipped by the csv reader but
    /// still counted by [`line`](Self::line).
    pub(crate) fn read(&mut self, record: &mut StringRecord) -> csv::Result<bool> {
        let result = self.csv.read_record(record);
        // the position now sits just past the record's terminator
        let end = self.csv.position().byte();
        self.line = self.csv.get_mut().line_at(end.saturating_sub(1));
        result
    }

    /// File line on which the last record read (or failed to read) ended.
    pub(crate) fn line(&self) -> u64 {
        self.line
    }
}

pub(crate) fn open_reader(path: &Path, delimiter: u8, has_headers: bool) -> Result<RecordReader> {
    ensure_exists(path)?;
    let file = File::open(path).map_err(|e| FlowTagError::io(path, e))?;
    let csv = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(LineCounter::new(file));
    Ok(RecordReader { csv, line: 0 })
}

/// Load a comma-delimited reference table into a map.
///
/// Duplicate keys are last-write-wins. Rows that fail conversion are
/// dropped; a missing file or required column aborts without a partial map.
pub fn load_table<T: ReferenceTable>(path: &Path) -> Result<HashMap<T::Key, T::Value>> {
    let mut reader = open_reader(path, b',', true)?;

    let header = {
        let names = reader
            .headers()
            .map_err(|e| FlowTagError::from_csv(path, 1, e))?;
        Header::new(names.iter())
    };
    header.require(T::TABLE, path, T::REQUIRED_COLUMNS)?;

    let mut table = HashMap::new();
    let mut skipped = 0u64;
    let mut record = StringRecord::new();

    loop {
        match reader.read(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                let row = header.row(&record);
                match T::parse_row(&row) {
                    Ok((key, value)) => {
                        table.insert(key, value);
                    }
                    Err(e) => {
                        skipped += 1;
                        log_skipped(T::TABLE, reader.line(), Some(&record), &e);
                    }
                }
            }
            // the record buffer is not a usable row after a csv error
            Err(e) => match FlowTagError::from_csv(path, reader.line(), e) {
                FlowTagError::Record { line, source } => {
                    skipped += 1;
                    log_skipped(T::TABLE, line, None, &source);
                }
                fatal => return Err(fatal),
            },
        }
    }

    tracing::info!(
        table = T::TABLE,
        path = %path.display(),
        entries = table.len(),
        skipped,
        "reference table loaded"
    );

    Ok(table)
}

fn log_skipped(table: &'static str, line: u64, record: Option<&StringRecord>, err: &RecordError) {
    if err.is_expected() {
        tracing::debug!(table, line, reason = %err, "skipped expected row");
    } else if let Some(record) = record {
        tracing::warn!(table, line, reason = %err, row = ?record, "skipped row");
    } else {
        tracing::warn!(table, line, reason = %err, "skipped row");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct PairTable;

    impl ReferenceTable for PairTable {
        type Key = u32;
        type Value = String;

        const TABLE: &'static str = "pair table";
        const REQUIRED_COLUMNS: &'static [&'static str] = &["id", "name"];

        fn parse_row(row: &Row<'_>) -> std::result::Result<(u32, String), RecordError> {
            Ok((row.integer("id")?, row.keyword("name")?))
        }
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_header_is_case_insensitive() {
        let header = Header::new(["ID", " Name ", "Extra"]);
        assert_eq!(header.position("id"), Some(0));
        assert_eq!(header.position("name"), Some(1));
        assert_eq!(header.position("missing"), None);
    }

    #[test]
    fn test_row_conversions() {
        let header = Header::new(["dstport", "protocol"]);
        let record = StringRecord::from(vec![" 443 ", "TCP"]);
        let row = header.row(&record);
        assert_eq!(row.integer::<u16>("dstport"), Ok(443));
        assert_eq!(row.keyword("protocol").unwrap(), "tcp");

        let bad = StringRecord::from(vec!["https"]);
        let row = header.row(&bad);
        assert!(matches!(
            row.integer::<u16>("dstport"),
            Err(RecordError::InvalidInteger { field: "dstport", .. })
        ));
        assert_eq!(
            row.keyword("protocol"),
            Err(RecordError::MissingField { field: "protocol" })
        );
    }

    #[test]
    fn test_load_table_last_write_wins_and_skips_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "pairs.csv",
            "ID,Name,Comment\n1,One,first\nx,Bad,skip me\n2,Two,\n1,Uno,override\n",
        );

        let table = load_table::<PairTable>(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[&1], "uno");
        assert_eq!(table[&2], "two");
    }

    #[test]
    fn test_load_table_missing_column_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "pairs.csv", "id,label\n1,one\n");

        match load_table::<PairTable>(&path) {
            Err(FlowTagError::Schema { column, table, .. }) => {
                assert_eq!(column, "name");
                assert_eq!(table, "pair table");
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_table_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.csv");
        assert!(matches!(
            load_table::<PairTable>(&path),
            Err(FlowTagError::Configuration { .. })
        ));
    }

    /// Collects formatted log output from the current thread.
    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn run<T>(&self, f: impl FnOnce() -> T) -> T {
            let writer = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || writer.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .finish();
            tracing::subscriber::with_default(subscriber, f)
        }

        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_line_counter_maps_offsets_to_lines() {
        let mut counter = LineCounter::new("a\n\nbc\nd".as_bytes());
        let mut sink = Vec::new();
        counter.read_to_end(&mut sink).unwrap();

        assert_eq!(counter.line_at(0), 1);
        assert_eq!(counter.line_at(2), 2);
        assert_eq!(counter.line_at(4), 3);
        assert_eq!(counter.line_at(7), 4);
    }

    #[test]
    fn test_skipped_row_line_counts_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "pairs.csv", "id,name\n\n\nx,bad\n4,four\n");

        let logs = CapturedLogs::default();
        let table = logs.run(|| load_table::<PairTable>(&path)).unwrap();

        assert_eq!(table.len(), 1);
        assert!(logs.text().contains("line=4"), "logs: {}", logs.text());
    }

    #[test]
    fn test_undecodable_row_is_logged_without_stale_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.csv");
        std::fs::write(&path, b"id,name\n1,one\n2,\xff\xfe\n3,three\n").unwrap();

        let logs = CapturedLogs::default();
        let table = logs.run(|| load_table::<PairTable>(&path)).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table[&3], "three");
        let text = logs.text();
        assert!(text.contains("skipped row"), "logs: {text}");
        assert!(text.contains("line=3"), "logs: {text}");
        assert!(!text.contains("\"one\""), "logs: {text}");
    }

    #[test]
    fn test_load_table_short_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "pairs.csv", "id,name\n7\n8,eight\n");

        let table = load_table::<PairTable>(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[&8], "eight");
    }
}
