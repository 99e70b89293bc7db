//! Row source reading `<table>.csv` snapshots.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;

use chrono::{NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use tracing::debug;

use super::{find_column, CursorState, RowSource};
use crate::catalog::{ColumnInfo, SemanticType};
use crate::error::{Result, SeedError};
use crate::tokenizer::tokenize;
use crate::value::SqlValue;

/// Raw field text that stands for NULL, as written by SSMS and bcp exports.
pub const NULL_TOKEN: &str = "NULL";

const UTF8_BOM: char = '\u{feff}';

/// Reads rows from `<directory>/<table>.csv`.
///
/// If every token on the first line is a known column name, the line is a
/// header and fields are looked up by name. Otherwise the file has no header,
/// its columns are assumed to be in catalog order, and the first line is
/// replayed as the first row. A data row whose values all happen to equal
/// column names is therefore mistaken for a header.
pub struct CsvFileRowSource {
    directory: PathBuf,
    table: String,
    columns: Vec<ColumnInfo>,
    positions: HashMap<String, usize>,
    lines: Option<Lines<BufReader<File>>>,
    pending: Option<Vec<String>>,
    current: Vec<String>,
    state: CursorState,
}

impl CsvFileRowSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            table: String::new(),
            columns: Vec::new(),
            positions: HashMap::new(),
            lines: None,
            pending: None,
            current: Vec::new(),
            state: CursorState::Uninitialized,
        }
    }

    /// Path of the snapshot file for `table`.
    pub fn file_path(&self, table: &str) -> PathBuf {
        self.directory.join(format!("{}.csv", table))
    }

    fn raw(&self, column: &str) -> Result<&str> {
        self.state.require_row()?;
        let position = *self
            .positions
            .get(column)
            .ok_or_else(|| SeedError::InvalidState(format!("unknown column {}", column)))?;
        self.current
            .get(position)
            .map(String::as_str)
            .ok_or_else(|| SeedError::MissingField {
                column: column.to_string(),
                position: position + 1,
                fields: self.current.len(),
            })
    }

    fn release(&mut self) {
        self.lines = None;
        self.pending = None;
        self.current.clear();
    }
}

impl RowSource for CsvFileRowSource {
    fn initialize(&mut self, table: &str, columns: &[ColumnInfo]) -> Result<()> {
        self.state.require_uninitialized()?;

        let path = self.file_path(table);
        let file = File::open(&path)
            .map_err(|e| SeedError::resource(path.display().to_string(), e.to_string()))?;
        let mut lines = BufReader::new(file).lines();

        let first = match lines.next() {
            Some(line) => line
                .map_err(|e| SeedError::resource(path.display().to_string(), e.to_string()))?,
            None => {
                return Err(SeedError::resource(
                    path.display().to_string(),
                    "unable to read first line from file",
                ))
            }
        };
        let first = first.strip_prefix(UTF8_BOM).unwrap_or(&first);
        let tokens = tokenize(first).map_err(|e| SeedError::from(e).at_row(table, 1, None))?;

        let is_header = tokens
            .iter()
            .all(|token| columns.iter().any(|c| c.name() == token));

        self.positions.clear();
        if is_header {
            for (idx, token) in tokens.iter().enumerate() {
                self.positions.insert(token.clone(), idx);
            }
            if let Some(missing) = columns
                .iter()
                .find(|c| !self.positions.contains_key(c.name()))
            {
                return Err(SeedError::Config(format!(
                    "{} has a header row without column {}",
                    path.display(),
                    missing.name()
                )));
            }
            debug!("{}: header row maps {} columns", path.display(), tokens.len());
        } else {
            for (idx, column) in columns.iter().enumerate() {
                self.positions.insert(column.name().to_string(), idx);
            }
            self.pending = Some(tokens);
            debug!("{}: no header row, using catalog column order", path.display());
        }

        self.table = table.to_string();
        self.columns = columns.to_vec();
        self.lines = Some(lines);
        self.state = CursorState::Ready;
        Ok(())
    }

    fn advance(&mut self) -> Result<bool> {
        self.state.require_open()?;
        if self.state == CursorState::Exhausted {
            return Ok(false);
        }

        if let Some(row) = self.pending.take() {
            self.current = row;
            self.state = CursorState::Loaded;
            return Ok(true);
        }

        let next = match self.lines.as_mut() {
            Some(lines) => lines.next(),
            None => None,
        };

        match next {
            Some(line) => {
                self.current = tokenize(&line?)?;
                self.state = CursorState::Loaded;
                Ok(true)
            }
            None => {
                self.current.clear();
                self.state = CursorState::Exhausted;
                Ok(false)
            }
        }
    }

    fn is_null(&self, column: &str) -> Result<bool> {
        Ok(self.raw(column)? == NULL_TOKEN)
    }

    fn get_value(&self, column: &str) -> Result<SqlValue> {
        let raw = self.raw(column)?;
        let info = find_column(&self.columns, column)?;
        decode_field(info, raw)
    }

    fn finalize(&mut self) -> Result<()> {
        self.release();
        if self.state != CursorState::Finalized {
            debug!("Closed {}", self.file_path(&self.table).display());
        }
        self.state = CursorState::Finalized;
        Ok(())
    }
}

impl Drop for CsvFileRowSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Decode one raw field according to the column's semantic type.
pub fn decode_field(column: &ColumnInfo, raw: &str) -> Result<SqlValue> {
    let name = column.name();
    let parse_err = |e: &dyn std::fmt::Display| SeedError::parse(name, raw, e);

    match column.semantic_type() {
        SemanticType::Int64 => raw.parse().map(SqlValue::I64).map_err(|e| parse_err(&e)),
        SemanticType::Int32 => raw.parse().map(SqlValue::I32).map_err(|e| parse_err(&e)),
        SemanticType::Int16 => raw.parse().map(SqlValue::I16).map_err(|e| parse_err(&e)),
        SemanticType::Byte => raw.parse().map(SqlValue::U8).map_err(|e| parse_err(&e)),
        SemanticType::Float64 => parse_finite::<f64>(raw)
            .map(SqlValue::F64)
            .map_err(|e| parse_err(&e)),
        SemanticType::Float32 => parse_finite::<f32>(raw)
            .map(SqlValue::F32)
            .map_err(|e| parse_err(&e)),
        SemanticType::Decimal => raw
            .parse::<Decimal>()
            .map(SqlValue::Decimal)
            .map_err(|e| parse_err(&e)),
        SemanticType::Bool => parse_bool(raw)
            .map(SqlValue::Bool)
            .ok_or_else(|| parse_err(&"expected 1, 0, true or false")),
        SemanticType::DateTime => parse_datetime(column, raw).map(SqlValue::DateTime),
        SemanticType::Date | SemanticType::Time => Err(SeedError::UnsupportedType {
            column: name.to_string(),
            source_type: column.source_type().to_string(),
        }),
        SemanticType::String | SemanticType::Unknown => Ok(SqlValue::from(raw)),
    }
}

/// float/real text; NaN and infinities have no SQL literal.
fn parse_finite<F>(raw: &str) -> std::result::Result<F, String>
where
    F: std::str::FromStr + Into<f64> + Copy,
    F::Err: std::fmt::Display,
{
    let value: F = raw.parse().map_err(|e: F::Err| e.to_string())?;
    if value.into().is_finite() {
        Ok(value)
    } else {
        Err("expected a finite number".to_string())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" => Some(true),
        "0" => Some(false),
        _ if raw.eq_ignore_ascii_case("true") => Some(true),
        _ if raw.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Parse `yyyy-MM-dd HH:mm:ss.fff` (datetime, smalldatetime) or
/// `yyyy-MM-dd HH:mm:ss.fffffff` (datetime2).
fn parse_datetime(column: &ColumnInfo, raw: &str) -> Result<NaiveDateTime> {
    let width: u32 = if column.source_type().eq_ignore_ascii_case("datetime2") {
        7
    } else {
        3
    };
    let invalid = |message: String| SeedError::parse(column.name(), raw, message);

    let (base, fraction) = raw
        .split_once('.')
        .ok_or_else(|| invalid(format!("expected {} fractional second digits", width)))?;
    if fraction.len() != width as usize || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!(
            "expected {} fractional second digits, found '{}'",
            width, fraction
        )));
    }

    let base = NaiveDateTime::parse_from_str(base, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| invalid(e.to_string()))?;
    let digits: u32 = fraction.parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
    let nanos = digits * 10u32.pow(9 - width);

    base.with_nanosecond(nanos)
        .ok_or_else(|| invalid(format!("invalid fractional seconds {}", fraction)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use std::path::Path;

    fn write_csv(dir: &Path, table: &str, content: &str) {
        let mut file = File::create(dir.join(format!("{}.csv", table))).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn columns() -> Vec<ColumnInfo> {
        vec![
            ColumnInfo::new("Id", "int", false, true),
            ColumnInfo::new("Name", "nvarchar", true, false),
        ]
    }

    #[test]
    fn test_header_row_maps_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "Person", "Name,Id\nAda,1\nNULL,2\n");

        let mut source = CsvFileRowSource::new(dir.path());
        source.initialize("Person", &columns()).unwrap();

        assert!(source.advance().unwrap());
        assert_eq!(source.get_value("Id").unwrap(), SqlValue::I32(1));
        assert_eq!(source.get_value("Name").unwrap(), SqlValue::Text("Ada".into()));

        assert!(source.advance().unwrap());
        assert!(source.is_null("Name").unwrap());
        assert!(!source.is_null("Id").unwrap());

        assert!(!source.advance().unwrap());
        assert!(!source.advance().unwrap());
        source.finalize().unwrap();
    }

    #[test]
    fn test_headerless_file_replays_first_line() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "Person", "1,Ada\n2,\"Lovelace, A\"\n");

        let mut source = CsvFileRowSource::new(dir.path());
        source.initialize("Person", &columns()).unwrap();

        assert!(source.advance().unwrap());
        assert_eq!(source.get_value("Name").unwrap(), SqlValue::Text("Ada".into()));
        assert!(source.advance().unwrap());
        assert_eq!(source.get_value("Id").unwrap(), SqlValue::I32(2));
        assert_eq!(
            source.get_value("Name").unwrap(),
            SqlValue::Text("Lovelace, A".into())
        );
        assert!(!source.advance().unwrap());
    }

    #[test]
    fn test_bom_is_stripped_from_header() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "Person", "\u{feff}Id,Name\r\n5,Bo\r\n");

        let mut source = CsvFileRowSource::new(dir.path());
        source.initialize("Person", &columns()).unwrap();
        assert!(source.advance().unwrap());
        assert_eq!(source.get_value("Id").unwrap(), SqlValue::I32(5));
        assert_eq!(source.get_value("Name").unwrap(), SqlValue::Text("Bo".into()));
    }

    #[test]
    fn test_values_require_loaded_row() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "Person", "Id,Name\n");

        let mut source = CsvFileRowSource::new(dir.path());
        assert!(matches!(source.advance(), Err(SeedError::InvalidState(_))));
        source.initialize("Person", &columns()).unwrap();
        assert!(matches!(source.is_null("Id"), Err(SeedError::InvalidState(_))));
        assert!(!source.advance().unwrap());
        assert!(matches!(source.get_value("Id"), Err(SeedError::InvalidState(_))));
        assert!(matches!(
            source.initialize("Person", &columns()),
            Err(SeedError::InvalidState(_))
        ));
    }

    #[test]
    fn test_missing_file_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = CsvFileRowSource::new(dir.path());
        assert!(matches!(
            source.initialize("Nope", &columns()),
            Err(SeedError::Resource { .. })
        ));
    }

    #[test]
    fn test_empty_file_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "Person", "");
        let mut source = CsvFileRowSource::new(dir.path());
        assert!(matches!(
            source.initialize("Person", &columns()),
            Err(SeedError::Resource { .. })
        ));
    }

    #[test]
    fn test_header_missing_catalog_column() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "Person", "Id\n1\n");
        let mut source = CsvFileRowSource::new(dir.path());
        assert!(matches!(
            source.initialize("Person", &columns()),
            Err(SeedError::Config(_))
        ));
    }

    #[test]
    fn test_short_row_is_missing_field() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "Person", "1\n");
        let mut source = CsvFileRowSource::new(dir.path());
        source.initialize("Person", &columns()).unwrap();
        assert!(source.advance().unwrap());
        assert!(matches!(
            source.get_value("Name"),
            Err(SeedError::MissingField { position: 2, fields: 1, .. })
        ));
    }

    #[test]
    fn test_malformed_line_fails_advance() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "Person", "Id,Name\n1,\"open\n");
        let mut source = CsvFileRowSource::new(dir.path());
        source.initialize("Person", &columns()).unwrap();
        assert!(matches!(source.advance(), Err(SeedError::Tokenize(_))));
    }

    #[test]
    fn test_decode_numbers_and_bools() {
        let col = |t: &str| ColumnInfo::new("C", t, true, false);
        assert_eq!(decode_field(&col("bigint"), "-9").unwrap(), SqlValue::I64(-9));
        assert_eq!(decode_field(&col("smallint"), "12").unwrap(), SqlValue::I16(12));
        assert_eq!(decode_field(&col("tinyint"), "255").unwrap(), SqlValue::U8(255));
        assert_eq!(decode_field(&col("float"), "1.25").unwrap(), SqlValue::F64(1.25));
        assert_eq!(decode_field(&col("real"), "0.5").unwrap(), SqlValue::F32(0.5));
        assert_eq!(
            decode_field(&col("money"), "12.5000").unwrap(),
            SqlValue::Decimal("12.5000".parse().unwrap())
        );
        assert_eq!(decode_field(&col("bit"), "1").unwrap(), SqlValue::Bool(true));
        assert_eq!(decode_field(&col("bit"), "False").unwrap(), SqlValue::Bool(false));
        assert!(matches!(
            decode_field(&col("bit"), "yes"),
            Err(SeedError::Parse { .. })
        ));
        assert!(matches!(
            decode_field(&col("tinyint"), "256"),
            Err(SeedError::Parse { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_non_finite_floats() {
        for (source_type, raw) in [
            ("float", "NaN"),
            ("float", "inf"),
            ("float", "-infinity"),
            ("real", "NaN"),
            ("real", "1e39"),
        ] {
            let col = ColumnInfo::new("C", source_type, true, false);
            assert!(
                matches!(decode_field(&col, raw), Err(SeedError::Parse { .. })),
                "{} {}",
                source_type,
                raw
            );
        }
        let col = ColumnInfo::new("C", "float", true, false);
        assert_eq!(decode_field(&col, "-0.5e3").unwrap(), SqlValue::F64(-500.0));
    }

    #[test]
    fn test_decode_datetime_precision_by_subtype() {
        let datetime = ColumnInfo::new("At", "datetime", false, false);
        let datetime2 = ColumnInfo::new("At", "datetime2", false, false);
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_nano_opt(14, 5, 6, 123_000_000)
            .unwrap();

        assert_eq!(
            decode_field(&datetime, "2024-03-09 14:05:06.123").unwrap(),
            SqlValue::DateTime(expected)
        );
        assert_eq!(
            decode_field(&datetime2, "2024-03-09 14:05:06.1230000").unwrap(),
            SqlValue::DateTime(expected)
        );
        assert!(decode_field(&datetime, "2024-03-09 14:05:06.1230000").is_err());
        assert!(decode_field(&datetime2, "2024-03-09 14:05:06.123").is_err());
        assert!(decode_field(&datetime, "2024-03-09 14:05:06").is_err());
    }

    #[test]
    fn test_decode_date_and_time_unsupported() {
        for t in ["date", "time"] {
            let col = ColumnInfo::new("D", t, true, false);
            assert!(matches!(
                decode_field(&col, "2024-01-01"),
                Err(SeedError::UnsupportedType { .. })
            ));
        }
    }

    #[test]
    fn test_decode_text_is_verbatim() {
        let col = ColumnInfo::new("Note", "varchar", true, false);
        assert_eq!(
            decode_field(&col, " it's ").unwrap(),
            SqlValue::Text(" it's ".into())
        );
        let unknown = ColumnInfo::new("Key", "uniqueidentifier", true, false);
        assert_eq!(
            decode_field(&unknown, "abc").unwrap(),
            SqlValue::Text("abc".into())
        );
    }
}
