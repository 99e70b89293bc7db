//! Row source streaming a `select` over the source connection.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use tiberius::{ColumnData, FromSql, Row};
use tokio::runtime::Runtime;
use tracing::debug;

use super::{find_column, CursorState, DataSource, RowSource};
use crate::catalog::{ColumnInfo, SemanticType};
use crate::connection::{MssqlClient, MssqlConnection};
use crate::error::{Result, SeedError};
use crate::value::SqlValue;

/// Quote an identifier with square brackets, doubling any `]`.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `select [a], [b] from <table>` in the given column order.
pub fn select_statement(table: &str, columns: &[ColumnInfo]) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c.name()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("select {} from {}", cols, table)
}

/// Streams the rows of one table from the source connection.
///
/// The connection is borrowed, not owned: finalizing or dropping the source
/// ends the query stream and leaves the connection open for the next table.
pub struct LiveQueryRowSource<'c> {
    runtime: &'c Runtime,
    client: Option<&'c mut MssqlClient>,
    rows: Option<BoxStream<'c, std::result::Result<Row, tiberius::error::Error>>>,
    current: Option<Row>,
    table: String,
    columns: Vec<ColumnInfo>,
    state: CursorState,
}

impl<'c> LiveQueryRowSource<'c> {
    pub fn new(connection: &'c mut MssqlConnection) -> Self {
        let (runtime, client) = connection.parts();
        Self {
            runtime,
            client: Some(client),
            rows: None,
            current: None,
            table: String::new(),
            columns: Vec::new(),
            state: CursorState::Uninitialized,
        }
    }

    fn row(&self) -> Result<&Row> {
        self.state.require_row()?;
        self.current
            .as_ref()
            .ok_or_else(|| SeedError::InvalidState("no current row loaded".to_string()))
    }

    fn release(&mut self) {
        self.current = None;
        self.rows = None;
    }
}

impl<'c> RowSource for LiveQueryRowSource<'c> {
    fn initialize(&mut self, table: &str, columns: &[ColumnInfo]) -> Result<()> {
        self.state.require_uninitialized()?;
        let client = self.client.take().ok_or_else(|| {
            SeedError::InvalidState("connection already in use by this row source".to_string())
        })?;

        let sql = select_statement(table, columns);
        debug!("Executing: {}", sql);

        let stream = self
            .runtime
            .block_on(client.simple_query(sql))
            .map_err(|e| SeedError::resource(format!("query on {}", table), e.to_string()))?;

        self.rows = Some(stream.into_row_stream());
        self.table = table.to_string();
        self.columns = columns.to_vec();
        self.state = CursorState::Ready;
        Ok(())
    }

    fn advance(&mut self) -> Result<bool> {
        self.state.require_open()?;
        if self.state == CursorState::Exhausted {
            return Ok(false);
        }

        let next = match self.rows.as_mut() {
            Some(rows) => self.runtime.block_on(rows.try_next())?,
            None => None,
        };

        match next {
            Some(row) => {
                self.current = Some(row);
                self.state = CursorState::Loaded;
                Ok(true)
            }
            None => {
                self.current = None;
                self.state = CursorState::Exhausted;
                Ok(false)
            }
        }
    }

    fn is_null(&self, column: &str) -> Result<bool> {
        let row = self.row()?;
        Ok(is_null_cell(find_cell(row, column)?))
    }

    fn get_value(&self, column: &str) -> Result<SqlValue> {
        let row = self.row()?;
        let info = find_column(&self.columns, column)?;
        decode_cell(find_cell(row, column)?, info)?.ok_or_else(|| {
            SeedError::InvalidState(format!("column {} is NULL; check is_null first", column))
        })
    }

    fn finalize(&mut self) -> Result<()> {
        self.release();
        if self.state != CursorState::Finalized {
            debug!("Closed query stream for {}", self.table);
        }
        self.state = CursorState::Finalized;
        Ok(())
    }
}

impl Drop for LiveQueryRowSource<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl DataSource for MssqlConnection {
    fn live_rows(&mut self) -> Result<Box<dyn RowSource + '_>> {
        Ok(Box::new(LiveQueryRowSource::new(self)))
    }
}

fn find_cell<'r>(row: &'r Row, column: &str) -> Result<&'r ColumnData<'static>> {
    row.cells()
        .find(|(col, _)| col.name() == column)
        .map(|(_, data)| data)
        .ok_or_else(|| SeedError::InvalidState(format!("column {} not in result set", column)))
}

/// Decode a cell by its column's semantic type; `None` for NULL.
fn decode_cell(cell: &ColumnData<'static>, column: &ColumnInfo) -> Result<Option<SqlValue>> {
    let value = match column.semantic_type() {
        SemanticType::Bool => bool::from_sql(cell)?.map(SqlValue::Bool),
        SemanticType::Byte => u8::from_sql(cell)?.map(SqlValue::U8),
        SemanticType::Int16 => i16::from_sql(cell)?.map(SqlValue::I16),
        SemanticType::Int32 => i32::from_sql(cell)?.map(SqlValue::I32),
        SemanticType::Int64 => i64::from_sql(cell)?.map(SqlValue::I64),
        SemanticType::Float32 => f32::from_sql(cell)?.map(SqlValue::F32),
        SemanticType::Float64 => f64::from_sql(cell)?.map(SqlValue::F64),
        SemanticType::Decimal => decode_decimal(cell, column)?,
        SemanticType::DateTime => NaiveDateTime::from_sql(cell)?
            .map(|dt| SqlValue::DateTime(round_legacy_datetime(column, dt))),
        SemanticType::Date => NaiveDate::from_sql(cell)?.map(SqlValue::Date),
        SemanticType::Time => NaiveTime::from_sql(cell)?.map(SqlValue::Time),
        SemanticType::String => <&str>::from_sql(cell)?.map(SqlValue::from),
        SemanticType::Unknown => cell_text(cell, column)?.map(SqlValue::Text),
    };
    Ok(value)
}

/// datetime and smalldatetime tick in 1/300 s, so a stored `.123` comes back
/// as `.1233333`. Round those to whole milliseconds; datetime2 is exact.
fn round_legacy_datetime(column: &ColumnInfo, value: NaiveDateTime) -> NaiveDateTime {
    let source_type = column.source_type();
    if !source_type.eq_ignore_ascii_case("datetime")
        && !source_type.eq_ignore_ascii_case("smalldatetime")
    {
        return value;
    }
    let nanos = i64::from(value.nanosecond());
    let rounded = (nanos + 500_000) / 1_000_000 * 1_000_000;
    value
        .checked_add_signed(TimeDelta::nanoseconds(rounded - nanos))
        .unwrap_or(value)
}

/// money and smallmoney always carry four decimal places.
const MONEY_SCALE: u32 = 4;

/// decimal/numeric arrive as `Numeric`; money/smallmoney arrive as floats.
fn decode_decimal(cell: &ColumnData<'static>, column: &ColumnInfo) -> Result<Option<SqlValue>> {
    match cell {
        ColumnData::F64(v) => v.map(|f| money_value(column.name(), f)).transpose(),
        ColumnData::F32(v) => v
            .map(|f| money_value(column.name(), f64::from(f)))
            .transpose(),
        _ => Ok(Decimal::from_sql(cell)?.map(SqlValue::Decimal)),
    }
}

fn money_value(name: &str, f: f64) -> Result<SqlValue> {
    let mut value = Decimal::try_from(f)
        .map_err(|e| SeedError::parse(name, f.to_string(), e))?
        .round_dp(MONEY_SCALE);
    value.rescale(MONEY_SCALE);
    Ok(SqlValue::Decimal(value))
}

fn is_null_cell(data: &ColumnData<'_>) -> bool {
    match data {
        ColumnData::U8(v) => v.is_none(),
        ColumnData::I16(v) => v.is_none(),
        ColumnData::I32(v) => v.is_none(),
        ColumnData::I64(v) => v.is_none(),
        ColumnData::F32(v) => v.is_none(),
        ColumnData::F64(v) => v.is_none(),
        ColumnData::Bit(v) => v.is_none(),
        ColumnData::String(v) => v.is_none(),
        ColumnData::Guid(v) => v.is_none(),
        ColumnData::Binary(v) => v.is_none(),
        ColumnData::Numeric(v) => v.is_none(),
        ColumnData::Xml(v) => v.is_none(),
        ColumnData::DateTime(v) => v.is_none(),
        ColumnData::SmallDateTime(v) => v.is_none(),
        ColumnData::Time(v) => v.is_none(),
        ColumnData::Date(v) => v.is_none(),
        ColumnData::DateTime2(v) => v.is_none(),
        ColumnData::DateTimeOffset(v) => v.is_none(),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// Best-effort text for a column of unknown type.
fn cell_text(data: &ColumnData<'static>, column: &ColumnInfo) -> Result<Option<String>> {
    let text = match data {
        ColumnData::U8(v) => v.map(|v| v.to_string()),
        ColumnData::I16(v) => v.map(|v| v.to_string()),
        ColumnData::I32(v) => v.map(|v| v.to_string()),
        ColumnData::I64(v) => v.map(|v| v.to_string()),
        ColumnData::F32(v) => v.map(|v| v.to_string()),
        ColumnData::F64(v) => v.map(|v| v.to_string()),
        ColumnData::Bit(v) => v.map(|b| if b { "1" } else { "0" }.to_string()),
        ColumnData::String(v) => v.as_ref().map(|s| s.to_string()),
        ColumnData::Guid(v) => v.as_ref().map(|g| g.to_string()),
        ColumnData::Numeric(v) => v.as_ref().map(|n| n.to_string()),
        ColumnData::Xml(v) => v.as_ref().map(|xml| xml.to_string()),
        ColumnData::DateTimeOffset(_) => {
            DateTime::<FixedOffset>::from_sql(data)?.map(|dt| dt.to_string())
        }
        ColumnData::Binary(v) => v.as_ref().map(|bytes| {
            let mut hex = String::with_capacity(2 + bytes.len() * 2);
            hex.push_str("0x");
            for b in bytes.iter() {
                hex.push_str(&format!("{:02X}", b));
            }
            hex
        }),
        other if is_null_cell(other) => None,
        _ => {
            return Err(SeedError::UnsupportedType {
                column: column.name().to_string(),
                source_type: column.source_type().to_string(),
            })
        }
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{SensitiveColumns, SqlLiteralEncoder};
    use crate::source::csv::decode_field;
    use std::borrow::Cow;
    use tiberius::time::{Date, DateTime2, DateTimeOffset, Time};
    use tiberius::xml::XmlData;

    /// Encode a live cell and a CSV field of the same column side by side.
    fn encode_both(column: &ColumnInfo, cell: ColumnData<'static>, raw: &str) -> (String, String) {
        let none = SensitiveColumns::new();
        let encoder = SqlLiteralEncoder::new(&none);
        let live = decode_cell(&cell, column).unwrap();
        let csv = decode_field(column, raw).unwrap();
        (
            encoder.encode("T", column, live.as_ref()).unwrap(),
            encoder.encode("T", column, Some(&csv)).unwrap(),
        )
    }

    /// tiberius `datetime` cell: days since 1900-01-01 and 1/300 s fragments.
    fn legacy_datetime(h: u32, m: u32, s: u32, fragments: u32) -> ColumnData<'static> {
        let seconds = (h * 60 + m) * 60 + s;
        ColumnData::DateTime(Some(tiberius::time::DateTime::new(0, seconds * 300 + fragments)))
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Name"), "[Name]");
        assert_eq!(quote_ident("odd]name"), "[odd]]name]");
    }

    #[test]
    fn test_select_statement_in_catalog_order() {
        let columns = vec![
            ColumnInfo::new("Id", "int", false, true),
            ColumnInfo::new("Order", "nvarchar", true, false),
        ];
        assert_eq!(
            select_statement("dbo.Item", &columns),
            "select [Id], [Order] from dbo.Item"
        );
    }

    #[test]
    fn test_null_cells() {
        assert!(is_null_cell(&ColumnData::I32(None)));
        assert!(!is_null_cell(&ColumnData::I32(Some(0))));
        assert!(is_null_cell(&ColumnData::String(None)));
        assert!(!is_null_cell(&ColumnData::String(Some(Cow::Borrowed("")))));
    }

    #[test]
    fn test_cell_text_best_effort() {
        let col = ColumnInfo::new("Blob", "varbinary", true, false);
        assert_eq!(
            cell_text(&ColumnData::Binary(Some(Cow::Owned(vec![0x0A, 0xFF]))), &col).unwrap(),
            Some("0x0AFF".to_string())
        );
        assert_eq!(
            cell_text(&ColumnData::Bit(Some(true)), &col).unwrap(),
            Some("1".to_string())
        );
        assert_eq!(cell_text(&ColumnData::Binary(None), &col).unwrap(), None);
    }

    #[test]
    fn test_cell_text_xml_and_datetimeoffset() {
        let col = ColumnInfo::new("Doc", "xml", true, false);
        assert_eq!(
            cell_text(&ColumnData::Xml(Some(Cow::Owned(XmlData::new("<a>1</a>")))), &col).unwrap(),
            Some("<a>1</a>".to_string())
        );
        assert_eq!(cell_text(&ColumnData::Xml(None), &col).unwrap(), None);

        let col = ColumnInfo::new("At", "datetimeoffset", true, false);
        let dto = DateTimeOffset::new(DateTime2::new(Date::new(0), Time::new(0, 7)), 60);
        let text = cell_text(&ColumnData::DateTimeOffset(Some(dto)), &col)
            .unwrap()
            .unwrap();
        assert!(text.ends_with("+01:00"), "{}", text);
    }

    #[test]
    fn test_legacy_datetime_rounds_to_milliseconds() {
        let datetime = ColumnInfo::new("At", "datetime", false, false);
        // 37 fragments is .1233333s on the wire
        let value = decode_cell(&legacy_datetime(4, 5, 6, 37), &datetime)
            .unwrap()
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(1900, 1, 1)
            .unwrap()
            .and_hms_milli_opt(4, 5, 6, 123)
            .unwrap();
        assert_eq!(value, SqlValue::DateTime(expected));

        // 299 fragments is .9966666s
        let value = decode_cell(&legacy_datetime(0, 0, 0, 299), &datetime)
            .unwrap()
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(1900, 1, 1)
            .unwrap()
            .and_hms_milli_opt(0, 0, 0, 997)
            .unwrap();
        assert_eq!(value, SqlValue::DateTime(expected));
    }

    #[test]
    fn test_rounding_carries_into_next_second() {
        let datetime = ColumnInfo::new("At", "smalldatetime", false, false);
        let day = NaiveDate::from_ymd_opt(2024, 2, 3).unwrap();
        let rounded = round_legacy_datetime(
            &datetime,
            day.and_hms_nano_opt(23, 59, 59, 999_700_000).unwrap(),
        );
        assert_eq!(
            rounded,
            NaiveDate::from_ymd_opt(2024, 2, 4)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );

        let datetime2 = ColumnInfo::new("At", "datetime2", false, false);
        let exact = day.and_hms_nano_opt(4, 5, 6, 123_456_700).unwrap();
        assert_eq!(round_legacy_datetime(&datetime2, exact), exact);
    }

    #[test]
    fn test_money_keeps_four_decimal_places() {
        let money = ColumnInfo::new("Price", "money", false, false);
        let value = decode_cell(&ColumnData::F64(Some(12.5)), &money)
            .unwrap()
            .unwrap();
        assert_eq!(value, SqlValue::Decimal(Decimal::new(125_000, 4)));

        let smallmoney = ColumnInfo::new("Fee", "smallmoney", true, false);
        let value = decode_cell(&ColumnData::F64(Some(0.1)), &smallmoney)
            .unwrap()
            .unwrap();
        match value {
            SqlValue::Decimal(d) => assert_eq!(d.to_string(), "0.1000"),
            other => panic!("expected decimal, got {:?}", other),
        }
        assert_eq!(decode_cell(&ColumnData::F64(None), &money).unwrap(), None);
    }

    #[test]
    fn test_live_and_csv_literals_match() {
        let datetime = ColumnInfo::new("At", "datetime", false, false);
        let (live, csv) = encode_both(
            &datetime,
            legacy_datetime(4, 5, 6, 37),
            "1900-01-01 04:05:06.123",
        );
        assert_eq!(live, "'1900-01-01T04:05:06.123'");
        assert_eq!(live, csv);

        let money = ColumnInfo::new("Price", "money", false, false);
        let (live, csv) = encode_both(&money, ColumnData::F64(Some(12.5)), "12.5000");
        assert_eq!(live, "12.5000");
        assert_eq!(live, csv);
    }
}
