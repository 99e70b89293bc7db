//! SQL Server literal encoding for INSERT values.

use std::collections::HashSet;

use chrono::{NaiveDateTime, NaiveTime, Timelike};

use crate::catalog::{ColumnInfo, SemanticType};
use crate::error::{Result, SeedError};
use crate::value::SqlValue;

/// Literal emitted for every value of a sensitive column.
pub const OBFUSCATED_LITERAL: &str = "'OBFUSCATED'";

/// Literal for NULL.
pub const NULL_LITERAL: &str = "NULL";

/// (table, column) pairs whose text is never written to the script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensitiveColumns {
    pairs: HashSet<(String, String)>,
}

impl SensitiveColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `Table.Column` entries. The split is on the last `.`, so
    /// `dbo.Table.Column` names table `dbo.Table`.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        let mut set = Self::new();
        for entry in entries {
            let entry = entry.as_ref();
            match entry.rsplit_once('.') {
                Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                    set.insert(table, column);
                }
                _ => {
                    return Err(SeedError::Config(format!(
                        "sensitive column '{}' must be written as Table.Column",
                        entry
                    )))
                }
            }
        }
        Ok(set)
    }

    pub fn insert(&mut self, table: impl Into<String>, column: impl Into<String>) {
        self.pairs.insert((table.into(), column.into()));
    }

    pub fn contains(&self, table: &str, column: &str) -> bool {
        self.pairs
            .contains(&(table.to_string(), column.to_string()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Turns column values into SQL literal text.
#[derive(Debug, Clone, Copy)]
pub struct SqlLiteralEncoder<'a> {
    sensitive: &'a SensitiveColumns,
}

impl<'a> SqlLiteralEncoder<'a> {
    pub fn new(sensitive: &'a SensitiveColumns) -> Self {
        Self { sensitive }
    }

    /// Encode one value of `column` in `table`; `None` is NULL.
    pub fn encode(
        &self,
        table: &str,
        column: &ColumnInfo,
        value: Option<&SqlValue>,
    ) -> Result<String> {
        let value = match value {
            Some(v) => v,
            None if column.is_nullable() => return Ok(NULL_LITERAL.to_string()),
            None => {
                return Err(SeedError::IntegrityViolation {
                    table: table.to_string(),
                    column: column.name().to_string(),
                })
            }
        };

        let literal = match column.semantic_type() {
            SemanticType::String if self.sensitive.contains(table, column.name()) => {
                OBFUSCATED_LITERAL.to_string()
            }
            SemanticType::Unknown => match value {
                SqlValue::Text(s) => s.clone(),
                other => render(other),
            },
            _ => render(value),
        };
        Ok(literal)
    }
}

fn render(value: &SqlValue) -> String {
    match value {
        SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        SqlValue::U8(v) => v.to_string(),
        SqlValue::I16(v) => v.to_string(),
        SqlValue::I32(v) => v.to_string(),
        SqlValue::I64(v) => v.to_string(),
        SqlValue::F32(v) => v.to_string(),
        SqlValue::F64(v) => v.to_string(),
        SqlValue::Decimal(v) => v.to_string(),
        SqlValue::DateTime(v) => format!("'{}'", datetime_literal(v)),
        SqlValue::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
        SqlValue::Time(v) => format!("'{}'", time_literal(v)),
        SqlValue::Text(s) => quote_string(s),
    }
}

/// Wrap in single quotes, doubling embedded quotes.
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `yyyy-MM-ddTHH:mm:ss.fffffff`, or `.fff` when the last four digits are zero.
pub fn datetime_literal(value: &NaiveDateTime) -> String {
    format!(
        "{}.{}",
        value.format("%Y-%m-%dT%H:%M:%S"),
        fraction_digits(value.nanosecond())
    )
}

/// `HH:mm:ss.fffffff` with the same truncation rule as [`datetime_literal`].
pub fn time_literal(value: &NaiveTime) -> String {
    format!(
        "{}.{}",
        value.format("%H:%M:%S"),
        fraction_digits(value.nanosecond())
    )
}

/// SQL Server keeps 100ns ticks: seven fractional digits.
fn fraction_digits(nanos: u32) -> String {
    // leap seconds are encoded as nanos >= 1e9
    let ticks = (nanos % 1_000_000_000) / 100;
    if ticks % 10_000 == 0 {
        format!("{:03}", ticks / 10_000)
    } else {
        format!("{:07}", ticks)
    }
}
