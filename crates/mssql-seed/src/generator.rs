//! Statement generation: deletes, identity brackets and inserts.
//!
//! Output order for tables `[A, B, C]` with deletes enabled:
//!
//! ```text
//! delete C
//! delete B
//! delete A
//! set identity_insert A on        -- only if A has an identity column
//! insert A (...) values (...)
//! set identity_insert A off
//! insert B (...) values (...)
//! ...
//! ```
//!
//! Deletes run child-to-parent when the tables are listed parent-to-child.

use std::io::Write;
use std::time::Instant;

use tracing::{debug, info};

use crate::catalog::{column_list, has_identity, ColumnInfo};
use crate::encoder::SqlLiteralEncoder;
use crate::error::Result;
use crate::source::{open_row_source, DataSource, RowSource, SourceMode};

/// What to generate.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Tables in parent-to-child order.
    pub tables: Vec<String>,

    /// Emit `delete <table>` lines before the inserts.
    pub include_deletes: bool,

    /// Where row data comes from.
    pub source: SourceMode,
}

/// Per-table outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub table: String,
    pub rows: u64,
    pub identity_insert: bool,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Default)]
pub struct GenerationSummary {
    pub deletes: usize,
    pub tables: Vec<TableSummary>,
    pub duration_seconds: f64,
}

impl GenerationSummary {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

pub fn delete_statement(table: &str) -> String {
    format!("delete {}", table)
}

pub fn identity_insert_statement(table: &str, enabled: bool) -> String {
    format!(
        "set identity_insert {} {}",
        table,
        if enabled { "on" } else { "off" }
    )
}

/// Drives row sources and writes the script line by line.
pub struct StatementGenerator<'a> {
    options: &'a GenerateOptions,
    encoder: SqlLiteralEncoder<'a>,
}

impl<'a> StatementGenerator<'a> {
    pub fn new(options: &'a GenerateOptions, encoder: SqlLiteralEncoder<'a>) -> Self {
        Self { options, encoder }
    }

    /// Write the whole script to `out`.
    ///
    /// Stops at the first error. Lines written before it stay written.
    pub fn generate<D, W>(&self, backend: &mut D, out: &mut W) -> Result<GenerationSummary>
    where
        D: DataSource + ?Sized,
        W: Write,
    {
        let start = Instant::now();
        let mut summary = GenerationSummary::default();

        if self.options.include_deletes {
            for table in self.options.tables.iter().rev() {
                writeln!(out, "{}", delete_statement(table))?;
                summary.deletes += 1;
            }
        }

        for table in &self.options.tables {
            let table_summary = self.generate_table(table, backend, out)?;
            summary.tables.push(table_summary);
        }

        out.flush()?;
        summary.duration_seconds = start.elapsed().as_secs_f64();
        info!(
            "Generated {} rows for {} tables in {:.2}s",
            summary.total_rows(),
            summary.tables.len(),
            summary.duration_seconds
        );
        Ok(summary)
    }

    fn generate_table<D, W>(&self, table: &str, backend: &mut D, out: &mut W) -> Result<TableSummary>
    where
        D: DataSource + ?Sized,
        W: Write,
    {
        let columns = backend.columns(table)?;
        let identity_insert = has_identity(&columns);
        debug!(
            "{}: {} columns, identity_insert={}",
            table,
            columns.len(),
            identity_insert
        );

        let prefix = format!("insert {} ({}) values (", table, column_list(&columns));

        let mut source = open_row_source(&self.options.source, backend)?;
        source.initialize(table, &columns)?;

        if identity_insert {
            writeln!(out, "{}", identity_insert_statement(table, true))?;
        }

        let mut rows = 0u64;
        loop {
            let ordinal = rows + 1;
            if !source
                .advance()
                .map_err(|e| e.at_row(table, ordinal, None))?
            {
                break;
            }
            let statement = self.insert_statement(&prefix, table, &columns, source.as_ref(), ordinal)?;
            writeln!(out, "{}", statement)?;
            rows = ordinal;
        }

        if identity_insert {
            writeln!(out, "{}", identity_insert_statement(table, false))?;
        }

        source.finalize()?;
        out.flush()?;
        info!("Generated {} inserts for {}", rows, table);

        Ok(TableSummary {
            table: table.to_string(),
            rows,
            identity_insert,
        })
    }

    fn insert_statement(
        &self,
        prefix: &str,
        table: &str,
        columns: &[ColumnInfo],
        source: &dyn RowSource,
        ordinal: u64,
    ) -> Result<String> {
        let mut sql = String::from(prefix);
        for (idx, column) in columns.iter().enumerate() {
            if idx > 0 {
                sql.push_str(", ");
            }
            let literal = self
                .encode_column(table, column, source)
                .map_err(|e| e.at_row(table, ordinal, Some(column.name())))?;
            sql.push_str(&literal);
        }
        sql.push(')');
        Ok(sql)
    }

    fn encode_column(&self, table: &str, column: &ColumnInfo, source: &dyn RowSource) -> Result<String> {
        if source.is_null(column.name())? {
            self.encoder.encode(table, column, None)
        } else {
            let value = source.get_value(column.name())?;
            self.encoder.encode(table, column, Some(&value))
        }
    }
}
