//! Row sources: one-row-at-a-time cursors over a table's data.
//!
//! Two variants exist behind [`RowSource`]:
//!
//! - [`LiveQueryRowSource`]: runs `select ... from <table>` on the source
//!   connection and streams the result
//! - [`CsvFileRowSource`]: reads `<table>.csv` from a snapshot directory
//!
//! The generator picks one through [`SourceMode`] and otherwise treats them
//! identically.

mod csv;
mod live;

pub use self::csv::CsvFileRowSource;
pub use self::live::LiveQueryRowSource;

use std::path::PathBuf;

use crate::catalog::{ColumnCatalog, ColumnInfo};
use crate::error::{Result, SeedError};
use crate::value::SqlValue;

/// Sequential cursor over one table.
///
/// Lifecycle: `initialize` once, `advance` until it returns `false`, then
/// `finalize`. `is_null` and `get_value` are only valid while a row is
/// loaded. Dropping the source releases anything `finalize` would have.
pub trait RowSource {
    /// Open the underlying cursor for `table`, reading `columns` in order.
    fn initialize(&mut self, table: &str, columns: &[ColumnInfo]) -> Result<()>;

    /// Load the next row. Returns `false` once the data is exhausted.
    fn advance(&mut self) -> Result<bool>;

    /// Whether `column` is NULL in the loaded row.
    fn is_null(&self, column: &str) -> Result<bool>;

    /// Typed value of `column` in the loaded row.
    fn get_value(&self, column: &str) -> Result<SqlValue>;

    /// Release the cursor-scoped resource (query stream or file handle).
    fn finalize(&mut self) -> Result<()>;
}

/// Where row data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMode {
    /// Query the tables on the source connection.
    Live,
    /// Read `<table>.csv` files from a directory.
    Csv { directory: PathBuf },
}

/// Backend the generator resolves columns and live rows from.
pub trait DataSource: ColumnCatalog {
    /// A fresh live-query row source borrowing this backend.
    fn live_rows(&mut self) -> Result<Box<dyn RowSource + '_>>;
}

/// Open the row source selected by `mode`.
pub fn open_row_source<'a, D: DataSource + ?Sized>(
    mode: &SourceMode,
    backend: &'a mut D,
) -> Result<Box<dyn RowSource + 'a>> {
    match mode {
        SourceMode::Live => backend.live_rows(),
        SourceMode::Csv { directory } => Ok(Box::new(CsvFileRowSource::new(directory.clone()))),
    }
}

/// Position of a row source in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CursorState {
    Uninitialized,
    Ready,
    Loaded,
    Exhausted,
    Finalized,
}

impl CursorState {
    /// Fails unless a row is currently loaded.
    pub(crate) fn require_row(self) -> Result<()> {
        match self {
            CursorState::Loaded => Ok(()),
            other => Err(SeedError::InvalidState(format!(
                "no current row loaded (state: {:?})",
                other
            ))),
        }
    }

    /// Fails unless the source has been initialized and not finalized.
    pub(crate) fn require_open(self) -> Result<()> {
        match self {
            CursorState::Ready | CursorState::Loaded | CursorState::Exhausted => Ok(()),
            other => Err(SeedError::InvalidState(format!(
                "row source is not open (state: {:?})",
                other
            ))),
        }
    }

    /// Fails unless the source has not been initialized yet.
    pub(crate) fn require_uninitialized(self) -> Result<()> {
        match self {
            CursorState::Uninitialized => Ok(()),
            other => Err(SeedError::InvalidState(format!(
                "row source already initialized (state: {:?})",
                other
            ))),
        }
    }
}

/// Look up a column descriptor by name.
pub(crate) fn find_column<'c>(columns: &'c [ColumnInfo], name: &str) -> Result<&'c ColumnInfo> {
    columns
        .iter()
        .find(|c| c.name() == name)
        .ok_or_else(|| SeedError::InvalidState(format!("unknown column {}", name)))
}
