//! # mssql-seed
//!
//! Generates SQL Server seed scripts (`delete` and `insert` statements) that
//! reproduce the contents of a list of tables.
//!
//! Row data comes either from the live tables or from CSV snapshots exported
//! earlier, through the same pipeline:
//!
//! - **Column catalog** resolves column names, types, nullability and identity
//! - **Row sources** stream one row at a time from a query or a `.csv` file
//! - **Literal encoder** turns typed values into SQL Server literals, with
//!   obfuscation of sensitive text columns
//! - **Statement generator** orders deletes, brackets identity inserts and
//!   writes the script
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_seed::{Config, MssqlConnection, SqlLiteralEncoder, StatementGenerator};
//!
//! fn main() -> mssql_seed::Result<()> {
//!     let config = Config::load("seed.yaml")?;
//!     config.validate()?;
//!
//!     let options = config.generate_options()?;
//!     let sensitive = config.sensitive_columns()?;
//!     let generator = StatementGenerator::new(&options, SqlLiteralEncoder::new(&sensitive));
//!
//!     let mut connection = MssqlConnection::connect(&config.source)?;
//!     let summary = generator.generate(&mut connection, &mut std::io::stdout().lock())?;
//!     eprintln!("{} rows scripted", summary.total_rows());
//!     connection.close()
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod connection;
pub mod encoder;
pub mod error;
pub mod generator;
pub mod source;
pub mod tokenizer;
pub mod value;

// Re-exports for convenient access
pub use catalog::{ColumnCatalog, ColumnInfo, SemanticType};
pub use config::{Config, GenerationConfig, SourceConfig, SourceKind};
pub use connection::MssqlConnection;
pub use encoder::{SensitiveColumns, SqlLiteralEncoder};
pub use error::{Result, SeedError};
pub use generator::{GenerateOptions, GenerationSummary, StatementGenerator, TableSummary};
pub use source::{CsvFileRowSource, DataSource, LiveQueryRowSource, RowSource, SourceMode};
pub use value::SqlValue;
