//! Error types for script generation.

use thiserror::Error;

use crate::tokenizer::TokenizeError;

/// Process exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Process exit code for database and resource errors.
pub const EXIT_SOURCE_ERROR: u8 = 2;
/// Process exit code for data errors found while reading rows.
pub const EXIT_DATA_ERROR: u8 = 3;
/// Process exit code for IO errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for script generation.
#[derive(Error, Debug)]
pub enum SeedError {
    /// Missing or invalid configuration (flags, YAML, source settings).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A column type the selected row source cannot decode.
    #[error("Unsupported type '{source_type}' for column {column}")]
    UnsupportedType { column: String, source_type: String },

    /// NULL found in a column declared NOT NULL.
    #[error("Null value found in non-nullable column {table}.{column}")]
    IntegrityViolation { table: String, column: String },

    /// Failure reading a row, annotated with its position in the table.
    #[error("Read failed for table {table} at row {row}{}", column_suffix(.column))]
    Read {
        table: String,
        row: u64,
        column: Option<String>,
        #[source]
        source: Box<SeedError>,
    },

    /// Raw text that does not parse as the column's type.
    #[error("Cannot parse '{value}' for column {column}: {message}")]
    Parse {
        column: String,
        value: String,
        message: String,
    },

    /// Row shorter than the position a column maps to.
    #[error("Column {column} maps to field {position} but the row has {fields} fields")]
    MissingField {
        column: String,
        position: usize,
        fields: usize,
    },

    /// Malformed CSV line.
    #[error("Malformed CSV line: {0}")]
    Tokenize(#[from] TokenizeError),

    /// Failure opening a file or query cursor.
    #[error("Resource error: {message}\n  Context: {context}")]
    Resource { context: String, message: String },

    /// Row source used out of order (value read without a loaded row, etc.).
    #[error("Invalid row source state: {0}")]
    InvalidState(String),

    /// Source database connection or query error.
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// IO error (file operations, output stream).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn column_suffix(column: &Option<String>) -> String {
    match column {
        Some(c) => format!(", column {}", c),
        None => String::new(),
    }
}

impl SeedError {
    /// Create a Resource error with context about where it occurred.
    pub fn resource(context: impl Into<String>, message: impl Into<String>) -> Self {
        SeedError::Resource {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a Parse error for a raw field value.
    pub fn parse(
        column: impl Into<String>,
        value: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        SeedError::Parse {
            column: column.into(),
            value: value.into(),
            message: message.to_string(),
        }
    }

    /// Wrap an error with the table and 1-based row ordinal it happened at.
    pub fn at_row(self, table: impl Into<String>, row: u64, column: Option<&str>) -> Self {
        SeedError::Read {
            table: table.into(),
            row,
            column: column.map(String::from),
            source: Box::new(self),
        }
    }

    /// The underlying error with any row annotations peeled off.
    pub fn root_cause(&self) -> &SeedError {
        match self {
            SeedError::Read { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self.root_cause() {
            SeedError::Config(_) | SeedError::Yaml(_) => EXIT_CONFIG_ERROR,
            SeedError::Source(_) | SeedError::Resource { .. } => EXIT_SOURCE_ERROR,
            SeedError::Io(_) => EXIT_IO_ERROR,
            _ => EXIT_DATA_ERROR,
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for script generation.
pub type Result<T> = std::result::Result<T, SeedError>;
