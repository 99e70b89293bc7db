//! Column metadata and the source-type to semantic-type mapping.

mod mssql;

use crate::error::Result;

/// Canonical value kind a source column type maps to.
///
/// Drives both value decoding in the row sources and literal rendering in
/// the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Int64,
    Bool,
    Decimal,
    Int32,
    Int16,
    Byte,
    Float64,
    Float32,
    DateTime,
    Date,
    Time,
    String,
    Unknown,
}

impl SemanticType {
    /// Map an MSSQL data type name (case-insensitive).
    pub fn from_source_type(source_type: &str) -> Self {
        match source_type.to_lowercase().as_str() {
            "bigint" => SemanticType::Int64,
            "bit" => SemanticType::Bool,
            "decimal" | "money" | "numeric" | "smallmoney" => SemanticType::Decimal,
            "int" => SemanticType::Int32,
            "smallint" => SemanticType::Int16,
            "tinyint" => SemanticType::Byte,
            "float" => SemanticType::Float64,
            "real" => SemanticType::Float32,
            "datetime" | "datetime2" | "smalldatetime" => SemanticType::DateTime,
            "date" => SemanticType::Date,
            "time" => SemanticType::Time,
            "char" | "varchar" | "text" | "nchar" | "nvarchar" | "ntext" => SemanticType::String,
            _ => SemanticType::Unknown,
        }
    }
}

/// Resolved metadata for one column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    name: String,
    source_type: String,
    semantic_type: SemanticType,
    is_nullable: bool,
    is_identity: bool,
}

impl ColumnInfo {
    /// Build a column descriptor; the semantic type is derived from `source_type`.
    pub fn new(
        name: impl Into<String>,
        source_type: impl Into<String>,
        is_nullable: bool,
        is_identity: bool,
    ) -> Self {
        let source_type = source_type.into();
        Self {
            name: name.into(),
            semantic_type: SemanticType::from_source_type(&source_type),
            source_type,
            is_nullable,
            is_identity,
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data type as reported by the source (e.g. "int", "datetime2").
    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.semantic_type
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    pub fn is_identity(&self) -> bool {
        self.is_identity
    }
}

/// Resolves the ordered columns of a table.
///
/// The returned order is the physical column order of the table. It fixes the
/// INSERT column list and the positional layout of headerless CSV files, and
/// must be the same every time a table is asked for within one run.
pub trait ColumnCatalog {
    fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>>;
}

/// Render a column list as `a, b, c`.
pub fn column_list(columns: &[ColumnInfo]) -> String {
    columns
        .iter()
        .map(ColumnInfo::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether any column is an identity column.
pub fn has_identity(columns: &[ColumnInfo]) -> bool {
    columns.iter().any(ColumnInfo::is_identity)
}
