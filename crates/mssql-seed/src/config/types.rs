//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source database (MSSQL). Always needed for column metadata, even when
    /// rows come from CSV files.
    #[serde(default)]
    pub source: SourceConfig,

    /// What to generate.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Source database (MSSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    #[serde(default)]
    pub database: String,

    /// SQL login.
    #[serde(default)]
    pub user: String,

    /// Password. Prompted for by the CLI when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Encrypt the connection (default: false).
    #[serde(default)]
    pub encrypt: bool,

    /// Trust the server certificate without validation (default: true).
    #[serde(default = "default_true")]
    pub trust_server_cert: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_mssql_port(),
            database: String::new(),
            user: String::new(),
            password: None,
            encrypt: false,
            trust_server_cert: true,
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

/// Generation behavior configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Tables to script, parent tables first.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Emit delete statements (in reverse table order) before the inserts.
    #[serde(default)]
    pub include_deletes: bool,

    /// Where row data comes from (default: db).
    #[serde(default)]
    pub source_mode: SourceKind,

    /// Directory holding `<table>.csv` snapshots (csv mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_directory: Option<PathBuf>,

    /// `Table.Column` entries whose text is replaced with 'OBFUSCATED'.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
}

/// Row data origin as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Query the live tables.
    #[default]
    Db,

    /// Read CSV snapshots.
    Csv,
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}
