//! Configuration validation.

use super::{Config, SourceKind};
use crate::encoder::SensitiveColumns;
use crate::error::{Result, SeedError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.host.is_empty() {
        return Err(SeedError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(SeedError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(SeedError::Config("source.user is required".into()));
    }
    if config.source.port == 0 {
        return Err(SeedError::Config("source.port must be between 1 and 65535".into()));
    }

    let generation = &config.generation;
    if generation.tables.is_empty() {
        return Err(SeedError::Config(
            "generation.tables must list at least one table".into(),
        ));
    }
    if let Some(idx) = generation.tables.iter().position(|t| t.trim().is_empty()) {
        return Err(SeedError::Config(format!(
            "generation.tables[{}] is empty",
            idx
        )));
    }

    if generation.source_mode == SourceKind::Csv && generation.csv_directory.is_none() {
        return Err(SeedError::Config(
            "generation.csv_directory is required when source_mode is csv".into(),
        ));
    }

    SensitiveColumns::parse(&generation.sensitive_columns)?;

    Ok(())
}
