//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::encoder::SensitiveColumns;
use crate::error::{Result, SeedError};
use crate::generator::GenerateOptions;
use crate::source::SourceMode;

impl Config {
    /// Load configuration from a YAML file. Not validated: command-line
    /// overrides are usually applied first.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Resolved row source selector.
    pub fn source_mode(&self) -> Result<SourceMode> {
        match self.generation.source_mode {
            SourceKind::Db => Ok(SourceMode::Live),
            SourceKind::Csv => {
                let directory = self.generation.csv_directory.clone().ok_or_else(|| {
                    SeedError::Config(
                        "generation.csv_directory is required when source_mode is csv".into(),
                    )
                })?;
                Ok(SourceMode::Csv { directory })
            }
        }
    }

    /// Sensitive column set for the encoder.
    pub fn sensitive_columns(&self) -> Result<SensitiveColumns> {
        SensitiveColumns::parse(&self.generation.sensitive_columns)
    }

    /// Generator options.
    pub fn generate_options(&self) -> Result<GenerateOptions> {
        Ok(GenerateOptions {
            tables: self.generation.tables.clone(),
            include_deletes: self.generation.include_deletes,
            source: self.source_mode()?,
        })
    }
}
