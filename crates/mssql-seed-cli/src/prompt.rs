//! Interactive prompts for values missing from flags and configuration.

use dialoguer::Password;
use mssql_seed::{SeedError, SourceConfig};

/// Ask for the SQL login password without echoing it.
pub fn password(source: &SourceConfig) -> Result<String, SeedError> {
    Password::new()
        .with_prompt(format!(
            "Password for {}@{}:{}",
            source.user, source.host, source.port
        ))
        .interact()
        .map_err(|e| SeedError::Config(format!("password not provided: {}", e)))
}
