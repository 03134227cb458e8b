//! Configuration validation.

use super::{Config, ConnectionSpec};
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_connection("source", &config.source)?;
    validate_connection("destination", &config.destination)?;
    validate_distinct(&config.source, &config.destination)?;

    if let Some(0) = config.migration.batch_size {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }

    Ok(())
}

/// Require host, user and database on one side of the migration.
pub fn validate_connection(side: &str, spec: &ConnectionSpec) -> Result<()> {
    if spec.host.trim().is_empty() {
        return Err(MigrateError::Config(format!("{}.host is required", side)));
    }
    if spec.user.is_empty() {
        return Err(MigrateError::Config(format!("{}.user is required", side)));
    }
    if spec.database.is_empty() {
        return Err(MigrateError::Config(format!("{}.database is required", side)));
    }
    Ok(())
}

/// Cannot migrate a database onto itself.
pub fn validate_distinct(source: &ConnectionSpec, destination: &ConnectionSpec) -> Result<()> {
    if source.same_target(destination) {
        return Err(MigrateError::Config(format!(
            "source and destination are the same database ({})",
            source.display_name()
        )));
    }
    Ok(())
}

/// Preview only runs against a destination on the local machine.
pub fn validate_preview_destination(destination: &ConnectionSpec) -> Result<()> {
    if !destination.is_loopback() {
        return Err(MigrateError::Config(format!(
            "destination host must be localhost or a loopback address, got '{}'",
            destination.host
        )));
    }
    Ok(())
}
