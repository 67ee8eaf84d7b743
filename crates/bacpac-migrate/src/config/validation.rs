//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.server.trim().is_empty() {
        return Err(MigrateError::Config("source.server is required".into()));
    }
    if config.source.database.trim().is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.destination.server.trim().is_empty() {
        return Err(MigrateError::Config("destination.server is required".into()));
    }
    if config.destination.database.trim().is_empty() {
        return Err(MigrateError::Config(
            "destination.database is required".into(),
        ));
    }

    // Names are embedded in connection strings passed to SqlPackage
    for (field, value) in [
        ("source.server", &config.source.server),
        ("source.database", &config.source.database),
        ("destination.server", &config.destination.server),
        ("destination.database", &config.destination.database),
    ] {
        if value.contains(|c: char| matches!(c, ';' | '=')) {
            return Err(MigrateError::Config(format!(
                "{} '{}' cannot contain ';' or '='",
                field, value
            )));
        }
    }

    // The destination database name becomes the BACPAC file name
    if config
        .destination
        .database
        .contains(|c: char| matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
    {
        return Err(MigrateError::Config(format!(
            "destination.database '{}' cannot be used as a file name",
            config.destination.database
        )));
    }

    // Exporting from and importing into the same database would drop the source
    if config.source.server.eq_ignore_ascii_case(&config.destination.server)
        && config
            .source
            .database
            .eq_ignore_ascii_case(&config.destination.database)
    {
        return Err(MigrateError::Config(
            "source and destination cannot be the same database".into(),
        ));
    }

    if config.destination.service_tier.trim().is_empty() {
        return Err(MigrateError::Config(
            "destination.service_tier cannot be empty".into(),
        ));
    }

    if let Some(logging) = &config.logging {
        if logging.connection_string.trim().is_empty() {
            return Err(MigrateError::Config(
                "logging.connection_string cannot be empty".into(),
            ));
        }
    }

    Ok(())
}
