//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, same source and destination, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Destination database query error
    #[error("Destination database error: {0}")]
    Target(#[from] mysql_async::Error),

    /// Connection error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for connection failures.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for source query failures.
pub const EXIT_SOURCE_ERROR: u8 = 3;
/// Exit code for destination query failures.
pub const EXIT_TARGET_ERROR: u8 = 4;
/// Exit code for transfer failures.
pub const EXIT_TRANSFER_ERROR: u8 = 5;
/// Exit code for file IO failures.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code for serialization failures.
pub const EXIT_SERIALIZATION_ERROR: u8 = 8;

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised before any database work began.
    pub fn is_config(&self) -> bool {
        matches!(self, MigrateError::Config(_))
    }

    /// Process exit code for the CLI.
    ///
    /// Malformed YAML counts as a configuration problem, a missing file as IO.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::Pool { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Source(_) => EXIT_SOURCE_ERROR,
            MigrateError::Target(_) => EXIT_TARGET_ERROR,
            MigrateError::Transfer { .. } => EXIT_TRANSFER_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Json(_) => EXIT_SERIALIZATION_ERROR,
        }
    }

    /// Format error with full details including error chain
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

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(MigrateError::pool("refused", "connecting").exit_code(), EXIT_CONNECTION_ERROR);
        assert_eq!(MigrateError::transfer("users", "boom").exit_code(), EXIT_TRANSFER_ERROR);

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(MigrateError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = MigrateError::transfer("orders", "bulk insert failed");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Transfer failed for table orders"));
        assert!(detailed.contains("bulk insert failed"));
    }

    #[test]
    fn test_is_config() {
        assert!(MigrateError::Config("same target".into()).is_config());
        assert!(!MigrateError::transfer("t", "m").is_config());
    }
}
