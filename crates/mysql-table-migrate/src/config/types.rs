//! Configuration type definitions.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Rows fetched from the source per page.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default MySQL port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database connection.
    pub source: ConnectionSpec,

    /// Destination database connection.
    pub destination: ConnectionSpec,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// One database endpoint.
///
/// The engine never persists a spec; it is held only for the duration of one
/// operation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Database (MySQL schema) name.
    pub database: String,
}

impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionSpec {
    /// Create a spec on the default port.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_MYSQL_PORT,
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Whether the host names the local machine (`localhost`, 127.0.0.0/8 or `::1`).
    pub fn is_loopback(&self) -> bool {
        let host = self.host.trim().trim_start_matches('[').trim_end_matches(']');
        if host.eq_ignore_ascii_case("localhost") {
            return true;
        }
        host.parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
    }

    /// Whether both specs point at the same database on the same server.
    ///
    /// Loopback spellings are treated as one host.
    pub fn same_target(&self, other: &ConnectionSpec) -> bool {
        let same_host = if self.is_loopback() && other.is_loopback() {
            true
        } else {
            self.host.trim().eq_ignore_ascii_case(other.host.trim())
        };

        same_host
            && self.port == other.port
            && self.database.eq_ignore_ascii_case(&other.database)
    }

    /// `host:port/database` label for logs.
    pub fn display_name(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MigrationConfig {
    /// Tables to compare or migrate. Empty means every source table.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Use catalog row estimates instead of COUNT(*) during preview.
    #[serde(default)]
    pub approximate_counts: bool,

    /// Disable destination foreign-key checks for the whole run.
    #[serde(default)]
    pub disable_foreign_key_checks: bool,

    /// Per-table permission to merge into a non-empty destination table.
    #[serde(default)]
    pub overwrite: HashMap<String, bool>,

    /// Allow merging into every non-empty destination table.
    #[serde(default)]
    pub overwrite_all: bool,

    /// Rows per page. Defaults to 500 if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

impl MigrationConfig {
    pub fn get_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }
}

fn default_mysql_port() -> u16 {
    DEFAULT_MYSQL_PORT
}
