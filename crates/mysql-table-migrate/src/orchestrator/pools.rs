//! Connection lifecycle for one operation.
//!
//! Every operation opens its own source and destination handles and releases
//! them when it finishes, whatever the outcome. Nothing is cached between
//! operations.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConnectionSpec;
use crate::core::traits::{CatalogReader, SourceReader, TargetWriter};
use crate::drivers::{MysqlReader, MysqlWriter};
use crate::error::Result;

/// Connections per source pool. Concurrent preview queries queue on it.
const SOURCE_POOL_SIZE: u32 = 1;

/// One source handle and one destination handle.
pub struct ConnectionPair {
    pub source: Arc<dyn SourceReader>,
    pub destination: Arc<dyn TargetWriter>,
}

impl ConnectionPair {
    /// Wrap already-open handles.
    pub fn new(source: Arc<dyn SourceReader>, destination: Arc<dyn TargetWriter>) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Open both sides. If the destination fails, the source is closed first.
    pub async fn connect(source: &ConnectionSpec, destination: &ConnectionSpec) -> Result<Self> {
        let reader = connect_source(source).await?;

        let writer = match MysqlWriter::new(destination).await {
            Ok(writer) => writer,
            Err(e) => {
                reader.close().await;
                return Err(e);
            }
        };

        Ok(Self::new(Arc::new(reader), Arc::new(writer)))
    }

    /// Release both handles.
    pub async fn close(&self) {
        self.source.close().await;
        self.destination.close().await;
        debug!("Released source and destination connections");
    }
}

/// Open a source handle on its own (table listing without a destination).
pub async fn connect_source(spec: &ConnectionSpec) -> Result<MysqlReader> {
    MysqlReader::new(spec, SOURCE_POOL_SIZE).await
}

/// Health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}

/// Connect to each side independently and time a round trip.
///
/// Never fails; connection errors are reported in the result.
pub async fn health_check(source: &ConnectionSpec, destination: &ConnectionSpec) -> HealthCheckResult {
    let start = Instant::now();
    let (source_connected, source_error) = match connect_source(source).await {
        Ok(reader) => {
            let probe = reader.test_connection().await;
            reader.close().await;
            outcome(probe)
        }
        Err(e) => (false, Some(e.to_string())),
    };
    let source_latency_ms = start.elapsed().as_millis() as u64;

    let start = Instant::now();
    let (target_connected, target_error) = match MysqlWriter::new(destination).await {
        Ok(writer) => {
            let probe = writer.test_connection().await;
            writer.close().await;
            outcome(probe)
        }
        Err(e) => (false, Some(e.to_string())),
    };
    let target_latency_ms = start.elapsed().as_millis() as u64;

    HealthCheckResult {
        source_connected,
        source_latency_ms,
        source_error,
        target_connected,
        target_latency_ms,
        target_error,
        healthy: source_connected && target_connected,
    }
}

fn outcome(probe: Result<()>) -> (bool, Option<String>) {
    match probe {
        Ok(()) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDatabase;

    #[tokio::test]
    async fn test_close_releases_both_sides() {
        let source = Arc::new(FakeDatabase::new("src"));
        let destination = Arc::new(FakeDatabase::new("dst"));
        let pair = ConnectionPair::new(source.clone(), destination.clone());

        pair.close().await;

        assert!(source.is_closed());
        assert!(destination.is_closed());
    }

    #[test]
    fn test_outcome() {
        assert_eq!(outcome(Ok(())), (true, None));
        let (ok, err) = outcome(Err(crate::MigrateError::pool("refused", "probe")));
        assert!(!ok);
        assert!(err.unwrap().contains("refused"));
    }
}
