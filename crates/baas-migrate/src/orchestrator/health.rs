//! Connectivity probe.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{QueryClient, SelectQuery};
use crate::error::MigrateError;

/// Table read by the probe. Every project created from the schema has it.
pub const PROBE_TABLE: &str = "categories";

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of probing both projects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub source: bool,
    pub target: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub source_latency_ms: u64,
    pub target_latency_ms: u64,
}

impl ConnectionReport {
    /// True when both projects answered.
    pub fn healthy(&self) -> bool {
        self.source && self.target
    }

    /// Connectivity error naming whichever side failed.
    pub fn to_error(&self) -> MigrateError {
        MigrateError::Connectivity {
            source_error: self.source_error.clone(),
            target_error: self.target_error.clone(),
        }
    }
}

/// Read a single row from [`PROBE_TABLE`].
///
/// Returns the failure text (if any) and the elapsed time. Never errors.
pub async fn probe(client: &dyn QueryClient) -> (Option<String>, u64) {
    let start = Instant::now();
    let query = SelectQuery::page(1, 0);
    let outcome = tokio::time::timeout(PROBE_TIMEOUT, client.select(PROBE_TABLE, &query)).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let error = match outcome {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("no answer within {}s", PROBE_TIMEOUT.as_secs())),
    };

    match error {
        Some(ref e) => warn!("Probe of {} failed: {}", client.endpoint(), e),
        None => debug!("Probe of {} ok in {}ms", client.endpoint(), latency_ms),
    }

    (error, latency_ms)
}
