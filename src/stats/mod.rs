//! Per-host latency statistics with pluggable storage.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use thiserror::Error;

use crate::probe::PingOutcome;

/// Statistics error types.
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("no results recorded for host {0}")]
    NoData(i64),
}

/// Aggregates over every latency recorded for one host, in whole
/// milliseconds. Stores uphold `minimum <= average <= maximum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStats {
    pub average: u64,
    pub minimum: u64,
    pub maximum: u64,
}

/// Storage backend for probe results.
///
/// Only successful probes carry a latency, so [`StatsStore::record`] is a
/// no-op for every other outcome; failures never influence the aggregates.
pub trait StatsStore: Send + Sync {
    /// Register a host and return the id used for all later calls.
    fn register_host(&self, name: &str, host: &str) -> Result<i64, StatsError>;

    /// Record one probe outcome for a registered host.
    fn record(&self, host_id: i64, outcome: &PingOutcome) -> Result<(), StatsError>;

    /// Aggregate everything recorded so far for a host. Read-only.
    fn query(&self, host_id: i64) -> Result<HostStats, StatsError>;
}
