//! One monitored host: its prober, its store handle, and what the last
//! cycle observed.

use std::sync::Arc;
use std::time::Duration;

use crate::probe::{PingOutcome, Probe};
use crate::stats::{HostStats, StatsStore};

/// Snapshot of one host for the console report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub name: String,
    pub failed: bool,
    pub latency_ms: Option<u64>,
    pub stats: Option<HostStats>,
}

/// One monitored host.
pub struct Target<P: Probe> {
    name: String,
    host: String,
    host_id: i64,
    prober: P,
    store: Arc<dyn StatsStore>,
    last: Option<PingOutcome>,
    last_stats: Option<HostStats>,
}

impl<P: Probe> Target<P> {
    pub fn new(
        name: String,
        host: String,
        host_id: i64,
        prober: P,
        store: Arc<dyn StatsStore>,
    ) -> Self {
        Self {
            name,
            host,
            host_id,
            prober,
            store,
            last: None,
            last_stats: None,
        }
    }

    /// Probe the host once and fold the outcome into the store.
    ///
    /// Store errors are logged and contained so one bad write cannot stop
    /// the loop; the previous aggregates stay in place.
    pub async fn poll(&mut self, timeout: Duration) {
        let outcome = self.prober.probe(&self.host, timeout).await;
        tracing::debug!("{} ({}): {:?}", self.name, self.host, outcome);

        if let Err(e) = self.store.record(self.host_id, &outcome) {
            tracing::error!("recording result for {}: {}", self.name, e);
        }

        // Failures add no rows, so the aggregates only move on success
        if outcome.is_success() {
            match self.store.query(self.host_id) {
                Ok(stats) => self.last_stats = Some(stats),
                Err(e) => tracing::error!("querying stats for {}: {}", self.name, e),
            }
        }

        self.last = Some(outcome);
    }

    pub fn report(&self) -> ReportLine {
        let failed = !self.last.as_ref().is_some_and(|o| o.is_success());
        ReportLine {
            name: self.name.clone(),
            failed,
            latency_ms: self.last.as_ref().and_then(|o| o.rtt_ms()),
            stats: self.last_stats,
        }
    }
}
