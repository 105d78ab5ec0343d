//! In-memory statistics store. Nothing survives the process.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{HostStats, StatsError, StatsStore};
use crate::probe::PingOutcome;

struct Inner {
    next_id: i64,
    samples: HashMap<i64, Vec<u64>>,
}

/// Statistics kept in process memory, for runs where no database file is
/// wanted.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        // Ids start at 1 like SQLite rowids
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                samples: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsStore for MemoryStore {
    fn register_host(&self, _name: &str, _host: &str) -> Result<i64, StatsError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.samples.insert(id, Vec::new());
        Ok(id)
    }

    fn record(&self, host_id: i64, outcome: &PingOutcome) -> Result<(), StatsError> {
        let Some(rtt) = outcome.rtt_ms() else {
            return Ok(());
        };

        let mut inner = self.inner.lock().unwrap();
        inner.samples.entry(host_id).or_default().push(rtt);
        Ok(())
    }

    fn query(&self, host_id: i64) -> Result<HostStats, StatsError> {
        let inner = self.inner.lock().unwrap();
        let samples = inner
            .samples
            .get(&host_id)
            .filter(|s| !s.is_empty())
            .ok_or(StatsError::NoData(host_id))?;

        let mut minimum = u64::MAX;
        let mut maximum = 0u64;
        let mut sum = 0u64;
        for &rtt in samples {
            minimum = minimum.min(rtt);
            maximum = maximum.max(rtt);
            sum += rtt;
        }

        // Round half away from zero, matching SQLite's ROUND()
        let average = (sum as f64 / samples.len() as f64).round() as u64;

        Ok(HostStats {
            average,
            minimum,
            maximum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_hosts_get_distinct_ids() {
        let store = MemoryStore::new();
        let a = store.register_host("A", "10.0.0.1").unwrap();
        let b = store.register_host("B", "10.0.0.2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn query_before_any_result_is_no_data() {
        let store = MemoryStore::new();
        let id = store.register_host("Gateway", "192.168.1.1").unwrap();

        assert!(matches!(store.query(id), Err(StatsError::NoData(_))));
    }

    #[test]
    fn single_result_sets_all_three_aggregates() {
        let store = MemoryStore::new();
        let id = store.register_host("DNS", "8.8.8.8").unwrap();

        store.record(id, &PingOutcome::Success(42)).unwrap();

        let stats = store.query(id).unwrap();
        assert_eq!(
            stats,
            HostStats {
                average: 42,
                minimum: 42,
                maximum: 42
            }
        );
    }

    #[test]
    fn aggregates_keep_min_avg_max_ordering() {
        let store = MemoryStore::new();
        let id = store.register_host("DNS", "8.8.8.8").unwrap();

        for rtt in [12, 7, 31] {
            store.record(id, &PingOutcome::Success(rtt)).unwrap();
        }

        let stats = store.query(id).unwrap();
        assert_eq!(stats.minimum, 7);
        assert_eq!(stats.maximum, 31);
        assert_eq!(stats.average, 17); // 50 / 3
        assert!(stats.minimum <= stats.average && stats.average <= stats.maximum);
    }

    #[test]
    fn average_rounds_half_up() {
        let store = MemoryStore::new();
        let id = store.register_host("DNS", "8.8.8.8").unwrap();

        store.record(id, &PingOutcome::Success(10)).unwrap();
        store.record(id, &PingOutcome::Success(11)).unwrap();

        // 21 / 2 = 10.5
        assert_eq!(store.query(id).unwrap().average, 11);
    }

    #[test]
    fn failures_do_not_touch_aggregates() {
        let store = MemoryStore::new();
        let id = store.register_host("DNS", "8.8.8.8").unwrap();

        store.record(id, &PingOutcome::Success(15)).unwrap();
        store.record(id, &PingOutcome::Timeout).unwrap();
        store.record(id, &PingOutcome::Unreachable).unwrap();
        store.record(id, &PingOutcome::Error("boom".into())).unwrap();

        let stats = store.query(id).unwrap();
        assert_eq!(
            stats,
            HostStats {
                average: 15,
                minimum: 15,
                maximum: 15
            }
        );
    }

    #[test]
    fn reregistering_a_host_starts_a_separate_series() {
        let store = MemoryStore::new();
        let first = store.register_host("DNS", "8.8.8.8").unwrap();
        let second = store.register_host("DNS", "8.8.8.8").unwrap();
        assert_ne!(first, second);

        store.record(first, &PingOutcome::Success(10)).unwrap();
        store.record(second, &PingOutcome::Success(90)).unwrap();

        assert_eq!(store.query(first).unwrap().maximum, 10);
        assert_eq!(store.query(second).unwrap().minimum, 90);
    }

    #[test]
    fn hosts_do_not_share_samples() {
        let store = MemoryStore::new();
        let a = store.register_host("A", "10.0.0.1").unwrap();
        let b = store.register_host("B", "10.0.0.2").unwrap();

        store.record(a, &PingOutcome::Success(10)).unwrap();
        store.record(b, &PingOutcome::Success(90)).unwrap();

        assert_eq!(store.query(a).unwrap().maximum, 10);
        assert_eq!(store.query(b).unwrap().minimum, 90);
    }
}
