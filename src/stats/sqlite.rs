//! SQLite-backed statistics store.
//!
//! Opening the store drops and recreates the schema, so aggregates always
//! describe the current run while the rows themselves stay on disk for
//! outside inspection until the next start.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};

use super::{HostStats, StatsError, StatsStore};
use crate::probe::PingOutcome;

const SCHEMA: &str = "
DROP TABLE IF EXISTS ping_results;
DROP TABLE IF EXISTS hosts;
CREATE TABLE hosts (
    host_id INTEGER PRIMARY KEY,
    display_name TEXT NOT NULL,
    host TEXT NOT NULL
);
CREATE TABLE ping_results (
    result_id INTEGER PRIMARY KEY,
    rtt INTEGER NOT NULL,
    host_id INTEGER NOT NULL,
    FOREIGN KEY (host_id) REFERENCES hosts (host_id)
);
";

/// Thread-safe SQLite store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the database file and reset the schema for a new session.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StatsError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), StatsError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}

impl StatsStore for SqliteStore {
    fn register_host(&self, name: &str, host: &str) -> Result<i64, StatsError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO hosts (display_name, host) VALUES (?1, ?2)",
            params![name, host],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn record(&self, host_id: i64, outcome: &PingOutcome) -> Result<(), StatsError> {
        let Some(rtt) = outcome.rtt_ms() else {
            return Ok(());
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO ping_results (rtt, host_id) VALUES (?1, ?2)",
            params![rtt as i64, host_id],
        )?;
        Ok(())
    }

    fn query(&self, host_id: i64) -> Result<HostStats, StatsError> {
        let conn = self.conn.lock().unwrap();
        let row: (Option<i64>, Option<i64>, Option<i64>) = conn.query_row(
            "SELECT CAST(ROUND(AVG(rtt), 0) AS INTEGER), MIN(rtt), MAX(rtt)
             FROM ping_results WHERE host_id = ?1",
            params![host_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        match row {
            (Some(average), Some(minimum), Some(maximum)) => Ok(HostStats {
                average: average as u64,
                minimum: minimum as u64,
                maximum: maximum as u64,
            }),
            _ => Err(StatsError::NoData(host_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn query_before_any_result_is_no_data() {
        let tmp = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(tmp.path()).unwrap();
        let id = store.register_host("Gateway", "192.168.1.1").unwrap();

        assert!(matches!(store.query(id), Err(StatsError::NoData(_))));
    }

    #[test]
    fn single_result_sets_all_three_aggregates() {
        let tmp = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(tmp.path()).unwrap();
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
        let tmp = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(tmp.path()).unwrap();
        let id = store.register_host("DNS", "8.8.8.8").unwrap();

        for rtt in [10, 20, 30, 25] {
            store.record(id, &PingOutcome::Success(rtt)).unwrap();
        }

        let stats = store.query(id).unwrap();
        assert_eq!(stats.minimum, 10);
        assert_eq!(stats.maximum, 30);
        assert_eq!(stats.average, 21); // 85 / 4 = 21.25
        assert!(stats.minimum <= stats.average && stats.average <= stats.maximum);
    }

    #[test]
    fn failures_do_not_touch_aggregates() {
        let tmp = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(tmp.path()).unwrap();
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
    fn hosts_are_aggregated_independently() {
        let tmp = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(tmp.path()).unwrap();
        let a = store.register_host("A", "10.0.0.1").unwrap();
        let b = store.register_host("B", "10.0.0.2").unwrap();
        assert_ne!(a, b);

        store.record(a, &PingOutcome::Success(10)).unwrap();
        store.record(b, &PingOutcome::Success(90)).unwrap();

        assert_eq!(store.query(a).unwrap().maximum, 10);
        assert_eq!(store.query(b).unwrap().minimum, 90);
    }

    #[test]
    fn same_host_registered_twice_gets_distinct_ids() {
        let tmp = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(tmp.path()).unwrap();
        let first = store.register_host("DNS", "8.8.8.8").unwrap();
        let second = store.register_host("DNS", "8.8.8.8").unwrap();
        assert_ne!(first, second);

        store.record(first, &PingOutcome::Success(10)).unwrap();
        store.record(second, &PingOutcome::Success(90)).unwrap();

        assert_eq!(store.query(first).unwrap().maximum, 10);
        assert_eq!(store.query(second).unwrap().minimum, 90);
    }

    #[test]
    fn query_is_repeatable() {
        let tmp = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(tmp.path()).unwrap();
        let id = store.register_host("DNS", "8.8.8.8").unwrap();
        store.record(id, &PingOutcome::Success(7)).unwrap();

        let first = store.query(id).unwrap();
        let second = store.query(id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reopening_resets_previous_results() {
        let tmp = NamedTempFile::new().unwrap();

        let store = SqliteStore::open(tmp.path()).unwrap();
        let id = store.register_host("DNS", "8.8.8.8").unwrap();
        store.record(id, &PingOutcome::Success(50)).unwrap();
        drop(store);

        let store = SqliteStore::open(tmp.path()).unwrap();
        let id = store.register_host("DNS", "8.8.8.8").unwrap();
        assert!(matches!(store.query(id), Err(StatsError::NoData(_))));
    }
}
