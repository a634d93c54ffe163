//! Connection setup and the two per-transaction bounds the scheduler needs:
//! how long to wait for another writer's lock, and how long a single
//! statement may run.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;

use crate::error::Result;

/// SQLite VM instructions between progress-handler checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

/// Open a connection to the attendance database.
///
/// `lock_timeout` becomes the busy timeout: a statement that needs a lock
/// held by another connection waits at most this long, then fails with
/// `SQLITE_BUSY`.
pub fn open_connection(path: impl AsRef<Path>, lock_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn, lock_timeout)?;
    Ok(conn)
}

/// Apply the pragmas every attendance connection runs with.
pub fn configure(conn: &Connection, lock_timeout: Duration) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    conn.busy_timeout(lock_timeout)?;
    Ok(())
}

/// Interrupts statements that run past an armed deadline.
///
/// Installed once per connection. While disarmed the handler never fires;
/// [`arm`](Self::arm) starts a fresh budget for the next unit of work.
#[derive(Debug, Clone)]
pub struct StatementDeadline {
    timeout: Duration,
    deadline_ms: Arc<AtomicI64>,
}

impl StatementDeadline {
    pub fn install(conn: &Connection, timeout: Duration) -> Self {
        let deadline_ms = Arc::new(AtomicI64::new(i64::MAX));
        let watched = Arc::clone(&deadline_ms);
        conn.progress_handler(
            PROGRESS_CHECK_OPS,
            Some(move || Utc::now().timestamp_millis() > watched.load(Ordering::Relaxed)),
        );
        Self {
            timeout,
            deadline_ms,
        }
    }

    pub fn arm(&self) {
        let budget = i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX);
        let deadline = Utc::now().timestamp_millis().saturating_add(budget);
        self.deadline_ms.store(deadline, Ordering::Relaxed);
    }

    pub fn disarm(&self) {
        self.deadline_ms.store(i64::MAX, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SeedingError;

    const SLOW_QUERY: &str = "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n)
                              SELECT COUNT(*) FROM n";

    #[test]
    fn armed_deadline_interrupts_runaway_statement() {
        let conn = Connection::open_in_memory().unwrap();
        let deadline = StatementDeadline::install(&conn, Duration::from_millis(20));
        deadline.arm();

        let err = conn
            .query_row(SLOW_QUERY, [], |row| row.get::<_, i64>(0))
            .map_err(SeedingError::from)
            .unwrap_err();
        assert!(err.is_transient(), "expected interrupt, got {err}");
    }

    #[test]
    fn disarmed_deadline_lets_statements_finish() {
        let conn = Connection::open_in_memory().unwrap();
        let deadline = StatementDeadline::install(&conn, Duration::from_millis(1));
        deadline.arm();
        deadline.disarm();

        let n: i64 = conn
            .query_row(
                "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 50000)
                 SELECT COUNT(*) FROM n",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 50_000);
    }

    #[test]
    fn open_connection_sets_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_connection(dir.path().join("t.db"), Duration::from_millis(50)).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
