use std::sync::{Arc, Mutex};

use rollcall_core::{SessionId, TenantId};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, instrument};

use crate::error::{Result, SeedingError};
use crate::seed::seed;
use crate::types::SeedOutcome;

/// Just-in-time seeding for request handlers.
///
/// Cloning is cheap; clones share one connection. The mutex only serialises
/// use of that connection. Coordination with the scheduler (which holds its
/// own connection, possibly in another process) happens in the store through
/// the conflict-tolerant insert and the guarded status update.
#[derive(Clone)]
pub struct OnDemandSeeder {
    conn: Arc<Mutex<Connection>>,
}

impl OnDemandSeeder {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Make sure `session_id` has its placeholder rows before the caller
    /// reads or marks attendance.
    ///
    /// Runs in one transaction that commits on success and rolls back on
    /// any error. Blocks on store I/O, so async callers should go through
    /// [`spawn_blocking`](tokio::task::spawn_blocking) or the request worker
    /// in [`crate::requests`].
    #[instrument(skip_all, fields(session_id = %session_id, tenant_id = %tenant_id, auto_open = auto_open))]
    pub fn ensure_seeded(
        &self,
        session_id: SessionId,
        tenant_id: TenantId,
        auto_open: bool,
    ) -> Result<SeedOutcome> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| SeedingError::ConnectionPoisoned)?;
        // IMMEDIATE takes the write lock up front; a deferred transaction
        // that upgrades mid-way can fail with SQLITE_BUSY regardless of the
        // busy timeout.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = seed(&tx, session_id, tenant_id, auto_open)?;
        tx.commit()?;

        debug!(
            inserted = outcome.inserted,
            opened = outcome.opened,
            "on-demand seed committed"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use rollcall_core::SessionStatus;

    #[test]
    fn ensure_seeded_commits_rows_and_opens_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.db");
        let setup = Connection::open(&path).unwrap();
        crate::db::init_db(&setup).unwrap();
        let tenant = TenantId(3);
        let section = add_section(&setup, tenant);
        enroll(&setup, tenant, section, 1, 7, true);
        let session = add_session(&setup, tenant, section, None, SessionStatus::Scheduled);

        let seeder = OnDemandSeeder::new(Connection::open(&path).unwrap());
        let outcome = seeder.ensure_seeded(session, tenant, true).unwrap();
        assert_eq!(outcome, SeedOutcome { inserted: 7, opened: true });

        // visible from a different connection, so it was committed
        assert_eq!(record_count(&setup, session), 7);
        assert_eq!(session_status(&setup, session), SessionStatus::Open);
    }

    #[test]
    fn repeated_calls_converge() {
        let conn = memory_db();
        let tenant = TenantId(1);
        let section = add_section(&conn, tenant);
        enroll(&conn, tenant, section, 1, 4, true);
        let session = add_session(&conn, tenant, section, None, SessionStatus::Scheduled);
        let seeder = OnDemandSeeder::new(conn);

        assert_eq!(seeder.ensure_seeded(session, tenant, false).unwrap().inserted, 4);
        for _ in 0..3 {
            assert_eq!(
                seeder.ensure_seeded(session, tenant, false).unwrap(),
                SeedOutcome::default()
            );
        }
    }

    #[test]
    fn store_errors_propagate_to_caller() {
        // no schema: the insert fails and nothing is swallowed
        let seeder = OnDemandSeeder::new(Connection::open_in_memory().unwrap());
        let err = seeder
            .ensure_seeded(SessionId(1), TenantId(1), true)
            .unwrap_err();
        assert!(matches!(err, SeedingError::Database(_)));
    }
}
