use chrono::{DateTime, Utc};
use rollcall_core::{RollcallError, SeedSettings, SessionId, SessionStatus, TenantId};
use rusqlite::{params, types::Type, Connection, TransactionBehavior};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, SeedingError},
    seed::seed,
    store::StatementDeadline,
    types::{CycleReport, DueSession},
    window::ScanWindow,
};

// Due = live, scheduled or open, starting inside the window, and with work
// left: an active student without a live record, or (when auto-opening) a
// status still `scheduled`. Sessions with nothing left to do never take a
// batch slot, so a capped batch drains over successive cycles.
const CLAIM_DUE: &str = "
    SELECT s.id, s.tenant_id, s.starts_at, s.status
    FROM class_attendance_sessions s
    WHERE s.deleted_at IS NULL
      AND s.status IN (?5, ?6)
      AND s.starts_at IS NOT NULL
      AND s.starts_at BETWEEN ?1 AND ?2
      AND (
            (?3 AND s.status = ?5)
         OR EXISTS (
                SELECT 1
                FROM class_section_students css
                WHERE css.class_section_id = s.class_section_id
                  AND css.tenant_id = s.tenant_id
                  AND css.is_active = 1
                  AND NOT EXISTS (
                      SELECT 1
                      FROM attendance_records r
                      WHERE r.session_id = s.id
                        AND r.student_id = css.student_id
                        AND r.deleted_at IS NULL))
      )
    ORDER BY s.starts_at ASC, s.id ASC
    LIMIT ?4";

/// Select up to `limit` due sessions, earliest start first.
///
/// Call inside the cycle transaction. The caller should have opened it
/// `IMMEDIATE`: holding the write lock is what keeps a second scheduler from
/// claiming the same rows. Any row that fails to decode fails the whole
/// claim.
pub fn claim_due_sessions(
    conn: &Connection,
    window: &ScanWindow,
    limit: usize,
    auto_open: bool,
) -> Result<Vec<DueSession>> {
    let (from, to) = window.db_bounds();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let mut stmt = conn.prepare_cached(CLAIM_DUE)?;
    let rows = stmt.query_map(
        params![
            from,
            to,
            auto_open,
            limit,
            SessionStatus::Scheduled.as_str(),
            SessionStatus::Open.as_str(),
        ],
        |row| {
            let status: String = row.get(3)?;
            Ok(DueSession {
                id: SessionId(row.get(0)?),
                tenant_id: TenantId(row.get(1)?),
                starts_at: row.get(2)?,
                status: status.parse().map_err(|e: String| {
                    rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into())
                })?,
            })
        },
    )?;
    let due = rows.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(due)
}

/// Periodic seeder: every poll interval, claims due sessions and seeds them
/// in one transaction.
///
/// Keeps no state between cycles beyond its connection; what is due is
/// recomputed from the store each time.
pub struct SeedScheduler {
    conn: Connection,
    settings: SeedSettings,
    deadline: StatementDeadline,
}

impl SeedScheduler {
    /// Take ownership of a dedicated connection and bound it with the
    /// configured lock-wait and statement timeouts. The schema must already
    /// exist (`db::init_db`).
    pub fn new(conn: Connection, settings: SeedSettings) -> Result<Self> {
        conn.busy_timeout(settings.lock_timeout)?;
        let deadline = StatementDeadline::install(&conn, settings.statement_timeout);
        Ok(Self {
            conn,
            settings,
            deadline,
        })
    }

    /// Main loop. Runs a cycle on every tick until `shutdown` broadcasts
    /// `true` or its sender is dropped. Returns immediately when disabled.
    ///
    /// Cycles block on store I/O, so each one runs on the blocking pool and
    /// hands the scheduler back when it finishes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if !self.settings.enabled {
            info!("seed scheduler disabled by configuration");
            return;
        }
        info!(
            poll_secs = self.settings.poll_interval.as_secs(),
            window_minutes = self.settings.window.num_minutes(),
            batch_size = self.settings.batch_size,
            auto_open = self.settings.auto_open,
            "seed scheduler started"
        );

        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut scheduler = self;
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let cycle = tokio::task::spawn_blocking(move || {
                        let result = scheduler.run_cycle();
                        (scheduler, result)
                    });
                    match cycle.await {
                        Ok((back, result)) => {
                            scheduler = back;
                            log_cycle(&result);
                        }
                        Err(e) => {
                            error!(error = %e, "seed cycle task failed, stopping scheduler");
                            break;
                        }
                    }
                }
            }
        }
        info!("seed scheduler shutting down");
    }

    /// One cycle against the wall clock.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now())
    }

    /// One cycle as if the time were `now`. A disabled scheduler returns
    /// [`CycleReport::skipped`] without touching the store.
    pub fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        if !self.settings.enabled {
            return Ok(CycleReport::skipped());
        }
        let result = self.cycle(now);
        self.deadline.disarm();
        result
    }

    fn cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        let window = ScanWindow::around(now, self.settings.grace, self.settings.window)
            .ok_or_else(|| {
                SeedingError::Config(RollcallError::Config(format!(
                    "scan window around {now} is outside the supported date range"
                )))
            })?;
        let auto_open = self.settings.auto_open;

        let mut tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        self.deadline.arm();
        let due = claim_due_sessions(&tx, &window, self.settings.batch_size, auto_open)?;
        let mut report = CycleReport {
            ran: true,
            claimed: due.len(),
            ..CycleReport::default()
        };

        for session in &due {
            self.deadline.arm();
            // Each session gets a savepoint so a failure only unwinds its own
            // writes.
            let result = {
                let sp = tx.savepoint()?;
                let result = seed(&sp, session.id, session.tenant_id, auto_open);
                if result.is_ok() {
                    sp.commit()?;
                }
                result
            };
            match result {
                Ok(outcome) => {
                    report.seeded += 1;
                    report.inserted += outcome.inserted;
                    if outcome.opened {
                        report.opened += 1;
                    }
                }
                // SQLite rolls back the whole transaction on some failures
                // (e.g. an interrupted write); nothing after that is safe.
                Err(e) if tx.is_autocommit() => return Err(e),
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        session_id = %session.id,
                        tenant_id = %session.tenant_id,
                        error = %e,
                        "seeding session failed, continuing with batch"
                    );
                }
            }
        }

        self.deadline.arm();
        tx.commit()?;
        Ok(report)
    }
}

fn log_cycle(result: &Result<CycleReport>) {
    match result {
        Ok(r) if r.seeded > 0 || r.failed > 0 => info!(
            claimed = r.claimed,
            seeded = r.seeded,
            failed = r.failed,
            inserted = r.inserted,
            opened = r.opened,
            "seed cycle complete"
        ),
        Ok(_) => debug!("seed cycle found no due sessions"),
        Err(e) if e.is_transient() => warn!(error = %e, "seed cycle abandoned, will retry"),
        Err(e) => error!(error = %e, "seed cycle failed"),
    }
}
