use chrono::Utc;
use rollcall_core::{db_time, AttendanceStatus, SessionId, SessionStatus, TenantId};
use rusqlite::{params, Connection};
use tracing::{debug, instrument};

use crate::error::{Result, SeedingError};
use crate::types::SeedOutcome;

// One placeholder per active enrollment. Existing live rows are left alone
// by the conflict clause, which is what makes re-running safe while another
// seeder works on the same session. The session row is joined with its
// tenant so a bare id can never reach another tenant's section.
const INSERT_PLACEHOLDERS: &str = "
    INSERT INTO attendance_records
        (tenant_id, session_id, student_id, status, created_at, updated_at)
    SELECT s.tenant_id, s.id, css.student_id, ?3, ?4, ?4
    FROM class_attendance_sessions s
    JOIN class_section_students css
      ON css.class_section_id = s.class_section_id
     AND css.tenant_id = s.tenant_id
    WHERE s.id = ?1
      AND s.tenant_id = ?2
      AND s.deleted_at IS NULL
      AND css.is_active = 1
    ON CONFLICT (session_id, student_id) WHERE deleted_at IS NULL DO NOTHING";

const OPEN_IF_SCHEDULED: &str = "
    UPDATE class_attendance_sessions
    SET status = ?3, updated_at = ?5
    WHERE id = ?1
      AND tenant_id = ?2
      AND status = ?4
      AND deleted_at IS NULL";

/// Materialise placeholder attendance rows for one session.
///
/// Must run inside a transaction owned by the caller (`Transaction` and
/// `Savepoint` both deref to `Connection`); returns
/// [`SeedingError::NotInTransaction`] on an autocommit connection. With
/// `auto_open`, a session still `scheduled` is moved to `open`; any other
/// status is left as it is.
///
/// Repeatable: a second call with the same arguments inserts nothing and
/// opens nothing.
#[instrument(skip_all, fields(session_id = %session_id, tenant_id = %tenant_id, auto_open = auto_open))]
pub fn seed(
    conn: &Connection,
    session_id: SessionId,
    tenant_id: TenantId,
    auto_open: bool,
) -> Result<SeedOutcome> {
    if conn.is_autocommit() {
        return Err(SeedingError::NotInTransaction);
    }
    let now = db_time(Utc::now());

    let inserted = conn.prepare_cached(INSERT_PLACEHOLDERS)?.execute(params![
        session_id.get(),
        tenant_id.get(),
        AttendanceStatus::Unmarked.as_str(),
        now,
    ])?;

    let opened = auto_open
        && conn.prepare_cached(OPEN_IF_SCHEDULED)?.execute(params![
            session_id.get(),
            tenant_id.get(),
            SessionStatus::Open.as_str(),
            SessionStatus::Scheduled.as_str(),
            now,
        ])? > 0;

    debug!(inserted, opened, "session seeded");
    Ok(SeedOutcome { inserted, opened })
}
