//! Row builders shared by the unit tests in this crate.

use chrono::{DateTime, Utc};
use rollcall_core::{db_time, SectionId, SessionId, SessionStatus, TenantId};
use rusqlite::{params, Connection};

use crate::db::init_db;

pub fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_db(&conn).unwrap();
    conn
}

pub fn add_section(conn: &Connection, tenant: TenantId) -> SectionId {
    conn.execute(
        "INSERT INTO class_sections (tenant_id, name, created_at) VALUES (?1, 'Hifz A', ?2)",
        params![tenant.get(), db_time(Utc::now())],
    )
    .unwrap();
    SectionId(conn.last_insert_rowid())
}

pub fn add_session(
    conn: &Connection,
    tenant: TenantId,
    section: SectionId,
    starts_at: Option<DateTime<Utc>>,
    status: SessionStatus,
) -> SessionId {
    let now = db_time(Utc::now());
    conn.execute(
        "INSERT INTO class_attendance_sessions
         (tenant_id, class_section_id, starts_at, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            tenant.get(),
            section.get(),
            starts_at.map(db_time),
            status.as_str(),
            now
        ],
    )
    .unwrap();
    SessionId(conn.last_insert_rowid())
}

/// Enroll students `first..first + count` in `section`.
pub fn enroll(
    conn: &Connection,
    tenant: TenantId,
    section: SectionId,
    first: i64,
    count: i64,
    active: bool,
) {
    let now = db_time(Utc::now());
    for student in first..first + count {
        conn.execute(
            "INSERT INTO class_section_students
             (tenant_id, class_section_id, student_id, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![tenant.get(), section.get(), student, active, now],
        )
        .unwrap();
    }
}

pub fn soft_delete_session(conn: &Connection, session: SessionId) {
    conn.execute(
        "UPDATE class_attendance_sessions SET deleted_at = ?2 WHERE id = ?1",
        params![session.get(), db_time(Utc::now())],
    )
    .unwrap();
}

pub fn record_count(conn: &Connection, session: SessionId) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM attendance_records WHERE session_id = ?1 AND deleted_at IS NULL",
        [session.get()],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn session_status(conn: &Connection, session: SessionId) -> SessionStatus {
    let raw: String = conn
        .query_row(
            "SELECT status FROM class_attendance_sessions WHERE id = ?1",
            [session.get()],
            |row| row.get(0),
        )
        .unwrap();
    raw.parse().unwrap()
}
