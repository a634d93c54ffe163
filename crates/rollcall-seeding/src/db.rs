use rusqlite::Connection;

use crate::error::Result;

/// Initialise the attendance schema in `conn`.
///
/// Safe to call on every startup; uses `IF NOT EXISTS` throughout. The
/// partial unique index on `attendance_records` is what makes seeding
/// idempotent: inserts that collide with a live row are dropped by
/// `ON CONFLICT ... DO NOTHING`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS class_sections (
            id          INTEGER PRIMARY KEY,
            tenant_id   INTEGER NOT NULL,
            name        TEXT    NOT NULL,
            created_at  TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS class_attendance_sessions (
            id                INTEGER PRIMARY KEY,
            tenant_id         INTEGER NOT NULL,
            class_section_id  INTEGER NOT NULL REFERENCES class_sections(id),
            starts_at         TEXT,               -- db_time() or NULL when unscheduled
            status            TEXT    NOT NULL DEFAULT 'scheduled',
            deleted_at        TEXT,               -- soft delete marker
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL
        );

        -- Candidate scan: WHERE status IN (...) AND starts_at BETWEEN ? AND ?
        CREATE INDEX IF NOT EXISTS idx_sessions_status_starts
            ON class_attendance_sessions (status, starts_at);

        CREATE TABLE IF NOT EXISTS class_section_students (
            id                INTEGER PRIMARY KEY,
            tenant_id         INTEGER NOT NULL,
            class_section_id  INTEGER NOT NULL REFERENCES class_sections(id),
            student_id        INTEGER NOT NULL,
            is_active         INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT    NOT NULL,
            UNIQUE (class_section_id, student_id)
        );

        CREATE TABLE IF NOT EXISTS attendance_records (
            id          INTEGER PRIMARY KEY,
            tenant_id   INTEGER NOT NULL,
            session_id  INTEGER NOT NULL REFERENCES class_attendance_sessions(id),
            student_id  INTEGER NOT NULL,
            status      TEXT    NOT NULL DEFAULT 'unmarked',
            deleted_at  TEXT,
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        );

        -- At most one live record per (session, student).
        CREATE UNIQUE INDEX IF NOT EXISTS ux_attendance_records_live
            ON attendance_records (session_id, student_id)
            WHERE deleted_at IS NULL;
        ",
    )?;
    Ok(())
}
