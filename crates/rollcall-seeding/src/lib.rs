//! `rollcall-seeding`: attendance placeholder seeding with SQLite persistence.
//!
//! # Overview
//!
//! Marking attendance needs one `attendance_records` row per active student
//! of a session's class section. Those rows are created here, by two paths
//! that share the same idempotent primitive ([`seed::seed`]):
//!
//! | Path | Trigger | Transaction |
//! |------|---------|-------------|
//! | [`SeedScheduler`] | timer, every poll interval | one per cycle, one savepoint per session |
//! | [`OnDemandSeeder`] | request handler needs the rows now | one per call |
//!
//! Both may run at the same time against the same session, from different
//! processes. Neither checks before inserting: the insert skips rows that
//! already exist, and the `scheduled` to `open` update only matches a
//! session that is still `scheduled`, so any interleaving converges on the
//! same state.

pub mod db;
pub mod engine;
pub mod error;
pub mod on_demand;
pub mod requests;
pub mod seed;
pub mod store;
pub mod types;
pub mod window;

#[cfg(test)]
mod fixtures;

pub use engine::{claim_due_sessions, SeedScheduler};
pub use error::{Result, SeedingError};
pub use on_demand::OnDemandSeeder;
pub use requests::{request_seed, serve_requests, SeedRequest};
pub use seed::seed;
pub use types::{CycleReport, DueSession, SeedOutcome};
pub use window::ScanWindow;
