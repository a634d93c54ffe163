use rollcall_core::{SessionId, SessionStatus, TenantId};
use serde::{Deserialize, Serialize};

/// A session claimed by a scheduler cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueSession {
    pub id: SessionId,
    pub tenant_id: TenantId,
    /// Stored `db_time` string; never NULL for a claimed session.
    pub starts_at: String,
    pub status: SessionStatus,
}

/// What one call of [`seed`](crate::seed::seed) changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedOutcome {
    /// Placeholder rows inserted; zero when everything was already seeded.
    pub inserted: usize,
    /// Whether the guarded `scheduled` to `open` update matched.
    pub opened: bool,
}

/// Summary of one scheduler cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// False when the scheduler is disabled and the store was not touched.
    pub ran: bool,
    pub claimed: usize,
    pub seeded: usize,
    pub failed: usize,
    pub inserted: usize,
    pub opened: usize,
}

impl CycleReport {
    pub fn skipped() -> Self {
        Self::default()
    }
}
