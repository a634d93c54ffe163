use chrono::{DateTime, Duration, Utc};
use rollcall_core::db_time;

/// Inclusive `[from, to]` range of session start times a cycle treats as due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ScanWindow {
    /// Window for a cycle running at `now`: `grace` back to cover sessions
    /// that became due while no scheduler was running, `lookahead` forward.
    ///
    /// `None` when either bound falls outside the representable date range.
    pub fn around(now: DateTime<Utc>, grace: Duration, lookahead: Duration) -> Option<Self> {
        Some(Self {
            from: now.checked_sub_signed(grace)?,
            to: now.checked_add_signed(lookahead)?,
        })
    }

    /// Bounds encoded for comparison against `starts_at`.
    pub fn db_bounds(&self) -> (String, String) {
        (db_time(self.from), db_time(self.to))
    }
}
