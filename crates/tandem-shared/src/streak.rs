//! Streak day-math.
//!
//! A day *qualifies* when both partners have each submitted at least one
//! streak photo on the same calendar day ("today" is one shared reference
//! clock: the server's UTC day).  The counter increments only when the
//! qualifying day immediately follows the previous one; a longer gap resets
//! the streak to 1, never to 0.  The historical best never decreases.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A streak counter snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakState {
    /// Current consecutive-day count.
    pub current: u32,
    /// Historical maximum.
    pub best: u32,
    /// Most recent day on which both partners submitted.
    pub last_qualifying_day: Option<NaiveDate>,
}

/// Returns `true` if a submission timestamp falls on `day` (UTC).
pub fn submitted_on(ts: Option<DateTime<Utc>>, day: NaiveDate) -> bool {
    ts.map(|t| t.date_naive() == day).unwrap_or(false)
}

/// Advance the streak for a newly qualifying `today`.
///
/// Callers invoke this only once both partners' last submissions fall on
/// `today`.  Re-qualifying the same day is a no-op (same-day resubmission
/// must not double count).
pub fn advance(state: &StreakState, today: NaiveDate) -> StreakState {
    let current = match state.last_qualifying_day {
        Some(last) if last == today => return *state,
        Some(last) if last == today - Duration::days(1) => state.current + 1,
        _ => 1,
    };

    StreakState {
        current,
        best: state.best.max(current),
        last_qualifying_day: Some(today),
    }
}
