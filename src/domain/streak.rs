use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A user's global reading streak, independent of any competition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    /// Consecutive UTC calendar days with at least one reading event
    pub current: u32,
    /// Last UTC day that counted toward the streak (None until the first event)
    pub last_date: Option<NaiveDate>,
}

impl StreakState {
    /// Advance the streak with an event at `event_at`.
    ///
    /// Only the UTC calendar date matters. A repeat on the same day leaves the
    /// state untouched, the following day extends it, and anything else (a gap
    /// of more than one day, or a date before the last one) restarts at 1.
    pub fn advance(self, event_at: DateTime<Utc>) -> StreakState {
        self.advance_to_date(event_at.date_naive())
    }

    pub fn advance_to_date(self, day: NaiveDate) -> StreakState {
        let Some(last) = self.last_date else {
            return StreakState {
                current: 1,
                last_date: Some(day),
            };
        };

        if day == last {
            return self;
        }

        if last.succ_opt() == Some(day) {
            StreakState {
                current: self.current.saturating_add(1),
                last_date: Some(day),
            }
        } else {
            StreakState {
                current: 1,
                last_date: Some(day),
            }
        }
    }
}
