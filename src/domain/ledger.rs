use chrono::{DateTime, Utc};

use super::competition::{Participant, Rules};
use crate::error::{CoreError, Result};

impl Participant {
    /// Apply one reading event and return the points it earned.
    ///
    /// Points and minutes accrue on every call. `days_read` grows by one only
    /// when the event's UTC date is strictly after the stored last-log date.
    /// An event dated before the last-log date still earns points but neither
    /// counts a day nor moves `last_log_date` backwards.
    pub fn add_reading(
        &mut self,
        minutes: u32,
        at: DateTime<Utc>,
        rules: Rules,
    ) -> Result<u64> {
        if minutes == 0 {
            return Err(CoreError::validation("minutes must be > 0"));
        }

        let delta = u64::from(rules.points_per_minute) * u64::from(minutes);
        self.points = self.points.saturating_add(delta);
        self.minutes_total = self.minutes_total.saturating_add(u64::from(minutes));

        let day = at.date_naive();
        match self.last_log_date {
            None => {
                self.days_read = 1;
                self.last_log_date = Some(day);
            }
            Some(last) if day > last => {
                self.days_read = self.days_read.saturating_add(1);
                self.last_log_date = Some(day);
            }
            Some(_) => {}
        }

        Ok(delta)
    }
}
