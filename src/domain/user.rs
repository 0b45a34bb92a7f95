use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::competition::UserId;
use super::streak::StreakState;
use crate::error::{CoreError, Result};

const MIN_DISPLAY_NAME: usize = 2;
const MAX_DISPLAY_NAME: usize = 64;

/// A reader. Only the streak and lifetime-minute fields are owned by this
/// crate; identity and credentials live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub streak: StreakState,
    #[serde(default)]
    pub total_minutes: u64,
}

impl User {
    pub fn new(email: &str, display_name: &str) -> Result<Self> {
        let email = email.trim();
        if email.is_empty() {
            return Err(CoreError::validation("email is required"));
        }
        if !looks_like_email(email) {
            return Err(CoreError::validation("invalid email format"));
        }

        let display_name = display_name.trim();
        let len = display_name.chars().count();
        if len < MIN_DISPLAY_NAME {
            return Err(CoreError::validation(
                "display name must be at least 2 characters",
            ));
        }
        if len > MAX_DISPLAY_NAME {
            return Err(CoreError::validation("display name too long"));
        }

        Ok(Self {
            id: UserId::generate(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            streak: StreakState::default(),
            total_minutes: 0,
        })
    }

    /// Advance the global streak and add to lifetime minutes.
    /// Returns `(streak, total_minutes)` after the update.
    pub fn log_reading(&mut self, minutes: u32, at: DateTime<Utc>) -> (u32, u64) {
        self.streak = self.streak.advance(at);
        self.total_minutes = self.total_minutes.saturating_add(u64::from(minutes));
        (self.streak.current, self.total_minutes)
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !s.chars().any(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    }
}
