use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::competition::UserId;

pub const UNKNOWN_SOURCE: &str = "unknown";

/// An immutable record of one reading session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingEvent {
    pub id: String,
    pub user_id: UserId,
    pub minutes: u32,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl ReadingEvent {
    pub fn new(user_id: UserId, minutes: u32, source: &str, timestamp: DateTime<Utc>) -> Self {
        let source = source.trim();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            minutes,
            source: if source.is_empty() {
                UNKNOWN_SOURCE.to_string()
            } else {
                source.to_string()
            },
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_source_defaults_to_unknown() {
        let ev = ReadingEvent::new(UserId::from("u"), 5, "  ", Utc::now());
        assert_eq!(ev.source, UNKNOWN_SOURCE);
        assert!(!ev.id.is_empty());

        let ev = ReadingEvent::new(UserId::from("u"), 5, "kindle", Utc::now());
        assert_eq!(ev.source, "kindle");
    }
}
