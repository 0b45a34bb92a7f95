use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompetitionId(String);

impl CompetitionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for CompetitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CompetitionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CompetitionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Scoring rules of a competition: a linear points-per-minute multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    pub points_per_minute: u32,
}

impl Rules {
    pub fn new(points_per_minute: i64) -> Result<Self> {
        if points_per_minute <= 0 {
            return Err(CoreError::validation("points_per_minute must be > 0"));
        }
        let points_per_minute = u32::try_from(points_per_minute)
            .map_err(|_| CoreError::validation("points_per_minute is too large"))?;
        Ok(Self { points_per_minute })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Open,
    Closed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Open => f.write_str("open"),
            Status::Closed => f.write_str("closed"),
        }
    }
}

/// A user's accrual state inside one competition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub points: u64,
    pub minutes_total: u64,
    pub days_read: u32,
    pub last_log_date: Option<NaiveDate>,
}

impl Participant {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            points: 0,
            minutes_total: 0,
            days_read: 0,
            last_log_date: None,
        }
    }
}

/// One row of the final standings, produced when a competition closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub user_id: UserId,
    pub points: u64,
    pub days_read: u32,
    pub minutes_total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    pub id: CompetitionId,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rules: Rules,
    pub status: Status,
    #[serde(default)]
    pub participants: HashMap<UserId, Participant>,
}

impl Competition {
    /// Create an open competition with no participants.
    pub fn new(
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        rules: Rules,
    ) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("competition name is required"));
        }
        if rules.points_per_minute == 0 {
            return Err(CoreError::validation("points_per_minute must be > 0"));
        }
        if end < start {
            return Err(CoreError::validation(
                "end_date cannot be before start_date",
            ));
        }

        Ok(Self {
            id: CompetitionId::generate(),
            name: name.to_string(),
            start,
            end,
            rules,
            status: Status::Open,
            participants: HashMap::new(),
        })
    }

    /// Open and `start <= at <= end`. A competition past its end date is not
    /// active even while its status is still `Open`.
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.status == Status::Open && self.start <= at && at <= self.end
    }

    pub fn is_closed(&self) -> bool {
        self.status == Status::Closed
    }

    pub fn participant(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.get(user_id)
    }

    pub fn participant_mut(&mut self, user_id: &UserId) -> Option<&mut Participant> {
        self.participants.get_mut(user_id)
    }

    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.contains_key(user_id)
    }

    /// Add a zero-state participant. Fails on a closed competition or a
    /// duplicate join.
    pub fn join(&mut self, user_id: UserId) -> Result<&Participant> {
        if self.is_closed() {
            return Err(CoreError::validation("competition is closed"));
        }
        if self.participants.contains_key(&user_id) {
            return Err(CoreError::validation(
                "user already joined this competition",
            ));
        }
        let participant = Participant::new(user_id.clone());
        Ok(self.participants.entry(user_id).or_insert(participant))
    }

    /// Transition to `Closed` and return the standings. Closed is terminal.
    pub fn close(&mut self) -> Result<Vec<Standing>> {
        if self.is_closed() {
            return Err(CoreError::validation("competition already closed"));
        }
        self.status = Status::Closed;
        Ok(self.standings())
    }

    /// All participants sorted by points, highest first. Equal points come
    /// out in map iteration order, which is unspecified.
    pub fn standings(&self) -> Vec<Standing> {
        let mut list: Vec<Standing> = self
            .participants
            .values()
            .map(|p| Standing {
                user_id: p.user_id.clone(),
                points: p.points,
                days_read: p.days_read,
                minutes_total: p.minutes_total,
            })
            .collect();

        list.sort_by(|a, b| b.points.cmp(&a.points));
        list
    }
}
