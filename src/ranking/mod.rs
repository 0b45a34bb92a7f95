//! Per-competition ranked sets.
//!
//! The ranking store is a best-effort projection of the competition ledgers:
//! scores only move by relative increments, so late or reordered posts still
//! converge on the same totals.

pub mod bounded;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CompetitionId, UserId};
use crate::error::Result;

pub use bounded::BoundedRankingStore;
pub use memory::InMemoryRankingStore;

pub const DEFAULT_KEY_PREFIX: &str = "leaderboard:cmp:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub user_id: UserId,
    pub score: f64,
}

/// Position of one member: `rank` is 0-based, highest score first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankPosition {
    pub rank: u64,
    pub score: f64,
}

impl RankPosition {
    /// 1-based rank for display.
    pub fn place(&self) -> u64 {
        self.rank + 1
    }
}

pub fn leaderboard_key(prefix: &str, competition_id: &CompetitionId) -> String {
    format!("{}{}", prefix, competition_id)
}

#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Atomically add `delta` to the member's score, creating the member if
    /// absent. Returns the new score.
    async fn add_score(
        &self,
        competition_id: &CompetitionId,
        user_id: &UserId,
        delta: f64,
    ) -> Result<f64>;

    /// Up to `limit` entries, highest score first. Tie order is the store's own.
    async fn get_top(&self, competition_id: &CompetitionId, limit: usize)
        -> Result<Vec<RankingEntry>>;

    /// `None` when the member has no recorded score.
    async fn get_rank(
        &self,
        competition_id: &CompetitionId,
        user_id: &UserId,
    ) -> Result<Option<RankPosition>>;

    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaderboard_key_format() {
        let key = leaderboard_key(DEFAULT_KEY_PREFIX, &CompetitionId::from("abc"));
        assert_eq!(key, "leaderboard:cmp:abc");
    }

    #[test]
    fn test_place_is_one_based() {
        let pos = RankPosition { rank: 0, score: 3.0 };
        assert_eq!(pos.place(), 1);
    }
}
