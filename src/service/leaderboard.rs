use std::sync::Arc;
use tracing::warn;

use crate::domain::{CompetitionId, UserId};
use crate::error::{CoreError, Result};
use crate::ranking::{RankPosition, RankingEntry, RankingStore};

pub const DEFAULT_LIMIT: usize = 50;

/// Read side of the ranking projection. Every read is gated on a liveness
/// check so a down store yields one `Unavailable` error instead of a
/// partial answer.
pub struct Leaderboard {
    store: Arc<dyn RankingStore>,
    default_limit: usize,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn RankingStore>) -> Self {
        Self {
            store,
            default_limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.max(1);
        self
    }

    async fn ensure_live(&self) -> Result<()> {
        self.store.ping().await.map_err(|e| {
            warn!(error = %e, "ranking store failed liveness check");
            CoreError::unavailable("leaderboard temporarily unavailable")
        })
    }

    pub async fn top(
        &self,
        competition_id: &CompetitionId,
        limit: Option<usize>,
    ) -> Result<Vec<RankingEntry>> {
        if competition_id.is_empty() {
            return Err(CoreError::validation("competition id is required"));
        }
        let limit = match limit {
            Some(0) => return Err(CoreError::validation("limit must be > 0")),
            Some(n) => n,
            None => self.default_limit,
        };
        self.ensure_live().await?;
        self.store.get_top(competition_id, limit).await
    }

    /// `None` when the user has no score in this competition.
    pub async fn rank(
        &self,
        competition_id: &CompetitionId,
        user_id: &UserId,
    ) -> Result<Option<RankPosition>> {
        if competition_id.is_empty() || user_id.is_empty() {
            return Err(CoreError::validation(
                "competition id and user id are required",
            ));
        }
        self.ensure_live().await?;
        self.store.get_rank(competition_id, user_id).await
    }
}
