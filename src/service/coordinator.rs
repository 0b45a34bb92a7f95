use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::lifecycle::{storage_error, CompetitionLifecycle};
use super::locks::LockTable;
use super::Repositories;
use crate::domain::{CompetitionId, ReadingEvent, UserId};
use crate::error::{CoreError, Result};
use crate::ranking::RankingStore;

pub const MAX_MINUTES_PER_EVENT: u32 = 1440;

/// A reading session reported by a user.
#[derive(Debug, Clone)]
pub struct LogReading {
    pub user_id: UserId,
    pub minutes: i64,
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// What happened to the ranking projection after a committed ledger update.
#[derive(Debug, Clone, PartialEq)]
pub enum RankingUpdate {
    Posted { score: f64 },
    Degraded { reason: String },
}

/// Per-competition result of one reading event.
#[derive(Debug, Clone, PartialEq)]
pub enum Accrual {
    /// The participant ledger was persisted.
    Committed {
        competition_id: CompetitionId,
        points_delta: u64,
        points: u64,
        days_read: u32,
        ranking: RankingUpdate,
    },
    /// The competition stopped being active between lookup and update.
    Skipped {
        competition_id: CompetitionId,
        reason: String,
    },
    LedgerFailed {
        competition_id: CompetitionId,
        error: CoreError,
    },
}

impl Accrual {
    pub fn competition_id(&self) -> &CompetitionId {
        match self {
            Accrual::Committed { competition_id, .. }
            | Accrual::Skipped { competition_id, .. }
            | Accrual::LedgerFailed { competition_id, .. } => competition_id,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Accrual::Committed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingOutcome {
    pub streak: u32,
    pub total_minutes: u64,
    pub accruals: Vec<Accrual>,
}

impl ReadingOutcome {
    /// Competitions whose ledger could not be updated for this event.
    pub fn ledger_failures(&self) -> usize {
        self.accruals
            .iter()
            .filter(|a| matches!(a, Accrual::LedgerFailed { .. }))
            .count()
    }
}

/// Applies a reading event to the user's global streak and to every active
/// competition the user participates in.
pub struct ScoringCoordinator {
    repos: Repositories,
    lifecycle: Arc<CompetitionLifecycle>,
    ranking: Arc<dyn RankingStore>,
    locks: Arc<LockTable>,
    max_minutes: u32,
}

impl ScoringCoordinator {
    pub fn new(
        repos: Repositories,
        lifecycle: Arc<CompetitionLifecycle>,
        ranking: Arc<dyn RankingStore>,
        locks: Arc<LockTable>,
    ) -> Self {
        Self {
            repos,
            lifecycle,
            ranking,
            locks,
            max_minutes: MAX_MINUTES_PER_EVENT,
        }
    }

    /// Lower the per-event minute cap. Values outside `1..=1440` are clamped.
    pub fn with_max_minutes(mut self, max_minutes: u32) -> Self {
        self.max_minutes = max_minutes.clamp(1, MAX_MINUTES_PER_EVENT);
        self
    }

    fn validate(&self, cmd: &LogReading, now: DateTime<Utc>) -> Result<u32> {
        if cmd.user_id.is_empty() {
            return Err(CoreError::validation("user id is required"));
        }
        if cmd.minutes <= 0 {
            return Err(CoreError::validation("minutes must be > 0"));
        }
        if cmd.minutes > i64::from(self.max_minutes) {
            return Err(CoreError::validation(format!(
                "minutes must be <= {}",
                self.max_minutes
            )));
        }
        if cmd.timestamp > now {
            return Err(CoreError::validation("timestamp cannot be in the future"));
        }
        u32::try_from(cmd.minutes).map_err(|_| CoreError::validation("minutes out of range"))
    }

    pub async fn handle_reading_event(&self, cmd: LogReading) -> Result<ReadingOutcome> {
        let minutes = self.validate(&cmd, Utc::now())?;
        let user_id = cmd.user_id;
        let at = cmd.timestamp;

        let (streak, total_minutes) = {
            let _user_guard = self.locks.user(&user_id).await;

            let mut user = self
                .repos
                .users
                .get(&user_id)
                .await
                .map_err(|e| storage_error(e, "failed to load user"))?;
            let progress = user.log_reading(minutes, at);
            self.repos
                .users
                .save(&user)
                .await
                .map_err(|e| storage_error(e, "failed to save user"))?;
            progress
        };

        let event = ReadingEvent::new(
            user_id.clone(),
            minutes,
            cmd.source.as_deref().unwrap_or_default(),
            at,
        );
        self.repos
            .readings
            .save(&event)
            .await
            .map_err(|e| storage_error(e, "failed to save reading"))?;

        let active = self.lifecycle.find_active(at).await?;

        let mut pending: FuturesUnordered<_> = active
            .into_iter()
            .filter(|c| c.has_participant(&user_id))
            .map(|c| self.accrue(c.id, &user_id, minutes, at))
            .collect();

        debug!(
            user = %user_id,
            minutes,
            competitions = pending.len(),
            "fanning out reading event"
        );

        let mut accruals = Vec::with_capacity(pending.len());
        while let Some(accrual) = pending.next().await {
            accruals.push(accrual);
        }

        Ok(ReadingOutcome {
            streak,
            total_minutes,
            accruals,
        })
    }

    async fn accrue(
        &self,
        competition_id: CompetitionId,
        user_id: &UserId,
        minutes: u32,
        at: DateTime<Utc>,
    ) -> Accrual {
        let (points_delta, points, days_read) = {
            let guard = self.locks.participant(&competition_id, user_id).await;

            let mut competition = match self.lifecycle.get(&competition_id).await {
                Ok(c) => c,
                Err(e) => {
                    error!(
                        competition = %competition_id,
                        user = %user_id,
                        error = %e,
                        "ledger read failed"
                    );
                    return Accrual::LedgerFailed {
                        competition_id,
                        error: e,
                    };
                }
            };

            if !competition.is_active(at) {
                debug!(
                    competition = %competition_id,
                    user = %user_id,
                    "competition closed while event was in flight"
                );
                if competition.is_closed() {
                    drop(guard);
                    self.locks.forget_competition(&competition_id);
                }
                return Accrual::Skipped {
                    competition_id,
                    reason: "competition is no longer active".to_string(),
                };
            }

            let rules = competition.rules;
            let Some(participant) = competition.participant_mut(user_id) else {
                return Accrual::Skipped {
                    competition_id,
                    reason: "user is not a participant".to_string(),
                };
            };

            let points_delta = match participant.add_reading(minutes, at, rules) {
                Ok(delta) => delta,
                Err(e) => {
                    return Accrual::LedgerFailed {
                        competition_id,
                        error: e,
                    }
                }
            };

            if let Err(e) = self
                .repos
                .competitions
                .save_participant(&competition_id, participant)
                .await
            {
                error!(
                    competition = %competition_id,
                    user = %user_id,
                    error = %e,
                    "ledger update failed"
                );
                return Accrual::LedgerFailed {
                    competition_id,
                    error: storage_error(e, "failed to save participant"),
                };
            }

            (points_delta, participant.points, participant.days_read)
        };

        let ranking = match self
            .ranking
            .add_score(&competition_id, user_id, points_delta as f64)
            .await
        {
            Ok(score) => RankingUpdate::Posted { score },
            Err(e) => {
                warn!(
                    competition = %competition_id,
                    user = %user_id,
                    delta = points_delta,
                    error = %e,
                    "ranking update dropped"
                );
                RankingUpdate::Degraded {
                    reason: e.to_string(),
                }
            }
        };

        Accrual::Committed {
            competition_id,
            points_delta,
            points,
            days_read,
            ranking,
        }
    }
}
