use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use super::{leaderboard_key, RankPosition, RankingEntry, RankingStore, DEFAULT_KEY_PREFIX};
use crate::domain::{CompetitionId, UserId};
use crate::error::{CoreError, Result};

/// f64 with a total order, so it can sit inside a `BTreeSet`.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// One sorted set: score lookup plus an index ordered by score descending,
/// then member id ascending.
#[derive(Debug, Default)]
struct RankedSet {
    scores: HashMap<UserId, f64>,
    order: BTreeSet<(Reverse<Score>, UserId)>,
}

impl RankedSet {
    fn incr(&mut self, user_id: &UserId, delta: f64) -> f64 {
        let old = self.scores.get(user_id).copied();
        if let Some(old) = old {
            self.order.remove(&(Reverse(Score(old)), user_id.clone()));
        }
        let new = old.unwrap_or(0.0) + delta;
        self.scores.insert(user_id.clone(), new);
        self.order.insert((Reverse(Score(new)), user_id.clone()));
        new
    }

    fn top(&self, limit: usize) -> Vec<RankingEntry> {
        self.order
            .iter()
            .take(limit)
            .map(|(Reverse(score), user_id)| RankingEntry {
                user_id: user_id.clone(),
                score: score.0,
            })
            .collect()
    }

    fn rank(&self, user_id: &UserId) -> Option<RankPosition> {
        let score = *self.scores.get(user_id)?;
        let rank = self
            .order
            .range(..(Reverse(Score(score)), user_id.clone()))
            .count();
        Some(RankPosition {
            rank: rank as u64,
            score,
        })
    }

    fn entries(&self) -> Vec<RankingEntry> {
        self.top(self.order.len())
    }
}

/// In-process ranking store. Each leaderboard key lives in its own `DashMap`
/// shard entry, so an increment and the rank read that follows it see one
/// consistent set.
#[derive(Debug)]
pub struct InMemoryRankingStore {
    prefix: String,
    sets: DashMap<String, RankedSet>,
    available: AtomicBool,
}

impl Default for InMemoryRankingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRankingStore {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            sets: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going down or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    /// All sets keyed by leaderboard key, entries in rank order.
    pub fn export(&self) -> BTreeMap<String, Vec<RankingEntry>> {
        self.sets
            .iter()
            .map(|set| (set.key().clone(), set.value().entries()))
            .collect()
    }

    /// Load sets previously produced by [`export`](Self::export), adding to
    /// whatever is already held.
    pub fn import(&self, sets: BTreeMap<String, Vec<RankingEntry>>) {
        for (key, entries) in sets {
            let mut set = self.sets.entry(key).or_default();
            for entry in entries {
                set.incr(&entry.user_id, entry.score);
            }
        }
    }

    fn key(&self, competition_id: &CompetitionId) -> String {
        leaderboard_key(&self.prefix, competition_id)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::unavailable("ranking store unavailable"))
        }
    }
}

#[async_trait]
impl RankingStore for InMemoryRankingStore {
    async fn add_score(
        &self,
        competition_id: &CompetitionId,
        user_id: &UserId,
        delta: f64,
    ) -> Result<f64> {
        self.ensure_available()?;
        if !delta.is_finite() || delta < 0.0 {
            return Err(CoreError::validation(
                "score delta must be a non-negative finite number",
            ));
        }
        let mut set = self.sets.entry(self.key(competition_id)).or_default();
        Ok(set.incr(user_id, delta))
    }

    async fn get_top(
        &self,
        competition_id: &CompetitionId,
        limit: usize,
    ) -> Result<Vec<RankingEntry>> {
        self.ensure_available()?;
        Ok(self
            .sets
            .get(&self.key(competition_id))
            .map(|set| set.top(limit))
            .unwrap_or_default())
    }

    async fn get_rank(
        &self,
        competition_id: &CompetitionId,
        user_id: &UserId,
    ) -> Result<Option<RankPosition>> {
        self.ensure_available()?;
        Ok(self
            .sets
            .get(&self.key(competition_id))
            .and_then(|set| set.rank(user_id)))
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }
}
