use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;

use super::{RankPosition, RankingEntry, RankingStore};
use crate::domain::{CompetitionId, UserId};
use crate::error::{CoreError, ErrorKind, Result};

/// Wraps a ranking store so that no call can block indefinitely.
///
/// Every call carries `deadline`; expiry surfaces as
/// [`CoreError::Unavailable`]. Reads and pings are retried with exponential
/// backoff up to `read_retries` extra times. `add_score` is never retried
/// since a timed-out increment may already have been applied.
pub struct BoundedRankingStore {
    inner: Arc<dyn RankingStore>,
    deadline: Duration,
    read_retries: usize,
}

impl BoundedRankingStore {
    pub fn new(inner: Arc<dyn RankingStore>, deadline: Duration, read_retries: usize) -> Self {
        Self {
            inner,
            deadline,
            read_retries,
        }
    }

    async fn with_deadline<T, Fut>(&self, op: &str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::unavailable(format!(
                "ranking store {} timed out after {}",
                op,
                humantime::format_duration(self.deadline)
            ))),
        }
    }

    async fn read<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let retry_strategy = ExponentialBackoff::from_millis(10)
            .max_delay(Duration::from_millis(250))
            .take(self.read_retries);

        RetryIf::start(
            retry_strategy,
            || self.with_deadline(op, call()),
            |e: &CoreError| !matches!(e.kind(), ErrorKind::Validation | ErrorKind::NotFound),
        )
        .await
    }
}

#[async_trait]
impl RankingStore for BoundedRankingStore {
    async fn add_score(
        &self,
        competition_id: &CompetitionId,
        user_id: &UserId,
        delta: f64,
    ) -> Result<f64> {
        self.with_deadline(
            "add_score",
            self.inner.add_score(competition_id, user_id, delta),
        )
        .await
    }

    async fn get_top(
        &self,
        competition_id: &CompetitionId,
        limit: usize,
    ) -> Result<Vec<RankingEntry>> {
        self.read("get_top", || self.inner.get_top(competition_id, limit))
            .await
    }

    async fn get_rank(
        &self,
        competition_id: &CompetitionId,
        user_id: &UserId,
    ) -> Result<Option<RankPosition>> {
        self.read("get_rank", || self.inner.get_rank(competition_id, user_id))
            .await
    }

    async fn ping(&self) -> Result<()> {
        self.read("ping", || self.inner.ping()).await
    }
}
