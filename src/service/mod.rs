//! Application services wired over the repository and ranking contracts.

pub mod coordinator;
pub mod leaderboard;
pub mod lifecycle;
pub mod locks;
pub mod users;

use std::sync::Arc;

use crate::ranking::RankingStore;
use crate::repository::{CompetitionRepository, ReadingRepository, UserRepository};

pub use coordinator::{Accrual, LogReading, RankingUpdate, ReadingOutcome, ScoringCoordinator};
pub use leaderboard::Leaderboard;
pub use lifecycle::{parse_instant, CompetitionLifecycle, CreateCompetition};
pub use locks::LockTable;
pub use users::UserDirectory;

/// Storage handles shared by the services.
#[derive(Clone)]
pub struct Repositories {
    pub competitions: Arc<dyn CompetitionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub readings: Arc<dyn ReadingRepository>,
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub max_minutes_per_event: u32,
    pub default_limit: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            max_minutes_per_event: coordinator::MAX_MINUTES_PER_EVENT,
            default_limit: leaderboard::DEFAULT_LIMIT,
        }
    }
}

/// Every service, sharing one lock table.
pub struct Services {
    pub users: UserDirectory,
    pub lifecycle: Arc<CompetitionLifecycle>,
    pub coordinator: ScoringCoordinator,
    pub leaderboard: Leaderboard,
}

impl Services {
    pub fn new(
        repos: Repositories,
        ranking: Arc<dyn RankingStore>,
        options: ServiceOptions,
    ) -> Self {
        let locks = Arc::new(LockTable::new());
        let lifecycle = Arc::new(CompetitionLifecycle::new(
            repos.competitions.clone(),
            repos.users.clone(),
            locks.clone(),
        ));
        let coordinator = ScoringCoordinator::new(
            repos.clone(),
            lifecycle.clone(),
            ranking.clone(),
            locks.clone(),
        )
        .with_max_minutes(options.max_minutes_per_event);
        let leaderboard = Leaderboard::new(ranking).with_default_limit(options.default_limit);

        Self {
            users: UserDirectory::new(repos.users, locks),
            lifecycle,
            coordinator,
            leaderboard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::InMemoryRankingStore;
    use crate::repository::{
        InMemoryCompetitionRepository, InMemoryReadingRepository, InMemoryUserRepository,
    };
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_end_to_end_close_ranks_by_points() {
        let services = Services::new(
            Repositories {
                competitions: Arc::new(InMemoryCompetitionRepository::new()),
                users: Arc::new(InMemoryUserRepository::new()),
                readings: Arc::new(InMemoryReadingRepository::new()),
            },
            Arc::new(InMemoryRankingStore::new()),
            ServiceOptions::default(),
        );

        let now = Utc::now();
        let cmp = services
            .lifecycle
            .create(CreateCompetition {
                name: "Sprint".to_string(),
                start: now - Duration::days(3),
                end: now + Duration::days(3),
                points_per_minute: 2,
            })
            .await
            .unwrap();

        let ann = services.users.register("ann@example.com", "Ann").await.unwrap();
        let bob = services.users.register("bob@example.com", "Bob").await.unwrap();
        services.lifecycle.join(&cmp.id, &ann.id).await.unwrap();
        services.lifecycle.join(&cmp.id, &bob.id).await.unwrap();

        for (user, minutes, days_ago) in [(&ann, 20, 2), (&ann, 30, 1), (&bob, 15, 1)] {
            services
                .coordinator
                .handle_reading_event(LogReading {
                    user_id: user.id.clone(),
                    minutes,
                    source: Some("paper".to_string()),
                    timestamp: now - Duration::days(days_ago),
                })
                .await
                .unwrap();
        }

        let top = services.leaderboard.top(&cmp.id, Some(1)).await.unwrap();
        assert_eq!(top[0].user_id, ann.id);
        assert_eq!(top[0].score, 100.0);

        let standings = services.lifecycle.close(&cmp.id).await.unwrap();
        assert_eq!(standings[0].user_id, ann.id);
        let winner = &standings[0];
        assert_eq!((winner.points, winner.minutes_total, winner.days_read), (100, 50, 2));
        assert_eq!(standings[1].points, 30);
    }
}
