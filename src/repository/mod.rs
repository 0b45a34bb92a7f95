//! Storage contracts consumed by the services.
//!
//! Every lookup reports a missing entity as [`CoreError::NotFound`], distinct
//! from storage failures ([`CoreError::Server`]).
//!
//! [`CoreError::NotFound`]: crate::error::CoreError::NotFound
//! [`CoreError::Server`]: crate::error::CoreError::Server

pub mod memory;
pub mod snapshot;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Competition, CompetitionId, Participant, ReadingEvent, User, UserId};
use crate::error::Result;

pub use memory::{InMemoryCompetitionRepository, InMemoryReadingRepository, InMemoryUserRepository};
pub use snapshot::{load_snapshot, save_snapshot, Snapshot};

#[async_trait]
pub trait CompetitionRepository: Send + Sync {
    async fn create(&self, competition: &Competition) -> Result<()>;

    /// Whole-competition upsert.
    async fn save(&self, competition: &Competition) -> Result<()>;

    /// Upsert a single participant without touching the rest of the aggregate.
    async fn save_participant(
        &self,
        competition_id: &CompetitionId,
        participant: &Participant,
    ) -> Result<()>;

    async fn get(&self, id: &CompetitionId) -> Result<Competition>;

    async fn get_all(&self) -> Result<Vec<Competition>>;

    async fn find_active(&self, at: DateTime<Utc>) -> Result<Vec<Competition>>;

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Competition>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: &UserId) -> Result<User>;

    async fn save(&self, user: &User) -> Result<()>;

    async fn find_by_email(&self, email: &str) -> Result<User>;
}

/// Append-only log of reading events.
#[async_trait]
pub trait ReadingRepository: Send + Sync {
    async fn save(&self, event: &ReadingEvent) -> Result<()>;
}
