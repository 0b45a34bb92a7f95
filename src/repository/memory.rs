use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CompetitionRepository, ReadingRepository, UserRepository};
use crate::domain::{Competition, CompetitionId, Participant, ReadingEvent, User, UserId};
use crate::error::{CoreError, Result};

#[derive(Debug, Default)]
pub struct InMemoryCompetitionRepository {
    store: RwLock<HashMap<CompetitionId, Competition>>,
}

impl InMemoryCompetitionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_competitions(competitions: Vec<Competition>) -> Self {
        let store = competitions
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        Self {
            store: RwLock::new(store),
        }
    }

    /// Copy of every stored competition, ordered by start then name.
    pub async fn export(&self) -> Vec<Competition> {
        let store = self.store.read().await;
        sorted(store.values().cloned().collect())
    }
}

fn sorted(mut list: Vec<Competition>) -> Vec<Competition> {
    list.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.name.cmp(&b.name)));
    list
}

#[async_trait]
impl CompetitionRepository for InMemoryCompetitionRepository {
    async fn create(&self, competition: &Competition) -> Result<()> {
        let mut store = self.store.write().await;
        if store.contains_key(&competition.id) {
            return Err(CoreError::server(format!(
                "competition {} already exists",
                competition.id
            )));
        }
        store.insert(competition.id.clone(), competition.clone());
        Ok(())
    }

    async fn save(&self, competition: &Competition) -> Result<()> {
        let mut store = self.store.write().await;
        store.insert(competition.id.clone(), competition.clone());
        Ok(())
    }

    async fn save_participant(
        &self,
        competition_id: &CompetitionId,
        participant: &Participant,
    ) -> Result<()> {
        let mut store = self.store.write().await;
        let competition = store
            .get_mut(competition_id)
            .ok_or_else(|| CoreError::not_found("competition not found"))?;
        competition
            .participants
            .insert(participant.user_id.clone(), participant.clone());
        Ok(())
    }

    async fn get(&self, id: &CompetitionId) -> Result<Competition> {
        let store = self.store.read().await;
        store
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("competition not found"))
    }

    async fn get_all(&self) -> Result<Vec<Competition>> {
        Ok(self.export().await)
    }

    async fn find_active(&self, at: DateTime<Utc>) -> Result<Vec<Competition>> {
        let store = self.store.read().await;
        Ok(sorted(
            store.values().filter(|c| c.is_active(at)).cloned().collect(),
        ))
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Competition>> {
        let store = self.store.read().await;
        Ok(sorted(
            store
                .values()
                .filter(|c| c.has_participant(user_id))
                .cloned()
                .collect(),
        ))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: RwLock::new(users),
        }
    }

    pub async fn export(&self) -> Vec<User> {
        let users = self.users.read().await;
        let mut list: Vec<User> = users.values().cloned().collect();
        list.sort_by(|a, b| a.email.cmp(&b.email));
        list
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: &UserId) -> Result<User> {
        let users = self.users.read().await;
        users
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("user not found"))
    }

    async fn save(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<User> {
        let users = self.users.read().await;
        users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned()
            .ok_or_else(|| CoreError::not_found("user not found"))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryReadingRepository {
    events: RwLock<Vec<ReadingEvent>>,
}

impl InMemoryReadingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<ReadingEvent>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    pub async fn export(&self) -> Vec<ReadingEvent> {
        self.events.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl ReadingRepository for InMemoryReadingRepository {
    async fn save(&self, event: &ReadingEvent) -> Result<()> {
        let mut events = self.events.write().await;
        if events.iter().any(|e| e.id == event.id) {
            return Err(CoreError::server(format!(
                "reading {} already recorded",
                event.id
            )));
        }
        events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Rules;
    use crate::error::ErrorKind;
    use chrono::{Duration, TimeZone};

    fn competition(name: &str, offset_days: i64) -> Competition {
        let start =
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(offset_days);
        let rules = Rules::new(1).unwrap();
        Competition::new(name, start, start + Duration::days(7), rules).unwrap()
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = InMemoryCompetitionRepository::new();
        let err = repo.get(&CompetitionId::from("nope")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let repo = InMemoryCompetitionRepository::new();
        let cmp = competition("A", 0);
        repo.create(&cmp).await.unwrap();
        assert_eq!(repo.create(&cmp).await.unwrap_err().kind(), ErrorKind::Server);
    }

    #[tokio::test]
    async fn test_save_participant_only_touches_one_entry() {
        let repo = InMemoryCompetitionRepository::new();
        let mut cmp = competition("A", 0);
        cmp.join(UserId::from("u1")).unwrap();
        cmp.join(UserId::from("u2")).unwrap();
        repo.create(&cmp).await.unwrap();

        let mut p = cmp.participant(&UserId::from("u1")).unwrap().clone();
        p.points = 42;
        repo.save_participant(&cmp.id, &p).await.unwrap();

        let stored = repo.get(&cmp.id).await.unwrap();
        assert_eq!(stored.participant(&UserId::from("u1")).unwrap().points, 42);
        assert_eq!(stored.participant(&UserId::from("u2")).unwrap().points, 0);

        let err = repo
            .save_participant(&CompetitionId::from("missing"), &p)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_find_active_and_by_user() {
        let repo = InMemoryCompetitionRepository::new();
        let mut early = competition("early", 0);
        let late = competition("late", 30);
        early.join(UserId::from("u1")).unwrap();
        repo.create(&early).await.unwrap();
        repo.create(&late).await.unwrap();

        let at = early.start + Duration::days(1);
        let active = repo.find_active(at).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "early");

        let mine = repo.find_by_user(&UserId::from("u1")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(repo.find_by_user(&UserId::from("u2")).await.unwrap().is_empty());

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_user_lookup_by_email_is_case_insensitive() {
        let repo = InMemoryUserRepository::new();
        let user = User::new("Ann@Example.com", "Ann").unwrap();
        repo.save(&user).await.unwrap();

        assert_eq!(repo.find_by_email("ann@example.com").await.unwrap().id, user.id);
        assert_eq!(
            repo.find_by_email("bob@example.com").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_reading_log_is_append_only() {
        let repo = InMemoryReadingRepository::new();
        let ev = ReadingEvent::new(UserId::from("u"), 10, "", Utc::now());
        repo.save(&ev).await.unwrap();
        assert!(repo.save(&ev).await.is_err());
        assert_eq!(repo.len().await, 1);
    }
}
