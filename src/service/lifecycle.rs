use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::locks::LockTable;
use crate::domain::{Competition, CompetitionId, Rules, Standing, UserId};
use crate::error::{CoreError, ErrorKind, Result};
use crate::repository::{CompetitionRepository, UserRepository};

#[derive(Debug, Clone)]
pub struct CreateCompetition {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub points_per_minute: i64,
}

/// Owns competition state transitions: create, join, close, and the
/// definition of "active".
pub struct CompetitionLifecycle {
    competitions: Arc<dyn CompetitionRepository>,
    users: Arc<dyn UserRepository>,
    locks: Arc<LockTable>,
}

/// Parse an RFC 3339 instant or a bare `YYYY-MM-DD` date. A bare date maps
/// to the start of the UTC day, or its last nanosecond when `end_of_day` is
/// set, so an inclusive window covers the whole final day.
pub fn parse_instant(input: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        CoreError::validation(format!(
            "invalid date '{}', expected YYYY-MM-DD or RFC 3339",
            input
        ))
    })?;
    let time = if end_of_day {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        Some(NaiveTime::MIN)
    };
    let time = time.ok_or_else(|| CoreError::validation("invalid time of day"))?;
    Ok(date.and_time(time).and_utc())
}

/// Keep `NotFound` as is; anything else from storage becomes an opaque
/// server error.
pub(crate) fn storage_error(err: CoreError, msg: &str) -> CoreError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::Validation => err,
        _ => {
            tracing::error!(error = %err, "{}", msg);
            CoreError::server(msg)
        }
    }
}

impl CompetitionLifecycle {
    pub fn new(
        competitions: Arc<dyn CompetitionRepository>,
        users: Arc<dyn UserRepository>,
        locks: Arc<LockTable>,
    ) -> Self {
        Self {
            competitions,
            users,
            locks,
        }
    }

    pub async fn create(&self, cmd: CreateCompetition) -> Result<Competition> {
        let rules = Rules::new(cmd.points_per_minute)?;
        let competition = Competition::new(&cmd.name, cmd.start, cmd.end, rules)?;

        self.competitions
            .create(&competition)
            .await
            .map_err(|e| storage_error(e, "failed to save competition"))?;

        info!(
            competition = %competition.id,
            name = %competition.name,
            points_per_minute = rules.points_per_minute,
            "competition created"
        );
        Ok(competition)
    }

    pub async fn join(&self, competition_id: &CompetitionId, user_id: &UserId) -> Result<()> {
        if competition_id.is_empty() {
            return Err(CoreError::validation("competition id is required"));
        }
        if user_id.is_empty() {
            return Err(CoreError::validation("user id is required"));
        }

        self.users
            .get(user_id)
            .await
            .map_err(|e| storage_error(e, "failed to load user"))?;

        // Unknown or closed competitions never get a lock entry.
        if self.get(competition_id).await?.is_closed() {
            return Err(CoreError::validation("competition is closed"));
        }

        let _guard = self.locks.participant(competition_id, user_id).await;

        let mut competition = self.get(competition_id).await?;
        let participant = competition.join(user_id.clone())?.clone();

        self.competitions
            .save_participant(competition_id, &participant)
            .await
            .map_err(|e| storage_error(e, "failed to add participant"))?;

        info!(competition = %competition_id, user = %user_id, "participant joined");
        Ok(())
    }

    /// Open competitions whose window contains `at`.
    pub async fn find_active(&self, at: DateTime<Utc>) -> Result<Vec<Competition>> {
        self.competitions
            .find_active(at)
            .await
            .map_err(|e| storage_error(e, "failed to load competitions"))
    }

    /// Close a competition and return its final standings, highest points
    /// first. Waits for in-flight ledger updates on this competition.
    pub async fn close(&self, competition_id: &CompetitionId) -> Result<Vec<Standing>> {
        if competition_id.is_empty() {
            return Err(CoreError::validation("competition id is required"));
        }

        if self.get(competition_id).await?.is_closed() {
            return Err(CoreError::validation("competition already closed"));
        }

        let exclusive = self.locks.competition_exclusive(competition_id).await;

        let mut competition = self.get(competition_id).await?;
        let standings = competition.close()?;

        self.competitions
            .save(&competition)
            .await
            .map_err(|e| storage_error(e, "failed to save competition"))?;

        drop(exclusive);
        self.locks.forget_competition(competition_id);

        info!(
            competition = %competition_id,
            participants = standings.len(),
            winner = standings.first().map(|s| s.user_id.as_str()).unwrap_or("-"),
            "competition closed"
        );
        Ok(standings)
    }

    pub async fn get(&self, competition_id: &CompetitionId) -> Result<Competition> {
        self.competitions
            .get(competition_id)
            .await
            .map_err(|e| storage_error(e, "failed to load competition"))
    }

    /// Current ledger standings, provisional while the competition is open.
    pub async fn standings(&self, competition_id: &CompetitionId) -> Result<Vec<Standing>> {
        Ok(self.get(competition_id).await?.standings())
    }

    pub async fn list_all(&self) -> Result<Vec<Competition>> {
        self.competitions
            .get_all()
            .await
            .map_err(|e| storage_error(e, "failed to load competitions"))
    }

    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Competition>> {
        if user_id.is_empty() {
            return Err(CoreError::validation("user id is required"));
        }
        let list = self
            .competitions
            .find_by_user(user_id)
            .await
            .map_err(|e| storage_error(e, "failed to load competitions"))?;
        debug!(user = %user_id, count = list.len(), "listed competitions for user");
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Status, User};
    use crate::repository::{InMemoryCompetitionRepository, InMemoryUserRepository};
    use chrono::Duration;

    struct Fixture {
        lifecycle: CompetitionLifecycle,
        users: Arc<InMemoryUserRepository>,
        locks: Arc<LockTable>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserRepository::new());
        let locks = Arc::new(LockTable::new());
        let lifecycle = CompetitionLifecycle::new(
            Arc::new(InMemoryCompetitionRepository::new()),
            users.clone(),
            locks.clone(),
        );
        Fixture {
            lifecycle,
            users,
            locks,
        }
    }

    async fn user(f: &Fixture, email: &str) -> UserId {
        let user = User::new(email, "Reader").unwrap();
        f.users.save(&user).await.unwrap();
        user.id
    }

    fn create_cmd(name: &str) -> CreateCompetition {
        let now = Utc::now();
        CreateCompetition {
            name: name.to_string(),
            start: now - Duration::days(1),
            end: now + Duration::days(6),
            points_per_minute: 2,
        }
    }

    #[test]
    fn test_parse_instant() {
        let start = parse_instant("2024-03-01", false).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        let end = parse_instant("2024-03-31", true).unwrap();
        assert_eq!(end, parse_instant("2024-03-31T23:59:59.999999999Z", false).unwrap());

        let at = parse_instant("2024-03-05T10:30:00+02:00", false).unwrap();
        assert_eq!(at.to_rfc3339(), "2024-03-05T08:30:00+00:00");

        let err = parse_instant("03/05/2024", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_bare_end_date_covers_whole_last_day() {
        let start = parse_instant("2024-03-01", false).unwrap();
        let end = parse_instant("2024-03-31", true).unwrap();
        let c = Competition::new("March", start, end, Rules::new(1).unwrap()).unwrap();

        let late = parse_instant("2024-03-31T23:59:59.5Z", false).unwrap();
        assert!(c.is_active(late));
        assert!(c.is_active(start));
        assert!(!c.is_active(parse_instant("2024-04-01", false).unwrap()));
    }

    #[tokio::test]
    async fn test_create_validates() {
        let f = fixture();
        let mut cmd = create_cmd("Week");
        cmd.points_per_minute = 0;
        assert_eq!(f.lifecycle.create(cmd).await.unwrap_err().kind(), ErrorKind::Validation);

        let mut cmd = create_cmd("Week");
        cmd.end = cmd.start - Duration::hours(1);
        assert_eq!(f.lifecycle.create(cmd).await.unwrap_err().kind(), ErrorKind::Validation);

        assert!(f.lifecycle.create(create_cmd("")).await.is_err());

        let cmp = f.lifecycle.create(create_cmd("Week")).await.unwrap();
        assert_eq!(f.lifecycle.get(&cmp.id).await.unwrap().status, Status::Open);
    }

    #[tokio::test]
    async fn test_join_rules() {
        let f = fixture();
        let cmp = f.lifecycle.create(create_cmd("Week")).await.unwrap();
        let ann = user(&f, "ann@example.com").await;

        f.lifecycle.join(&cmp.id, &ann).await.unwrap();
        let dup = f.lifecycle.join(&cmp.id, &ann).await.unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::Validation);

        let missing_user = f.lifecycle.join(&cmp.id, &UserId::from("ghost")).await.unwrap_err();
        assert_eq!(missing_user.kind(), ErrorKind::NotFound);

        let missing_cmp = f
            .lifecycle
            .join(&CompetitionId::from("nope"), &ann)
            .await
            .unwrap_err();
        assert_eq!(missing_cmp.kind(), ErrorKind::NotFound);

        let empty = f.lifecycle.join(&CompetitionId::from(""), &ann).await.unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::Validation);

        let mine = f.lifecycle.list_for_user(&ann).await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn test_close_is_terminal_and_inactive() {
        let f = fixture();
        let cmp = f.lifecycle.create(create_cmd("Week")).await.unwrap();
        let ann = user(&f, "ann@example.com").await;
        f.lifecycle.join(&cmp.id, &ann).await.unwrap();

        let standings = f.lifecycle.close(&cmp.id).await.unwrap();
        assert_eq!(standings.len(), 1);

        let again = f.lifecycle.close(&cmp.id).await.unwrap_err();
        assert_eq!(again.kind(), ErrorKind::Validation);

        let join = f.lifecycle.join(&cmp.id, &user(&f, "bob@example.com").await).await;
        assert!(join.is_err());

        for offset in [-1, 0, 3, 6] {
            let at = Utc::now() + Duration::days(offset);
            let active = f.lifecycle.find_active(at).await.unwrap();
            assert!(active.iter().all(|c| c.id != cmp.id));
        }
    }

    #[tokio::test]
    async fn test_close_missing_is_not_found() {
        let f = fixture();
        let err = f.lifecycle.close(&CompetitionId::from("nope")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(f.locks.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_unknown_or_closed_ids_leave_no_lock_entries() {
        let f = fixture();
        let ann = user(&f, "ann@example.com").await;

        for _ in 0..3 {
            let id = CompetitionId::generate();
            assert!(f.lifecycle.close(&id).await.is_err());
            assert!(f.lifecycle.join(&id, &ann).await.is_err());
        }
        assert_eq!(f.locks.tracked_keys(), 0);

        let cmp = f.lifecycle.create(create_cmd("Week")).await.unwrap();
        f.lifecycle.join(&cmp.id, &ann).await.unwrap();
        assert_eq!(f.locks.tracked_keys(), 2);

        f.lifecycle.close(&cmp.id).await.unwrap();
        assert_eq!(f.locks.tracked_keys(), 0);

        assert!(f.lifecycle.close(&cmp.id).await.is_err());
        assert!(f.lifecycle.join(&cmp.id, &ann).await.is_err());
        assert_eq!(f.locks.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_expired_but_open_is_not_active() {
        let f = fixture();
        let now = Utc::now();
        let cmp = f
            .lifecycle
            .create(CreateCompetition {
                name: "Old".to_string(),
                start: now - Duration::days(10),
                end: now - Duration::days(3),
                points_per_minute: 1,
            })
            .await
            .unwrap();

        assert!(f.lifecycle.find_active(now).await.unwrap().is_empty());
        assert_eq!(f.lifecycle.get(&cmp.id).await.unwrap().status, Status::Open);
        assert!(f.lifecycle.close(&cmp.id).await.is_ok());
    }
}
