use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::domain::{CompetitionId, UserId};

/// A lazily populated map of locks, one per key.
#[derive(Debug)]
struct KeyedLocks<K, L>
where
    K: Eq + Hash,
{
    locks: DashMap<K, Arc<L>>,
}

impl<K, L> KeyedLocks<K, L>
where
    K: Eq + Hash + Clone,
    L: Default,
{
    fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn get(&self, key: &K) -> Arc<L> {
        if let Some(lock) = self.locks.get(key) {
            return Arc::clone(lock.value());
        }
        Arc::clone(self.locks.entry(key.clone()).or_default().value())
    }

    fn len(&self) -> usize {
        self.locks.len()
    }

    fn retain(&self, keep: impl FnMut(&K, &mut Arc<L>) -> bool) {
        self.locks.retain(keep);
    }
}

/// Guard held while a single participant's ledger is mutated.
///
/// Holds the competition lock shared, so closing waits for it, and the
/// participant lock exclusive, so two events for the same (competition,
/// user) pair never interleave.
#[derive(Debug)]
pub struct ParticipantGuard {
    _participant: OwnedMutexGuard<()>,
    _competition: OwnedRwLockReadGuard<()>,
}

/// Lock table shared by the lifecycle service and the coordinator.
///
/// - competition: `RwLock`, shared for ledger updates and joins, exclusive
///   for close.
/// - (competition, user): `Mutex`, one participant ledger at a time.
/// - user: `Mutex`, the global streak and lifetime minutes.
/// - email: `Mutex`, registration of one normalized email address.
///
/// Competition and participant entries live until the competition is closed.
/// User and email entries are never evicted.
#[derive(Debug)]
pub struct LockTable {
    competitions: KeyedLocks<CompetitionId, RwLock<()>>,
    participants: KeyedLocks<(CompetitionId, UserId), Mutex<()>>,
    users: KeyedLocks<UserId, Mutex<()>>,
    emails: KeyedLocks<String, Mutex<()>>,
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            competitions: KeyedLocks::new(),
            participants: KeyedLocks::new(),
            users: KeyedLocks::new(),
            emails: KeyedLocks::new(),
        }
    }

    pub async fn participant(
        &self,
        competition_id: &CompetitionId,
        user_id: &UserId,
    ) -> ParticipantGuard {
        let competition = self.competitions.get(competition_id).read_owned().await;
        let participant = self
            .participants
            .get(&(competition_id.clone(), user_id.clone()))
            .lock_owned()
            .await;
        ParticipantGuard {
            _participant: participant,
            _competition: competition,
        }
    }

    /// Exclusive access to a whole competition. Waits for in-flight
    /// participant updates to finish and blocks new ones.
    pub async fn competition_exclusive(
        &self,
        competition_id: &CompetitionId,
    ) -> OwnedRwLockWriteGuard<()> {
        self.competitions.get(competition_id).write_owned().await
    }

    /// Drop the competition's lock and all of its participant locks.
    ///
    /// Only call this once the competition is closed. A caller still holding
    /// an evicted lock and a caller on a fresh one no longer exclude each
    /// other, which is harmless only while the competition cannot change.
    pub fn forget_competition(&self, competition_id: &CompetitionId) {
        self.competitions.retain(|id, _| id != competition_id);
        self.participants.retain(|(id, _), _| id != competition_id);
    }

    pub async fn user(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        self.users.get(user_id).lock_owned().await
    }

    /// Serializes registrations of one email address, compared
    /// case-insensitively.
    pub async fn email(&self, email: &str) -> OwnedMutexGuard<()> {
        self.emails
            .get(&email.trim().to_lowercase())
            .lock_owned()
            .await
    }

    pub fn tracked_keys(&self) -> usize {
        self.competitions.len() + self.participants.len() + self.users.len() + self.emails.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_different_participants_do_not_block() {
        let locks = LockTable::new();
        let c = CompetitionId::from("c");
        let _a = locks.participant(&c, &UserId::from("a")).await;
        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.participant(&c, &UserId::from("b")),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_same_participant_is_serialized() {
        let locks = LockTable::new();
        let c = CompetitionId::from("c");
        let u = UserId::from("a");
        let _held = locks.participant(&c, &u).await;
        let second =
            tokio::time::timeout(Duration::from_millis(50), locks.participant(&c, &u)).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_exclusive_waits_for_participants() {
        let locks = LockTable::new();
        let c = CompetitionId::from("c");
        let held = locks.participant(&c, &UserId::from("a")).await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.competition_exclusive(&c)).await;
        assert!(blocked.is_err());

        drop(held);
        let acquired =
            tokio::time::timeout(Duration::from_millis(100), locks.competition_exclusive(&c)).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_other_competitions_unaffected_by_exclusive() {
        let locks = LockTable::new();
        let _closing = locks.competition_exclusive(&CompetitionId::from("c1")).await;
        let other = tokio::time::timeout(
            Duration::from_millis(100),
            locks.participant(&CompetitionId::from("c2"), &UserId::from("a")),
        )
        .await;
        assert!(other.is_ok());
        assert_eq!(locks.tracked_keys(), 3);
    }

    #[tokio::test]
    async fn test_forget_competition_only_drops_its_entries() {
        let locks = LockTable::new();
        let (c1, c2) = (CompetitionId::from("c1"), CompetitionId::from("c2"));
        let u = UserId::from("a");
        drop(locks.participant(&c1, &u).await);
        drop(locks.participant(&c2, &u).await);
        drop(locks.user(&u).await);
        assert_eq!(locks.tracked_keys(), 5);

        locks.forget_competition(&c1);
        assert_eq!(locks.tracked_keys(), 3);
    }

    #[tokio::test]
    async fn test_email_lock_ignores_case() {
        let locks = LockTable::new();
        let _held = locks.email("Ann@Example.com").await;
        let same = locks.email(" ann@example.com");
        let other = tokio::time::timeout(Duration::from_millis(50), same).await;
        assert!(other.is_err());

        let bob = locks.email("bob@example.com");
        let different = tokio::time::timeout(Duration::from_millis(50), bob).await;
        assert!(different.is_ok());
    }
}
