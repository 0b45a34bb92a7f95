use std::sync::Arc;
use tracing::info;

use super::lifecycle::storage_error;
use super::locks::LockTable;
use crate::domain::{User, UserId};
use crate::error::{CoreError, ErrorKind, Result};
use crate::repository::UserRepository;

/// Registration and lookup of readers.
pub struct UserDirectory {
    users: Arc<dyn UserRepository>,
    locks: Arc<LockTable>,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserRepository>, locks: Arc<LockTable>) -> Self {
        Self { users, locks }
    }

    /// Register a reader. Emails are unique, compared case-insensitively.
    /// The lookup and the insert run under the email's lock.
    pub async fn register(&self, email: &str, display_name: &str) -> Result<User> {
        let user = User::new(email, display_name)?;
        let _guard = self.locks.email(&user.email).await;

        match self.users.find_by_email(&user.email).await {
            Ok(_) => return Err(CoreError::validation("email already registered")),
            Err(e) if e.is(ErrorKind::NotFound) => {}
            Err(e) => return Err(storage_error(e, "failed to look up user")),
        }

        self.users
            .save(&user)
            .await
            .map_err(|e| storage_error(e, "failed to save user"))?;

        info!(user = %user.id, "user registered");
        Ok(user)
    }

    pub async fn get(&self, id: &UserId) -> Result<User> {
        self.users
            .get(id)
            .await
            .map_err(|e| storage_error(e, "failed to load user"))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<User> {
        self.users
            .find_by_email(email.trim())
            .await
            .map_err(|e| storage_error(e, "failed to look up user"))
    }
}
