//! In-process credential store, used by tests and `memory:` deployments.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Conflict, Result, ServerError};
use crate::user::{CredentialStore, NewUser, User};

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, User>,
}

/// [`CredentialStore`] keeping users in memory. Data is lost on exit.
#[derive(Default)]
pub struct MemoryCredentialStore {
    table: RwLock<Table>,
}

impl MemoryCredentialStore {
    /// Create an empty [`MemoryCredentialStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    /// Whether no user was stored yet.
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.rows.is_empty()
    }

    async fn find(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.table
            .read()
            .await
            .rows
            .values()
            .find(|user| predicate(user))
            .cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        // Uniqueness check and insert happen under the same write lock.
        let mut table = self.table.write().await;

        for row in table.rows.values() {
            if row.username == user.username {
                return Err(ServerError::Conflict(Conflict::Username));
            }
            if row.email == user.email {
                return Err(ServerError::Conflict(Conflict::Email));
            }
        }

        table.last_id += 1;
        let user = user.with_id(table.last_id);
        table.rows.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.find(|user| user.username == username).await)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find(|user| user.email == email).await)
    }

    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>> {
        match self.find_by_username(identifier).await? {
            Some(user) => Ok(Some(user)),
            None => self.find_by_email(identifier).await,
        }
    }
}
