mod dto;
mod memory;
mod repository;
mod service;

pub use dto::*;
pub use memory::*;
pub use repository::*;
pub use service::*;

use std::fmt;

use serde::{Deserialize, Serialize};

/// User as saved on database.
#[derive(Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("full_name", &self.full_name)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

/// [`User`] ready to be inserted, the store assigns its `id`.
#[derive(Clone, PartialEq)]
pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

impl NewUser {
    /// Attach the identifier chosen by the store.
    pub fn with_id(self, id: i64) -> User {
        User {
            id,
            full_name: self.full_name,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            is_admin: self.is_admin,
        }
    }
}

/// Fields of a [`User`] safe to send to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
        }
    }
}
