//! Handle database requests.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::error::{Conflict, Result, ServerError};
use crate::user::{NewUser, User};

const USERNAME_CONSTRAINT: &str = "users_username_key";
const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Persistence operations needed by the account workflow.
///
/// Every call touches a single record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a [`NewUser`] and return it with its assigned `id`.
    ///
    /// A duplicate username or email fails with [`ServerError::Conflict`].
    async fn insert(&self, user: NewUser) -> Result<User>;

    /// Find a user using `id` field.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Find a user using `username` field.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Find a user using `email` field.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Find a user whose username or email equals `identifier`.
    /// A username match is preferred.
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>>;
}

/// PostgreSQL credential store.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: Pool<Postgres>,
}

impl PgCredentialStore {
    /// Create a new [`PgCredentialStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn find_by(&self, field: Field, value: &str) -> Result<Option<User>> {
        let query = get_by_field_query(field);

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        // Dropping `tx` on error rolls the insert back.
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (full_name, username, email, password_hash, is_admin)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, full_name, username, email, password_hash, is_admin"#,
        )
        .bind(&user.full_name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        tx.commit().await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            r#"SELECT id, full_name, username, email, password_hash, is_admin
                FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_by(Field::Username, username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_by(Field::Email, email).await
    }

    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            r#"SELECT id, full_name, username, email, password_hash, is_admin
                FROM users
                WHERE username = $1 OR email = $1
                ORDER BY (username = $1) DESC
                LIMIT 1"#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?)
    }
}

/// Turn unique violations into [`ServerError::Conflict`].
fn map_insert_error(err: sqlx::Error) -> ServerError {
    let conflict = err
        .as_database_error()
        .filter(|db_err| db_err.is_unique_violation())
        .map(|db_err| match db_err.constraint() {
            Some(EMAIL_CONSTRAINT) => Conflict::Email,
            Some(USERNAME_CONSTRAINT) => Conflict::Username,
            // Unknown constraint name, guess from its text.
            Some(name) if name.contains("email") => Conflict::Email,
            _ => Conflict::Username,
        });

    match conflict {
        Some(conflict) => {
            tracing::info!(%conflict, "insert rejected by unique constraint");
            ServerError::Conflict(conflict)
        },
        None => ServerError::Sql(err),
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Username,
    Email,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Field::Username => write!(f, "username"),
            Field::Email => write!(f, "email"),
        }
    }
}

fn get_by_field_query(field: Field) -> String {
    format!(
        r#"SELECT id, full_name, username, email, password_hash, is_admin
            FROM users
            WHERE {field} = $1"#
    )
}
