use std::sync::Arc;

use validator::Validate;

use crate::crypto::PasswordManager;
use crate::error::{Conflict, Result, ServerError};
use crate::token::TokenManager;
use crate::user::{
    CredentialStore, LoginRequest, NewUser, PublicUser, RegisterRequest,
    Registered, Session, User,
};

/// Registration, login and identity lookup.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    passwords: Arc<PasswordManager>,
    token: TokenManager,
    allow_admin_creation: bool,
}

impl AccountService {
    /// Create a new [`AccountService`].
    ///
    /// Admin creation is disabled until [`Self::allow_admin_creation`] is set.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        passwords: Arc<PasswordManager>,
        token: TokenManager,
    ) -> Self {
        Self {
            store,
            passwords,
            token,
            allow_admin_creation: false,
        }
    }

    /// Enable or disable [`Self::create_admin`].
    pub fn allow_admin_creation(mut self, allow: bool) -> Self {
        self.allow_admin_creation = allow;
        self
    }

    /// Create a regular user and issue its first token.
    pub async fn register(&self, request: RegisterRequest) -> Result<Registered> {
        let user = self.create(request, false).await?;
        let token = self.token.create(user.id)?;

        tracing::info!(user_id = user.id, "account created");

        Ok(Registered {
            token,
            user: user.into(),
        })
    }

    /// Create an administrator. No token is issued.
    pub async fn create_admin(&self, request: RegisterRequest) -> Result<PublicUser> {
        if !self.allow_admin_creation {
            tracing::warn!("admin creation attempted while disabled");
            return Err(ServerError::AdminCreationDisabled);
        }

        let user = self.create(request, true).await?;

        tracing::warn!(user_id = user.id, username = %user.username, "admin account created");

        Ok(user.into())
    }

    /// Check credentials. Only administrators may log in.
    pub async fn login(&self, request: LoginRequest) -> Result<Session> {
        request.validate()?;
        let identifier = request.username.unwrap_or_default();
        let password = request.password.unwrap_or_default();

        // Unknown user and wrong password share one error and one Argon2 run.
        let user = match self.store.find_by_username_or_email(&identifier).await? {
            Some(user) => Some(user).filter(|user| {
                self.passwords.verify_password(&password, &user.password_hash)
            }),
            None => {
                self.passwords.verify_missing(&password);
                None
            },
        };
        let Some(user) = user else {
            tracing::info!(reason = "invalid_credentials", "authentication failed");
            return Err(ServerError::InvalidCredentials);
        };

        if !user.is_admin {
            tracing::info!(user_id = user.id, reason = "not_admin", "authentication failed");
            return Err(ServerError::AdminRequired);
        }

        let token = self.token.create(user.id)?;

        tracing::info!(user_id = user.id, method = "password", "authentication successful");

        Ok(Session {
            token,
            is_admin: user.is_admin,
            user: user.into(),
        })
    }

    /// Resolve the user bound to a bearer token.
    pub async fn current_user(&self, token: &str) -> Result<PublicUser> {
        let user_id = self.token.verify(token)?;

        self.store
            .find_by_id(user_id)
            .await?
            .map(PublicUser::from)
            .ok_or(ServerError::UserNotFound)
    }

    async fn create(&self, request: RegisterRequest, is_admin: bool) -> Result<User> {
        request.validate()?;
        let RegisterRequest {
            full_name,
            username,
            email,
            password,
        } = request;
        let username = username.unwrap_or_default();
        let email = email.unwrap_or_default();

        if self.store.find_by_username(&username).await?.is_some() {
            return Err(ServerError::Conflict(Conflict::Username));
        }
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(ServerError::Conflict(Conflict::Email));
        }

        let password_hash = self
            .passwords
            .hash_password(password.unwrap_or_default())?;

        // The store re-checks uniqueness for concurrent registrations.
        self.store
            .insert(NewUser {
                full_name: full_name.unwrap_or_default(),
                username,
                email,
                password_hash,
                is_admin,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::crypto::fast_config;
    use crate::user::MemoryCredentialStore;

    const PASSWORD: &str = "StRong_PaÂ§$W0rD";

    fn service(store: Arc<dyn CredentialStore>) -> AccountService {
        AccountService::new(
            store,
            Arc::new(PasswordManager::new(Some(fast_config())).unwrap()),
            TokenManager::new("test-secret", "accounts"),
        )
        .allow_admin_creation(true)
    }

    fn alice() -> RegisterRequest {
        RegisterRequest::new("Alice Liddell", "alice", "alice@example.com", PASSWORD)
    }

    fn root() -> RegisterRequest {
        RegisterRequest::new("Root", "root", "root@example.com", PASSWORD)
    }

    #[tokio::test]
    async fn test_register() {
        let store = Arc::new(MemoryCredentialStore::new());
        let accounts = service(store.clone());

        let registered = accounts.register(alice()).await.unwrap();
        assert_eq!(registered.user.username, "alice");
        assert_eq!(registered.user.full_name, "Alice Liddell");
        assert!(!registered.user.is_admin);

        let stored = store.find_by_id(registered.user.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, PASSWORD);
        assert!(!stored.password_hash.is_empty());

        // Token from registration resolves to the new user.
        let me = accounts.current_user(&registered.token).await.unwrap();
        assert_eq!(me, registered.user);
    }

    #[tokio::test]
    async fn test_register_conflicts() {
        let store = Arc::new(MemoryCredentialStore::new());
        let accounts = service(store.clone());
        accounts.register(alice()).await.unwrap();

        let same_username = RegisterRequest {
            email: Some("other@example.com".into()),
            ..alice()
        };
        assert!(matches!(
            accounts.register(same_username).await,
            Err(ServerError::Conflict(Conflict::Username))
        ));

        let same_email = RegisterRequest {
            username: Some("alice2".into()),
            ..alice()
        };
        assert!(matches!(
            accounts.register(same_email).await,
            Err(ServerError::Conflict(Conflict::Email))
        ));

        // Username is reported first when both collide.
        assert!(matches!(
            accounts.register(alice()).await,
            Err(ServerError::Conflict(Conflict::Username))
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_missing_field() {
        let store = Arc::new(MemoryCredentialStore::new());
        let accounts = service(store.clone());

        let request = RegisterRequest {
            full_name: None,
            ..alice()
        };
        assert!(matches!(
            accounts.register(request).await,
            Err(ServerError::Validation(_))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_admin() {
        let store = Arc::new(MemoryCredentialStore::new());
        let accounts = service(store.clone());

        let admin = accounts.create_admin(root()).await.unwrap();
        assert!(admin.is_admin);

        let duplicate_email = RegisterRequest {
            username: Some("root2".into()),
            ..root()
        };
        assert!(matches!(
            accounts.create_admin(duplicate_email).await,
            Err(ServerError::Conflict(Conflict::Email))
        ));
        assert_eq!(store.len().await, 1);
        assert!(store.find_by_username("root2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_admin_disabled() {
        let store = Arc::new(MemoryCredentialStore::new());
        let accounts = service(store.clone()).allow_admin_creation(false);

        assert!(matches!(
            accounts.create_admin(root()).await,
            Err(ServerError::AdminCreationDisabled)
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_admin_only() {
        let accounts = service(Arc::new(MemoryCredentialStore::new()));
        accounts.register(alice()).await.unwrap();
        let admin = accounts.create_admin(root()).await.unwrap();

        // Valid credentials, but not an administrator.
        assert!(matches!(
            accounts.login(LoginRequest::new("alice", PASSWORD)).await,
            Err(ServerError::AdminRequired)
        ));

        let session = accounts.login(LoginRequest::new("root", PASSWORD)).await.unwrap();
        assert!(session.is_admin);
        assert_eq!(session.user, admin);
        assert_eq!(accounts.current_user(&session.token).await.unwrap(), admin);

        // Email works as identifier too.
        let session = accounts
            .login(LoginRequest::new("root@example.com", PASSWORD))
            .await
            .unwrap();
        assert_eq!(session.user.id, admin.id);
    }

    #[tokio::test]
    async fn test_login_failures_are_identical() {
        let accounts = service(Arc::new(MemoryCredentialStore::new()));
        accounts.create_admin(root()).await.unwrap();

        let wrong_password = accounts
            .login(LoginRequest::new("root", "not the password"))
            .await
            .unwrap_err();
        let unknown_user = accounts
            .login(LoginRequest::new("nobody", PASSWORD))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, ServerError::InvalidCredentials));
        assert!(matches!(unknown_user, ServerError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(wrong_password.status(), unknown_user.status());
    }

    #[tokio::test]
    async fn test_login_missing_field() {
        let accounts = service(Arc::new(MemoryCredentialStore::new()));
        let request = LoginRequest {
            password: None,
            ..LoginRequest::new("root", PASSWORD)
        };

        let err = accounts.login(request).await.unwrap_err();
        assert!(matches!(err, ServerError::Validation(_)));
        assert_eq!(err.to_string(), "Username/email and password are required");
    }

    #[tokio::test]
    async fn test_current_user_gone() {
        let accounts = service(Arc::new(MemoryCredentialStore::new()));
        let token = TokenManager::new("test-secret", "accounts").create(999).unwrap();

        assert!(matches!(
            accounts.current_user(&token).await,
            Err(ServerError::UserNotFound)
        ));
        assert!(matches!(
            accounts.current_user("garbage").await,
            Err(ServerError::Unauthorized)
        ));
    }

    /// Store whose lookups always miss, like two requests racing on the
    /// same username.
    struct RacingStore(MemoryCredentialStore);

    #[async_trait]
    impl CredentialStore for RacingStore {
        async fn insert(&self, user: NewUser) -> Result<User> {
            self.0.insert(user).await
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
            self.0.find_by_id(id).await
        }

        async fn find_by_username(&self, _: &str) -> Result<Option<User>> {
            Ok(None)
        }

        async fn find_by_email(&self, _: &str) -> Result<Option<User>> {
            Ok(None)
        }

        async fn find_by_username_or_email(&self, identifier: &str) -> Result<Option<User>> {
            self.0.find_by_username_or_email(identifier).await
        }
    }

    #[tokio::test]
    async fn test_race_reported_as_conflict() {
        let accounts = service(Arc::new(RacingStore(MemoryCredentialStore::new())));
        accounts.register(alice()).await.unwrap();

        assert!(matches!(
            accounts.register(alice()).await,
            Err(ServerError::Conflict(Conflict::Username))
        ));
    }

    /// Store failing every call.
    struct BrokenStore;

    #[async_trait]
    impl CredentialStore for BrokenStore {
        async fn insert(&self, _: NewUser) -> Result<User> {
            Err(ServerError::Sql(sqlx::Error::PoolTimedOut))
        }

        async fn find_by_id(&self, _: i64) -> Result<Option<User>> {
            Err(ServerError::Sql(sqlx::Error::PoolTimedOut))
        }

        async fn find_by_username(&self, _: &str) -> Result<Option<User>> {
            Err(ServerError::Sql(sqlx::Error::PoolTimedOut))
        }

        async fn find_by_email(&self, _: &str) -> Result<Option<User>> {
            Err(ServerError::Sql(sqlx::Error::PoolTimedOut))
        }

        async fn find_by_username_or_email(&self, _: &str) -> Result<Option<User>> {
            Err(ServerError::Sql(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn test_storage_failure() {
        let accounts = service(Arc::new(BrokenStore));

        let err = accounts.register(alice()).await.unwrap_err();
        assert!(matches!(err, ServerError::Sql(_)));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let err = accounts.login(LoginRequest::new("root", PASSWORD)).await.unwrap_err();
        assert!(matches!(err, ServerError::Sql(_)));
    }
}
