//! Requests accepted and results returned by [`super::AccountService`].

use serde::Deserialize;
use validator::Validate;

use super::PublicUser;

/// Body of `register` and `create-admin`.
#[derive(Clone, Default, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        required(message = "All fields are required"),
        length(min = 1, message = "All fields are required")
    )]
    pub full_name: Option<String>,
    #[validate(
        required(message = "All fields are required"),
        length(min = 1, message = "All fields are required")
    )]
    pub username: Option<String>,
    #[validate(
        required(message = "All fields are required"),
        length(min = 1, message = "All fields are required")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "All fields are required"),
        length(min = 1, message = "All fields are required")
    )]
    pub password: Option<String>,
}

impl RegisterRequest {
    pub fn new(
        full_name: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            full_name: Some(full_name.into()),
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }
}

/// Body of `login`.
///
/// `username` holds either a username or an email address. Clients may send
/// it as `username`, `identifier` or `email`; the first non-empty one wins.
#[derive(Clone, Default, Deserialize, Validate)]
#[serde(from = "LoginBody")]
pub struct LoginRequest {
    #[validate(
        required(message = "Username/email and password are required"),
        length(min = 1, message = "Username/email and password are required")
    )]
    pub username: Option<String>,
    #[validate(
        required(message = "Username/email and password are required"),
        length(min = 1, message = "Username/email and password are required")
    )]
    pub password: Option<String>,
}

/// Raw login keys, as sent on the wire.
#[derive(Deserialize)]
struct LoginBody {
    username: Option<String>,
    identifier: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

impl From<LoginBody> for LoginRequest {
    fn from(body: LoginBody) -> Self {
        let username = [body.username, body.identifier, body.email]
            .into_iter()
            .flatten()
            .find(|value| !value.is_empty());

        Self {
            username,
            password: body.password,
        }
    }
}

impl LoginRequest {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(identifier.into()),
            password: Some(password.into()),
        }
    }
}

/// Newly registered user with its first token.
#[derive(Clone, Debug, PartialEq)]
pub struct Registered {
    pub token: String,
    pub user: PublicUser,
}

/// Successful administrator login.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub token: String,
    pub is_admin: bool,
    pub user: PublicUser,
}
