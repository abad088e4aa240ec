//! Error handler for accounts.

use std::fmt;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

const INTERNAL_SERVER_ERROR: &str = "Internal server error";

/// Unique field already taken by another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Username,
    Email,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::Username => write!(f, "Username already exists"),
            Conflict::Email => write!(f, "Email already registered"),
        }
    }
}

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{}", first_message(.0))]
    Validation(#[from] ValidationErrors),

    #[error("Invalid request body")]
    Axum(#[from] JsonRejection),

    #[error("{0}")]
    Conflict(Conflict),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Access denied. Admin privileges required.")]
    AdminRequired,

    #[error("Admin creation is disabled")]
    AdminCreationDisabled,

    #[error("Missing or invalid 'Authorization' header.")]
    Unauthorized,

    #[error("User not found")]
    UserNotFound,

    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServerError {
    /// Wrap an unexpected failure.
    pub fn internal<E>(details: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            details: details.into(),
            source: Some(Box::new(err)),
        }
    }

    /// HTTP status code sent to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_)
            | ServerError::Axum(_)
            | ServerError::Conflict(_) => StatusCode::BAD_REQUEST,
            ServerError::InvalidCredentials | ServerError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            },
            ServerError::AdminRequired | ServerError::AdminCreationDisabled => {
                StatusCode::FORBIDDEN
            },
            ServerError::UserNotFound => StatusCode::NOT_FOUND,
            ServerError::Sql(_)
            | ServerError::Crypto(_)
            | ServerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn first_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|issues| issues.iter())
        .find_map(|issue| issue.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "validation error occurred".to_owned())
}

fn invalid_fields(errors: &ValidationErrors) -> String {
    let mut fields = errors
        .field_errors()
        .keys()
        .map(|field| field.to_string())
        .collect::<Vec<_>>();
    fields.sort();

    format!("missing or empty field(s): {}", fields.join(", "))
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ServerError::Validation(errors) => ErrorBody {
                message: self.to_string(),
                error: Some(invalid_fields(errors)),
            },

            ServerError::Axum(rejection) => ErrorBody {
                message: self.to_string(),
                error: Some(rejection.body_text()),
            },

            ServerError::Sql(_)
            | ServerError::Crypto(_)
            | ServerError::Internal { .. } => {
                match &self {
                    ServerError::Internal { details, source } => {
                        tracing::error!(err = ?source, %details, "server returned 500 status")
                    },
                    err => tracing::error!(error = %err, "server returned 500 status"),
                }

                // Raw failure text only leaves the process on debug builds.
                ErrorBody {
                    message: INTERNAL_SERVER_ERROR.to_owned(),
                    error: cfg!(debug_assertions).then(|| self.to_string()),
                }
            },

            _ => ErrorBody {
                message: self.to_string(),
                error: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
