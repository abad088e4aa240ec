use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::router::JsonBody;
use crate::user::{PublicUser, RegisterRequest};

const CREATED: &str = "User registered successfully";

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

/// Handler to register a regular user.
pub async fn handler(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<Response>)> {
    let registered = state.accounts.register(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(Response {
            message: CREATED.to_owned(),
            token: registered.token,
            user: registered.user,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::error::ErrorBody;
    use crate::*;

    #[tokio::test]
    async fn test_register_handler() {
        let state = test_state();
        let app = app(state.clone());

        let response = make_request(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            json!({
                "full_name": "Alice Liddell",
                "username": "alice",
                "email": "alice@example.com",
                "password": "StRong_PaÂ§$W0rD",
            })
            .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);

        let raw = body_string(response).await;
        assert!(!raw.contains("password"));
        let body: Response = serde_json::from_str(&raw).unwrap();
        assert_eq!(body.message, CREATED);
        assert_eq!(body.user.username, "alice");
        assert!(!body.user.is_admin);
        assert_eq!(
            state.accounts.current_user(&body.token).await.unwrap(),
            body.user
        );
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let app = app(test_state());
        let body = |email: &str| {
            json!({
                "full_name": "Alice Liddell",
                "username": "alice",
                "email": email,
                "password": "StRong_PaÂ§$W0rD",
            })
            .to_string()
        };

        let response = make_request(
            app.clone(),
            Method::POST,
            "/api/auth/register",
            None,
            body("alice@example.com"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = make_request(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            body("another@example.com"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorBody = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body.message, "Username already exists");
    }

    #[tokio::test]
    async fn test_register_missing_field() {
        let app = app(test_state());

        let response = make_request(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            json!({
                "full_name": "Alice Liddell",
                "username": "alice",
                "email": "",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorBody = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body.message, "All fields are required");
        assert_eq!(
            body.error.as_deref(),
            Some("missing or empty field(s): email, password")
        );
    }

    #[tokio::test]
    async fn test_register_malformed_body() {
        let app = app(test_state());

        let response = make_request(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            "{not json".to_owned(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorBody = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body.message, "Invalid request body");
        assert!(body.error.is_some());
    }
}
