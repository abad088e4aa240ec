use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::router::JsonBody;
use crate::user::{LoginRequest, PublicUser};

const LOGGED_IN: &str = "Admin login successful";

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    pub token: String,
    pub is_admin: bool,
    pub user: PublicUser,
}

/// Handler to log an administrator in.
pub async fn handler(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<Response>> {
    let session = state.accounts.login(body).await?;

    Ok(Json(Response {
        message: LOGGED_IN.to_owned(),
        token: session.token,
        is_admin: session.is_admin,
        user: session.user,
    }))
}
