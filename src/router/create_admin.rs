//! Bootstrap route creating administrators.
//!
//! It performs no caller authorization: keep `allow_admin_creation` off
//! outside of initial setup.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::router::JsonBody;
use crate::user::{PublicUser, RegisterRequest};

const CREATED: &str = "Admin user created successfully";

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    pub user: PublicUser,
}

pub async fn handler(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<Response>)> {
    let user = state.accounts.create_admin(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(Response {
            message: CREATED.to_owned(),
            user,
        }),
    ))
}
