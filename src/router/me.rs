use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::router::BearerToken;
use crate::user::PublicUser;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user: PublicUser,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<Json<Response>> {
    let user = state.accounts.current_user(&token).await?;
    Ok(Json(Response { user }))
}
