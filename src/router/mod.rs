//! Account HTTP API.
pub mod create_admin;
pub mod login;
pub mod me;
pub mod register;

use axum::extract::{FromRequest, Request};
use axum::http::header;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Router, middleware};

use crate::{AppState, ServerError};

const BEARER: &str = "Bearer ";

/// JSON extractor answering malformed bodies with [`ServerError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct JsonBody<T>(pub T);

/// Raw token taken from `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

/// Reject requests without a bearer token.
///
/// Signature and expiry are checked by the account service.
async fn auth(
    mut req: Request,
    next: middleware::Next,
) -> Result<Response, ServerError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix(BEARER))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ServerError::Unauthorized)?
        .to_owned();

    req.extensions_mut().insert(BearerToken(token));
    Ok(next.run(req).await)
}

pub fn router() -> Router<AppState> {
    Router::new()
        // `POST /register` goes to `register`.
        .route("/register", post(register::handler))
        // `POST /login` goes to `login`.
        .route("/login", post(login::handler))
        // `POST /create-admin` goes to `create_admin`.
        .route("/create-admin", post(create_admin::handler))
        // `GET /me` goes to `me`. Authorization required.
        .route(
            "/me",
            get(me::handler).route_layer(middleware::from_fn(auth)),
        )
}
