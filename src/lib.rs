//! Accounts is a small registration and authentication backend.
//!
//! Users register with a username and an e-mail, administrators log in with
//! either of them, and every session is a signed bearer token.

#![forbid(unsafe_code)]
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
mod router;
pub mod telemetry;
pub mod token;
pub mod user;

pub use error::ServerError;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::crypto::PasswordManager;
use crate::token::TokenManager;
use crate::user::AccountService;

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    /// Prometheus handle. `GET /metrics` answers 404 without it.
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        .nest("/api/auth", router::router())
        // `GET /metrics` goes to `render`.
        .route("/metrics", get(telemetry::render))
        .with_state(state)
        .route_layer(middleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    config: &config::Configuration,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let store = database::open(&config.database).await?;

    let passwords = Arc::new(PasswordManager::new(Some(config.argon2.clone()))?);
    let token = TokenManager::new(&config.token.secret, &config.token.issuer)
        .expiration(config.token.expiration);

    let accounts = AccountService::new(store, passwords, token)
        .allow_admin_creation(config.allow_admin_creation);

    Ok(AppState {
        accounts,
        metrics: None,
    })
}

#[cfg(test)]
pub(crate) const TEST_SECRET: &str = "test-secret";

/// In-memory state with cheap Argon2 parameters.
#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    let config = config::Configuration::default();
    let store = Arc::new(user::MemoryCredentialStore::new());
    let passwords =
        Arc::new(PasswordManager::new(Some(crypto::fast_config())).unwrap());
    let token = TokenManager::new(TEST_SECRET, &config.token.issuer);

    AppState {
        accounts: AccountService::new(store, passwords, token)
            .allow_admin_creation(true),
        metrics: None,
    }
}

/// MUST NEVER be used in production.
#[cfg(test)]
pub(crate) async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request =
            request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

#[cfg(test)]
pub(crate) async fn body_string(
    response: axum::http::Response<axum::body::Body>,
) -> String {
    use http_body_util::BodyExt;

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
