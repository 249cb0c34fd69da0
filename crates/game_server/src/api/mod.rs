//! REST surface: account routes, bearer-gated `/api` routes and CORS.

mod bearer;
mod error;
mod handlers;

pub use bearer::require_bearer;
pub use error::ApiError;
pub use handlers::{LoginRequest, PlayerQuery, RegisterRequest, TokenResponse};

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{
    ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN,
};
use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::accounts::AccountStore;
use crate::auth::TokenAuthority;
use crate::config::AuthConfig;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub tokens: Arc<TokenAuthority>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(accounts: Arc<dyn AccountStore>, tokens: Arc<TokenAuthority>, auth: AuthConfig) -> Self {
        Self {
            accounts,
            tokens,
            auth,
        }
    }
}

/// Builds the full REST router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/playerinfo", get(handlers::player_info))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/", get(handlers::welcome))
        .route("/login", post(handlers::login))
        .route("/register", post(handlers::register))
        .nest("/api", protected)
        .layer(cors_layer())
        .with_state(state)
}

/// Mirrors the caller's origin so credentialed browser requests work.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            CONTENT_TYPE,
            CONTENT_LENGTH,
            ACCEPT_ENCODING,
            AUTHORIZATION,
            ACCEPT,
            ORIGIN,
            CACHE_CONTROL,
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(Duration::from_secs(86_400))
}
