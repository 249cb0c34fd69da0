use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{ApiError, AppState};
use crate::accounts::{Account, Player};
use crate::auth::{
    hash_password, validate_email, validate_password, validate_username, verify_password, Claims,
    ValidationError,
};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        validate_password(&self.password)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        validate_password(&self.password)?;
        validate_email(&self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub status: String,
    pub token: String,
}

impl TokenResponse {
    fn ok(token: String) -> Self {
        Self {
            status: "ok".to_string(),
            token,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlayerQuery {
    pub username: Option<String>,
}

pub async fn welcome() -> &'static str {
    "Welcome to vanilla"
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = payload.map_err(|err| {
        debug!("register body rejected: {}", err);
        ApiError::BadRequest
    })?;
    req.validate().map_err(ApiError::IllegalCredentials)?;

    let password_hash = hash_password(&req.password, state.auth.bcrypt_cost)
        .await
        .map_err(|err| {
            warn!("⚠️ Password hashing failed: {}", err);
            ApiError::Hashing
        })?;

    let account = Account {
        username: req.username.clone(),
        email: req.email,
        password_hash,
    };
    let player = Player::new(&req.username, jsonwebtoken::get_current_timestamp());
    if !state.accounts.insert_if_absent(account, player).await? {
        return Err(ApiError::UsernameTaken);
    }

    let token = state
        .tokens
        .issue(&req.username, state.auth.register_token_ttl)
        .map_err(|_| ApiError::TokenIssue)?;
    info!("👤 Registered account {}", req.username);
    Ok(Json(TokenResponse::ok(token)))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = payload.map_err(|err| {
        debug!("login body rejected: {}", err);
        ApiError::BadRequest
    })?;
    req.validate().map_err(ApiError::IllegalCredentials)?;

    let account = state
        .accounts
        .find(&req.username)
        .await?
        .ok_or(ApiError::UnknownUser)?;

    // A corrupt stored hash is indistinguishable from a wrong password.
    let matches = verify_password(&req.password, &account.password_hash)
        .await
        .unwrap_or(false);
    if !matches {
        return Err(ApiError::PasswordMismatch);
    }

    let token = state
        .tokens
        .issue(&account.username, state.auth.token_ttl)
        .map_err(|_| ApiError::TokenIssue)?;
    info!("🔑 {} logged in", account.username);
    Ok(Json(TokenResponse::ok(token)))
}

pub async fn ping(Extension(claims): Extension<Claims>) -> Json<Value> {
    debug!(subject = %claims.subject(), "ping");
    Json(json!({ "result": "pong" }))
}

pub async fn player_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PlayerQuery>,
) -> Result<Json<Player>, ApiError> {
    let username = query.username.unwrap_or(claims.jti);
    state
        .accounts
        .player(&username)
        .await?
        .map(Json)
        .ok_or(ApiError::PlayerNotFound)
}
