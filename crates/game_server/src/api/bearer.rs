use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use super::{ApiError, AppState};
use crate::auth::AuthError;

/// Rejects requests without a valid bearer token and exposes the
/// verified [`crate::auth::Claims`] to handlers as a request extension.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let header = match request.headers().get(AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| ApiError::Unauthorized(AuthError::MalformedHeader))?,
            ),
            None => None,
        };
        state.tokens.validate_bearer(header).map_err(|err| {
            debug!(path = %request.uri().path(), "rejected request: {}", err);
            ApiError::Unauthorized(err)
        })?
    };

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
