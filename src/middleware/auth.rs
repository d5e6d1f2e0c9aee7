use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{bearer_token, decode_session, AuthError};
use crate::error::ApiError;
use crate::state::AppState;

/// Validates the bearer token, refuses logged-out sessions and injects the
/// [`Session`](crate::auth::Session) as a request extension
pub async fn session_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .map(|v| v.to_str())
        .transpose()
        .map_err(|_| AuthError::Malformed("Invalid Authorization header format".to_string()))?;

    let token = bearer_token(header)?;
    let session = decode_session(token, &state.config.security.jwt_secret)?;

    if state.sessions.is_revoked(&session).await {
        tracing::debug!("Rejected logged-out session for {}", session.email);
        return Err(AuthError::Revoked.into());
    }

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
