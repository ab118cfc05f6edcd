use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use tracing::warn;

use crate::auth::claims::Claims;
use crate::error::AuthError;
use crate::state::AppState;

/// Extracts and verifies the bearer access token. Refresh tokens
/// presented here fail: they are signed with the other secret.
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::Unauthorized)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AuthError::Unauthorized)?;

        let claims = state.keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "access token rejected");
            AuthError::Unauthorized
        })?;

        Ok(AuthUser(claims))
    }
}
