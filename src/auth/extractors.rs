use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use tracing::warn;

use super::jwt::JwtKeys;
use crate::{error::AppError, state::AppState, users::repo_types::User};

/// Authenticated caller, re-loaded from the database on every request.
///
/// Tokens are taken from the session cookie and from an
/// `Authorization: Bearer` header, in that order; the first one that
/// verifies is used, so a stale cookie does not shadow a valid header. A
/// token whose `ver` claim no longer matches the user's `token_version` is
/// rejected.
pub struct AuthUser(pub User);

fn candidate_tokens(parts: &Parts, cookie_name: &str) -> Vec<String> {
    let mut tokens = Vec::with_capacity(2);

    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(cookie_name) {
        if !cookie.value().is_empty() {
            tokens.push(cookie.value().to_string());
        }
    }

    let bearer = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| {
            auth.strip_prefix("Bearer ")
                .or_else(|| auth.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        tokens.push(token.to_string());
    }

    tokens
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let tokens = candidate_tokens(parts, &state.config.cookie.name);
        if tokens.is_empty() {
            return Err(AppError::Unauthorized("Missing authentication token".into()));
        }

        let keys = JwtKeys::from_ref(state);
        let claims = tokens
            .iter()
            .find_map(|t| keys.verify(t).ok())
            .ok_or_else(|| {
                warn!(candidates = tokens.len(), "invalid or expired token");
                AppError::Unauthorized("Invalid or expired token".into())
            })?;

        let user = state.users.find_by_id(claims.sub).await?.ok_or_else(|| {
            warn!(user_id = %claims.sub, "token for unknown user");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        if claims.ver != user.token_version {
            warn!(
                user_id = %user.id,
                token_ver = claims.ver,
                current_ver = user.token_version,
                "stale token rejected"
            );
            return Err(AppError::Unauthorized("Token has been revoked".into()));
        }

        Ok(AuthUser(user))
    }
}
