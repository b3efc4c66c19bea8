use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

use crate::{auth::jwt::JwtKeys, error::AppError, state::AppState};

/// Authenticated caller. The access token comes from the `Authorization`
/// header or, failing that, from the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// Caller if a valid session is present, anonymous otherwise.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthUser(pub Option<Uuid>);

fn session_token(parts: &Parts, cookie_name: &str) -> Result<Option<String>, AppError> {
    if let Some(auth) = parts.headers.get(AUTHORIZATION) {
        let auth = auth
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid auth scheme".into()))?;
        return Ok(Some(token.trim().to_string()));
    }

    let jar = CookieJar::from_headers(&parts.headers);
    Ok(jar.get(cookie_name).map(|c| c.value().to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts, &state.config.session.cookie_name)?
            .ok_or_else(|| AppError::Unauthorized("Login required".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        Ok(AuthUser(claims.sub))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(AuthUser(id)) => Ok(MaybeAuthUser(Some(id))),
            Err(_) => Ok(MaybeAuthUser(None)),
        }
    }
}
