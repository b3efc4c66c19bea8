use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, PublicUser, RegisterRequest},
        jwt::JwtKeys,
    },
    config::SessionConfig,
    error::AppError,
};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 80;
pub const EMAIL_MAX: usize = 255;
pub const PASSWORD_MIN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims the username, normalizes the email and checks field rules.
pub fn normalize_registration(payload: &mut RegisterRequest) -> Result<(), AppError> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    let name_len = payload.username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&name_len) {
        return Err(AppError::BadRequest(format!(
            "Username must be {USERNAME_MIN} to {USERNAME_MAX} characters"
        )));
    }
    if payload.email.len() > EMAIL_MAX || !is_valid_email(&payload.email) {
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    if payload.password.chars().count() < PASSWORD_MIN {
        return Err(AppError::BadRequest("Password too short".into()));
    }
    Ok(())
}

/// Signs a fresh token pair and stores the access token in the session cookie.
pub fn start_session(
    keys: &JwtKeys,
    session: &SessionConfig,
    jar: CookieJar,
    user: PublicUser,
) -> anyhow::Result<(CookieJar, AuthResponse)> {
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    let cookie = session_cookie(session, access_token.clone(), keys.access_ttl.as_secs());
    Ok((
        jar.add(cookie),
        AuthResponse {
            access_token,
            refresh_token,
            user,
        },
    ))
}

pub fn end_session(session: &SessionConfig, jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(session.cookie_name.clone()).path("/"))
}

fn session_cookie(session: &SessionConfig, token: String, max_age_secs: u64) -> Cookie<'static> {
    Cookie::build((session.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(session.secure)
        .max_age(time::Duration::seconds(max_age_secs as i64))
        .build()
}

/// Only the owner may change a recipe.
pub fn ensure_owner(owner_id: Uuid, caller: Uuid) -> Result<(), AppError> {
    if owner_id == caller {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
