//! Cookie-session plumbing: reading the session cookie and the three
//! extractor levels handlers ask for.
//!
//! `MaybeUser` never rejects and is what public pages use.  `CurrentUser`
//! bounces anonymous visitors to the login form.  `StaffUser` additionally
//! requires the staff flag and renders a 403 otherwise.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use innerforge_core::auth;
use innerforge_core::model::User;

use crate::error::{forbidden, AppError};
use crate::AppState;

pub const COOKIE_NAME: &str = "forge_session";

/// Pull the session token out of the Cookie header, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        pair.trim()
            .strip_prefix(COOKIE_NAME)?
            .strip_prefix('=')
            .map(|v| v.to_string())
    })
}

/// A Set-Cookie value that establishes the session.
pub fn session_cookie(token: &str, ttl_hours: u32) -> String {
    let max_age = u64::from(ttl_hours) * 3600;
    format!("{COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

/// A Set-Cookie value that discards the session.
pub fn clear_cookie() -> String {
    format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Attach a Set-Cookie header to a redirect.
pub fn redirect_with_cookie(to: &str, cookie: &str) -> Response {
    let mut response = Redirect::to(to).into_response();
    if let Ok(value) = cookie.parse() {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

/// The signed-in user, when there is one. Never rejects.
pub struct MaybeUser(pub Option<User>);

/// The signed-in user; anonymous requests are redirected to `/login`.
pub struct CurrentUser(pub User);

/// A signed-in staff user; everyone else gets a 403 page.
pub struct StaffUser(pub User);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(Self(None));
        };
        match auth::authenticate(&state.store, &token).await {
            Ok(user) => Ok(Self(user)),
            Err(e) => Err(AppError(e.into()).into_response()),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        match user {
            Some(user) => Ok(Self(user)),
            None => Err(Redirect::to("/login").into_response()),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for StaffUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.is_staff {
            Ok(Self(user))
        } else {
            Err(forbidden().into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_token_parses_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; forge_session=abc123; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn session_token_ignores_prefix_collisions() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("forge_session_old=zzz; other=1"),
        );
        assert_eq!(session_token(&headers), None);

        assert!(session_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn cookie_values_round_trip() {
        let set = session_cookie("tok", 336);
        assert!(set.starts_with("forge_session=tok;"));
        assert!(set.contains("Max-Age=1209600"));
        assert!(set.contains("HttpOnly"));

        let clear = clear_cookie();
        assert!(clear.contains("Max-Age=0"));
    }
}
