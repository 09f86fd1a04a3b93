use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::convert::Infallible;
use time::Duration;

use crate::{
    access::RouteTableState,
    session::{ActiveSession, SessionTokens, SessionUser},
};

/// Cookie holding the Supabase access token (JWT).
pub const ACCESS_COOKIE: &str = "sb-access-token";
/// Cookie holding the refresh token used to renew an expired access token.
pub const REFRESH_COOKIE: &str = "sb-refresh-token";
/// Cookie holding the PKCE verifier between sending an email link and its callback.
pub const VERIFIER_COOKIE: &str = "sb-code-verifier";

const REFRESH_COOKIE_LIFETIME: Duration = Duration::days(30);
const VERIFIER_COOKIE_LIFETIME: Duration = Duration::minutes(10);

fn cookie(name: &'static str, value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// Writes a freshly issued token pair into the session cookies.
pub fn store_session(jar: CookieJar, tokens: &SessionTokens, secure: bool) -> CookieJar {
    let access_lifetime = Duration::seconds(tokens.expires_in.max(0));
    jar.add(cookie(
        ACCESS_COOKIE,
        tokens.access_token.clone(),
        secure,
        access_lifetime,
    ))
    .add(cookie(
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        secure,
        REFRESH_COOKIE_LIFETIME,
    ))
}

/// Expires both session cookies on the client.
pub fn clear_session(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(cookie(ACCESS_COOKIE, String::new(), secure, Duration::ZERO))
        .add(cookie(REFRESH_COOKIE, String::new(), secure, Duration::ZERO))
}

pub fn store_verifier(jar: CookieJar, verifier: &str, secure: bool) -> CookieJar {
    jar.add(cookie(
        VERIFIER_COOKIE,
        verifier.to_string(),
        secure,
        VERIFIER_COOKIE_LIFETIME,
    ))
}

pub fn clear_verifier(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(cookie(VERIFIER_COOKIE, String::new(), secure, Duration::ZERO))
}

/// Reads the `(access, refresh)` token pair presented by the browser.
pub fn session_tokens(jar: &CookieJar) -> (Option<&str>, Option<&str>) {
    let read = |name: &str| {
        jar.get(name)
            .map(Cookie::value)
            .filter(|value| !value.is_empty())
    };
    (read(ACCESS_COOKIE), read(REFRESH_COOKIE))
}

/// AuthUser
///
/// Page-level guard. Handlers that take an `AuthUser` only run for signed-in
/// visitors; everyone else is redirected to the location the route table
/// decides for this path, with the original location carried as `redirectTo`.
///
/// Handlers that render differently for guests take `Option<AuthUser>`, which
/// never rejects.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: SessionUser,
    /// The token that authenticated this request; needed for calls made on the user's behalf.
    pub access_token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RouteTableState: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<ActiveSession>() {
            return Ok(AuthUser::from(session));
        }

        let routes = RouteTableState::from_ref(state);
        let path = parts.uri.path();
        let query = parts.uri.query();

        // The table may not list this path; an AuthUser handler still needs a login.
        let location = routes
            .redirect_location(path, query, false)
            .unwrap_or_else(|| routes.login_redirect(path, query));

        tracing::debug!(%path, %location, "page guard rejected anonymous request");
        Err(Redirect::to(&location))
    }
}

impl From<&ActiveSession> for AuthUser {
    fn from(session: &ActiveSession) -> Self {
        AuthUser {
            user: session.user.clone(),
            access_token: session.access_token.clone(),
        }
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<ActiveSession>().map(AuthUser::from))
    }
}
