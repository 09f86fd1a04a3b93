use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    auth::{self, ACCESS_COOKIE, REFRESH_COOKIE},
    session::SessionLookup,
};

const STATIC_EXTENSIONS: &[&str] = &[".svg", ".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// Requests for these never touch the session provider.
pub fn is_static_asset(path: &str) -> bool {
    path == "/favicon.ico"
        || path.starts_with("/static/")
        || STATIC_EXTENSIONS.iter().any(|extension| path.ends_with(extension))
}

/// session_guard
///
/// Edge interceptor applied to every route.
///
/// 1. Resolves the session cookies through the `SessionProvider`, refreshing them if needed.
/// 2. Asks the route table whether the request may proceed; denied requests get a
///    `303 See Other` to the decided location.
/// 3. Makes the verified session available to extractors (`AuthUser`, `Option<AuthUser>`).
/// 4. Writes refreshed (or expired) session cookies onto whatever response goes out.
///
/// A provider failure is logged and the request continues as anonymous, so
/// protected routes stay closed when the provider is down.
pub async fn session_guard(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_static_asset(&path) {
        return next.run(request).await;
    }

    let (access_token, refresh_token) = auth::session_tokens(&jar);
    let lookup = match state.sessions.lookup(access_token, refresh_token).await {
        Ok(lookup) => lookup,
        Err(e) => {
            tracing::warn!(error = %e, %path, "session lookup failed, treating request as anonymous");
            SessionLookup::anonymous()
        }
    };

    let outgoing = outgoing_cookies(&lookup, state.config.cookie_secure);
    let is_authenticated = lookup.is_authenticated();

    if let Some(location) =
        state
            .routes
            .redirect_location(&path, request.uri().query(), is_authenticated)
    {
        tracing::info!(%path, %location, is_authenticated, "access denied, redirecting");
        return (outgoing, Redirect::to(&location)).into_response();
    }

    if let Some(session) = lookup.session {
        request.extensions_mut().insert(session);
    }

    let response = next.run(request).await;

    // A handler that just signed the user in or out owns the session cookies.
    if sets_session_cookie(&response) {
        return response;
    }
    (outgoing, response).into_response()
}

fn outgoing_cookies(lookup: &SessionLookup, secure: bool) -> CookieJar {
    let jar = CookieJar::new();
    match &lookup.refreshed {
        Some(tokens) => auth::store_session(jar, tokens, secure),
        None if lookup.expired => auth::clear_session(jar, secure),
        None => jar,
    }
}

fn sets_session_cookie(response: &Response) -> bool {
    let access = format!("{ACCESS_COOKIE}=");
    let refresh = format!("{REFRESH_COOKIE}=");
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&access) || value.starts_with(&refresh))
}
