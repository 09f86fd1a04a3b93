use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::{
    AppState,
    access::REDIRECT_QUERY_KEY,
    auth::{self, AuthUser, VERIFIER_COOKIE},
    models::{CallbackQuery, CredentialsForm, EmailForm, PasswordForm},
    session::PkceChallenge,
};

const MIN_PASSWORD_LENGTH: usize = 6;
const CALLBACK_FAILURE: &str = "Could not authenticate";

/// Builds `path?k=v&...`, skipping empty values and percent-encoding the rest.
pub fn location_with(path: &str, params: &[(&str, Option<&str>)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter_map(|&(key, value)| {
            value
                .filter(|v| !v.is_empty())
                .map(|v| format!("{key}={}", urlencoding::encode(v)))
        })
        .collect();

    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", query.join("&"))
    }
}

/// `POST /auth/login`
///
/// On success the session cookies ride on the same redirect that sends the
/// visitor back to `redirectTo`, so the next request is already authenticated.
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let redirect_to = form.redirect_to.as_deref();

    match state.sessions.sign_in(&form.email, &form.password).await {
        Ok(tokens) => {
            let target = state.routes.safe_return_path(redirect_to);
            tracing::info!(%target, "sign-in succeeded");
            (
                auth::store_session(jar, &tokens, state.config.cookie_secure),
                Redirect::to(target),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "sign-in failed");
            Redirect::to(&location_with(
                state.routes.login_path(),
                &[
                    ("error", Some(e.user_message().as_str())),
                    (REDIRECT_QUERY_KEY, redirect_to),
                ],
            ))
            .into_response()
        }
    }
}

/// `POST /auth/signup`
///
/// Projects with email confirmation answer without a session; the visitor is
/// told to check their inbox and the PKCE verifier is kept for the callback.
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let secure = state.config.cookie_secure;
    let pkce = PkceChallenge::generate();
    let email_redirect = format!("{}/auth/callback", state.config.site_url);

    let result = state
        .sessions
        .sign_up(&form.email, &form.password, &email_redirect, &pkce.challenge)
        .await;

    match result {
        Ok(Some(tokens)) => {
            tracing::info!("sign-up succeeded with immediate session");
            let target = state.routes.safe_return_path(form.redirect_to.as_deref());
            (auth::store_session(jar, &tokens, secure), Redirect::to(target)).into_response()
        }
        Ok(None) => {
            tracing::info!("sign-up succeeded, awaiting email confirmation");
            (
                auth::store_verifier(jar, &pkce.verifier, secure),
                Redirect::to(&location_with(
                    "/auth/signup",
                    &[(
                        "message",
                        Some("Check your email to confirm your account."),
                    )],
                )),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "sign-up failed");
            Redirect::to(&location_with(
                "/auth/signup",
                &[
                    ("error", Some(e.user_message().as_str())),
                    (REDIRECT_QUERY_KEY, form.redirect_to.as_deref()),
                ],
            ))
            .into_response()
        }
    }
}

/// `POST /auth/signout`
///
/// Cookies are cleared even if the provider could not be told; the local
/// session must end regardless.
pub async fn sign_out(
    State(state): State<AppState>,
    jar: CookieJar,
    session: Option<AuthUser>,
) -> Response {
    if let Some(session) = session {
        match state.sessions.sign_out(&session.access_token).await {
            Ok(()) => tracing::info!(user_id = %session.user.id, "signed out"),
            Err(e) => tracing::error!(error = %e, "sign-out error"),
        }
    }

    (
        auth::clear_session(jar, state.config.cookie_secure),
        Redirect::to(state.routes.login_path()),
    )
        .into_response()
}

/// `POST /auth/forgot-password`
pub async fn forgot_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<EmailForm>,
) -> Response {
    let pkce = PkceChallenge::generate();
    // The recovery link signs the user in through the callback, then lands on the reset form.
    let recovery_redirect = location_with(
        &format!("{}/auth/callback", state.config.site_url),
        &[("next", Some("/auth/reset-password"))],
    );

    let result = state
        .sessions
        .send_password_reset(&form.email, &recovery_redirect, &pkce.challenge)
        .await;

    match result {
        Ok(()) => (
            auth::store_verifier(jar, &pkce.verifier, state.config.cookie_secure),
            Redirect::to(&location_with(
                "/auth/forgot-password",
                &[("message", Some("Password reset email sent"))],
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "password reset request failed");
            Redirect::to(&location_with(
                "/auth/forgot-password",
                &[("error", Some(e.user_message().as_str()))],
            ))
            .into_response()
        }
    }
}

/// `POST /auth/reset-password`
pub async fn reset_password(
    session: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<PasswordForm>,
) -> Redirect {
    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Redirect::to(&location_with(
            "/auth/reset-password",
            &[("error", Some("Password must be at least 6 characters"))],
        ));
    }

    match state
        .sessions
        .update_password(&session.access_token, &form.password)
        .await
    {
        Ok(()) => {
            tracing::info!(user_id = %session.user.id, "password updated");
            Redirect::to(state.routes.dashboard_path())
        }
        Err(e) => {
            tracing::warn!(error = %e, "password update failed");
            Redirect::to(&location_with(
                "/auth/reset-password",
                &[("error", Some(e.user_message().as_str()))],
            ))
        }
    }
}

/// `GET /auth/callback?code=...&next=...`
///
/// Landing point of email confirmation, password recovery and OAuth redirects.
/// Exchanges the one-time code for a session.
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let secure = state.config.cookie_secure;
    let failure = || {
        Redirect::to(&location_with(
            state.routes.login_path(),
            &[("error", Some(CALLBACK_FAILURE))],
        ))
    };

    if let Some(reason) = &query.error_description {
        tracing::warn!(%reason, "provider reported a failed callback");
    }

    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        return failure().into_response();
    };

    let verifier = jar
        .get(VERIFIER_COOKIE)
        .map(Cookie::value)
        .unwrap_or_default()
        .to_string();

    match state.sessions.exchange_code(code, &verifier).await {
        Ok(tokens) => {
            let target = state.routes.safe_return_path(query.next.as_deref());
            tracing::info!(%target, "auth code exchanged");
            let jar = auth::clear_verifier(jar, secure);
            (auth::store_session(jar, &tokens, secure), Redirect::to(target)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "auth code exchange failed");
            failure().into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_skips_empty_values_and_encodes() {
        assert_eq!(location_with("/a", &[]), "/a");
        assert_eq!(location_with("/a", &[("error", None), ("x", Some(""))]), "/a");
        assert_eq!(
            location_with(
                "/auth/login",
                &[("error", Some("Could not authenticate")), ("redirectTo", Some("/dashboard"))]
            ),
            "/auth/login?error=Could%20not%20authenticate&redirectTo=%2Fdashboard"
        );
    }
}
