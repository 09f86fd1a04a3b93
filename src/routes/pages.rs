use crate::{AppState, pages};
use axum::{Router, routing::get};

/// Page Router
///
/// Every page the route table describes, plus the pre-`/auth` locations kept
/// as permanent redirects.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Landing page; shows whether the hosted platform is reachable.
        .route("/", get(pages::home))
        // Guest-only: signed-in visitors are sent to the dashboard by the edge guard.
        .route("/auth/login", get(pages::login))
        .route("/auth/signup", get(pages::signup))
        .route("/auth/forgot-password", get(pages::forgot_password))
        // Protected: the edge guard and the AuthUser extractor both require a session.
        .route("/auth/reset-password", get(pages::reset_password))
        .route("/dashboard", get(pages::dashboard))
        .route("/login", get(pages::legacy_login))
        .route("/signup", get(pages::legacy_signup))
}
