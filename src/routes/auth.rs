use crate::{AppState, actions};
use axum::{
    Router,
    routing::{get, post},
};

/// Auth Router
///
/// Form submissions of the auth pages. Each action shares its path with the
/// page that renders the form, so the route table's rules apply to both.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(actions::sign_in))
        .route("/auth/signup", post(actions::sign_up))
        .route("/auth/forgot-password", post(actions::forgot_password))
        .route("/auth/reset-password", post(actions::reset_password))
        .route("/auth/signout", post(actions::sign_out))
        // GET /auth/callback?code=...&next=...
        // Target of email confirmation and recovery links.
        .route("/auth/callback", get(actions::callback))
}
