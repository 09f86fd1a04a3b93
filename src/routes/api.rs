use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// API Router
///
/// JSON endpoints. Documented in the OpenAPI document served at `/api-docs/openapi.json`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/status", get(handlers::status))
        .route("/api/routes", get(handlers::list_routes))
        .route("/api/access", get(handlers::check_access))
        .route(
            "/api/session",
            get(handlers::current_session).delete(handlers::end_session),
        )
}
