use crate::{
    AppState,
    access::RouteDescriptor,
    auth::{self, AuthUser},
    error::AppError,
    models::{AccessQuery, AccessResponse, HealthResponse, SessionResponse, StatusResponse},
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

// --- Handlers ---

/// health
///
/// [Public Route] Liveness of this service and of the hosted auth provider.
/// Always answers 200; the `supabase` field carries the provider's state.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.probe.auth_reachable().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        supabase: if connected { "connected" } else { "disconnected" }.to_string(),
    })
}

/// status
///
/// [Public Route] Static answer proving the API layer itself is serving.
#[utoipa::path(
    get,
    path = "/api/status",
    responses((status = 200, description = "API status", body = StatusResponse))
)]
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        message: "API is working".to_string(),
        timestamp: Utc::now(),
    })
}

/// list_routes
///
/// [Public Route] The route table, in configuration order, for building navigation
/// (labels, titles) on the client.
#[utoipa::path(
    get,
    path = "/api/routes",
    responses((status = 200, description = "Configured routes", body = [RouteDescriptor]))
)]
pub async fn list_routes(State(state): State<AppState>) -> Json<Vec<RouteDescriptor>> {
    Json(state.routes.iter().cloned().collect())
}

/// check_access
///
/// [Public Route] Resolves a path against the route table for the caller's
/// current session. Client-side navigation asks this instead of re-implementing
/// the rules.
#[utoipa::path(
    get,
    path = "/api/access",
    params(AccessQuery),
    responses((status = 200, description = "Access decision", body = AccessResponse))
)]
pub async fn check_access(
    session: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<AccessQuery>,
) -> Json<AccessResponse> {
    let (path, path_query) = match query.path.split_once('?') {
        Some((path, rest)) => (path, Some(rest)),
        None => (query.path.as_str(), None),
    };
    let location = state
        .routes
        .redirect_location(path, path_query, session.is_some());

    Json(AccessResponse {
        path: path.to_string(),
        allowed: location.is_none(),
        location,
    })
}

/// current_session
///
/// [Authenticated Route] The signed-in user.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Current user", body = SessionResponse),
        (status = 401, description = "No session", body = crate::models::ErrorResponse)
    )
)]
pub async fn current_session(
    session: Option<AuthUser>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = session.ok_or(AppError::Unauthenticated)?;
    Ok(Json(SessionResponse { user: session.user }))
}

/// end_session
///
/// [Authenticated Route] Signs out through the provider and clears the session
/// cookies. The cookies are only cleared once the provider confirmed.
#[utoipa::path(
    delete,
    path = "/api/session",
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "No session", body = crate::models::ErrorResponse),
        (status = 502, description = "Provider unavailable", body = crate::models::ErrorResponse)
    )
)]
pub async fn end_session(
    State(state): State<AppState>,
    jar: CookieJar,
    session: Option<AuthUser>,
) -> Result<(CookieJar, StatusCode), AppError> {
    let session = session.ok_or(AppError::Unauthenticated)?;
    state.sessions.sign_out(&session.access_token).await?;

    tracing::info!(user_id = %session.user.id, "signed out via api");
    Ok((
        auth::clear_session(jar, state.config.cookie_secure),
        StatusCode::NO_CONTENT,
    ))
}
