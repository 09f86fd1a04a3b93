use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Route access rules: the route table and the resolver.
pub mod access;
// Session cookies and the page-level extractors.
pub mod auth;
pub mod config;
pub mod error;
// Edge interceptor enforcing the route table on every request.
pub mod guard;
pub mod models;
pub mod probe;
pub mod session;

// HTTP surface.
pub mod actions;
pub mod handlers;
pub mod pages;
pub mod routes;
pub mod templates;
use routes::{api, auth as auth_routes, pages as page_routes};

// --- Public Re-exports ---

pub use access::{AccessDecision, RouteDescriptor, RouteTable, RouteTableState};
pub use config::AppConfig;
pub use probe::{GatewayProbe, MockGatewayProbe, ProbeState, SupabaseGateway};
pub use session::{MockSessionProvider, SessionProvider, SessionProviderState, SupabaseAuth};

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints, served at `/api-docs/openapi.json`.
/// Pages and form actions are not part of it.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::status, handlers::list_routes,
        handlers::check_access, handlers::current_session, handlers::end_session
    ),
    components(
        schemas(
            models::HealthResponse, models::StatusResponse, models::AccessResponse,
            models::SessionResponse, models::ErrorResponse, access::RouteDescriptor,
            access::RouteMeta, session::SessionUser,
        )
    ),
    tags(
        (name = "supanext", description = "SupaNext starter API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container shared by every request: the route table,
/// the session provider, the platform probe and the configuration.
#[derive(Clone)]
pub struct AppState {
    pub routes: RouteTableState,
    pub sessions: SessionProviderState,
    pub probe: ProbeState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RouteTableState {
    fn from_ref(app_state: &AppState) -> RouteTableState {
        app_state.routes.clone()
    }
}

impl FromRef<AppState> for SessionProviderState {
    fn from_ref(app_state: &AppState) -> SessionProviderState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for ProbeState {
    fn from_ref(app_state: &AppState) -> ProbeState {
        app_state.probe.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routes, puts the session guard in front of all of them and
/// wraps everything in the request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(page_routes::page_routes())
        .merge(auth_routes::auth_routes())
        .merge(api::api_routes())
        // Single enforcement point of the route table for every request.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::session_guard,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, correlated by the `x-request-id` set above.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
