use askama::Template;
use axum::{
    extract::{Query, RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    access::RouteTable,
    auth::AuthUser,
    models::PageQuery,
    templates::{
        DashboardTemplate, ForgotPasswordTemplate, HomeTemplate, LoginTemplate,
        ResetPasswordTemplate, SignupTemplate,
    },
};

pub fn render<T: Template>(template: T) -> Response {
    match template.render() {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Template error: {e}")).into_response()
        }
    }
}

/// Document title for a page, taken from the route table.
fn page_title(routes: &RouteTable, path: &str) -> String {
    routes
        .get(path)
        .map(|route| route.meta.title.clone().unwrap_or_else(|| route.label.clone()))
        .unwrap_or_else(|| "SupaNext".to_string())
}

/// Query values that are present but empty count as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// --- Pages ---

/// `GET /`: landing page with the hosted platform's connection status.
pub async fn home(session: Option<AuthUser>, State(state): State<AppState>) -> Response {
    let status = state.probe.gateway_status().await;

    render(HomeTemplate {
        title: page_title(&state.routes, "/"),
        connection_problem: status.explain(&state.config.supabase_url),
        signed_in_as: session.map(|AuthUser { user, .. }| {
            user.email.unwrap_or_else(|| "unknown".to_string())
        }),
        login_path: state.routes.login_path().to_string(),
        dashboard_path: state.routes.dashboard_path().to_string(),
    })
}

/// `GET /auth/login`
pub async fn login(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    render(LoginTemplate {
        title: page_title(&state.routes, "/auth/login"),
        error: non_empty(query.error),
        message: non_empty(query.message),
        action: state.routes.login_path().to_string(),
        submit: "Sign in".to_string(),
        redirect_to: non_empty(query.redirect_to),
    })
}

/// `GET /auth/signup`
pub async fn signup(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    render(SignupTemplate {
        title: page_title(&state.routes, "/auth/signup"),
        error: non_empty(query.error),
        message: non_empty(query.message),
        action: "/auth/signup".to_string(),
        submit: "Sign up".to_string(),
        redirect_to: non_empty(query.redirect_to),
        login_path: state.routes.login_path().to_string(),
    })
}

/// `GET /auth/forgot-password`
pub async fn forgot_password(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Response {
    render(ForgotPasswordTemplate {
        title: page_title(&state.routes, "/auth/forgot-password"),
        error: non_empty(query.error),
        message: non_empty(query.message),
        login_path: state.routes.login_path().to_string(),
    })
}

/// `GET /auth/reset-password`, reached through the recovery email, which signs the user in.
pub async fn reset_password(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Response {
    render(ResetPasswordTemplate {
        title: page_title(&state.routes, "/auth/reset-password"),
        error: non_empty(query.error),
        message: non_empty(query.message),
        dashboard_path: state.routes.dashboard_path().to_string(),
    })
}

/// `GET /dashboard`
pub async fn dashboard(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Response {
    render(DashboardTemplate {
        title: page_title(&state.routes, "/dashboard"),
        error: non_empty(query.error),
        message: non_empty(query.message),
        email: user.email.unwrap_or_default(),
        user_id: user.id,
    })
}

// --- Legacy locations ---

fn moved(target: &str, query: Option<String>) -> Redirect {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => Redirect::permanent(&format!("{target}?{query}")),
        None => Redirect::permanent(target),
    }
}

/// `GET /login`. Older links still point here.
pub async fn legacy_login(State(state): State<AppState>, RawQuery(query): RawQuery) -> Redirect {
    moved(state.routes.login_path(), query)
}

/// `GET /signup`
pub async fn legacy_signup(RawQuery(query): RawQuery) -> Redirect {
    moved("/auth/signup", query)
}
