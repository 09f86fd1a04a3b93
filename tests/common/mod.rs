#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use std::sync::Arc;
use supanext::{
    AppConfig, AppState, MockGatewayProbe, MockSessionProvider, RouteTable, create_router,
    probe::ProbeState, session::{SessionProviderState, SessionUser},
};
use uuid::Uuid;

pub const FORM: &str = "application/x-www-form-urlencoded";

pub fn user(email: &str) -> SessionUser {
    SessionUser {
        id: Uuid::new_v4(),
        email: Some(email.to_string()),
    }
}

/// Builds the full router around the given mocks. The returned handle points
/// at the same provider the router uses, for assertions.
pub fn test_app(
    sessions: MockSessionProvider,
    probe: MockGatewayProbe,
) -> (Router, Arc<MockSessionProvider>) {
    let sessions = Arc::new(sessions);
    let state = AppState {
        routes: Arc::new(RouteTable::standard().unwrap()),
        sessions: sessions.clone() as SessionProviderState,
        probe: Arc::new(probe) as ProbeState,
        config: AppConfig::default(),
    };
    (create_router(state), sessions)
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, FORM);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response has no Location header")
        .to_str()
        .unwrap()
        .to_string()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// The `name=value` pair of a cookie set by the response, ready for a `Cookie` header.
pub fn cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|cookie| cookie.starts_with(&format!("{name}=")))
        .map(|cookie| cookie.split(';').next().unwrap().to_string())
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
