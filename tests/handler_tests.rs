mod common;

use axum::{body::Body, http::{Request, StatusCode}};
use common::*;
use serde_json::Value;
use supanext::{MockGatewayProbe, MockSessionProvider, probe::GatewayStatus};
use tower::util::ServiceExt;

async fn json(response: axum::http::Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

// --- Sign in / sign out ---

#[tokio::test]
async fn sign_in_sets_cookies_and_returns_to_the_original_page() {
    let sessions = MockSessionProvider::new().with_account("ada@example.com", "hunter22");
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .oneshot(post_form(
            "/auth/login",
            "email=ada%40example.com&password=hunter22&redirectTo=%2Fauth%2Freset-password",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/reset-password");
    let access = cookie_pair(&response, "sb-access-token").unwrap();
    assert!(access.starts_with("sb-access-token=mock-access-"));
    assert!(cookie_pair(&response, "sb-refresh-token").is_some());
    assert!(
        set_cookies(&response)
            .iter()
            .all(|c| c.contains("HttpOnly") && c.contains("Path=/"))
    );
}

#[tokio::test]
async fn sign_in_ignores_offsite_return_locations() {
    let sessions = MockSessionProvider::new().with_account("ada@example.com", "hunter22");
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    for target in [
        "%2F%2Fevil.example",
        "https%3A%2F%2Fevil.example%2Fdashboard",
        "dashboard",
        "%2F%09%2Fevil.example",
        "%2F%0A%2Fevil.example",
    ] {
        let body = format!("email=ada%40example.com&password=hunter22&redirectTo={target}");
        let response = app
            .clone()
            .oneshot(post_form("/auth/login", &body, None))
            .await
            .unwrap();

        assert_eq!(location(&response), "/dashboard", "{target}");
    }
}

#[tokio::test]
async fn failed_sign_in_returns_to_the_form_with_the_error() {
    let sessions = MockSessionProvider::new().with_account("ada@example.com", "hunter22");
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .clone()
        .oneshot(post_form(
            "/auth/login",
            "email=ada%40example.com&password=wrong&redirectTo=%2Fdashboard",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert_eq!(
        target,
        "/auth/login?error=Invalid%20login%20credentials&redirectTo=%2Fdashboard"
    );
    assert!(set_cookies(&response).is_empty());

    // The form shows the message and still carries the return location.
    let page = app.oneshot(get(&target, None)).await.unwrap();
    let body = body_text(page).await;
    assert!(body.contains("Invalid login credentials"));
    assert!(body.contains(r#"name="redirectTo" value="/dashboard""#));
}

#[tokio::test]
async fn login_then_dashboard_round_trip() {
    let sessions = MockSessionProvider::new().with_account("ada@example.com", "hunter22");
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let denied = app.clone().oneshot(get("/dashboard", None)).await.unwrap();
    assert_eq!(location(&denied), "/auth/login?redirectTo=/dashboard");

    let signed_in = app
        .clone()
        .oneshot(post_form(
            "/auth/login",
            "email=ada%40example.com&password=hunter22&redirectTo=%2Fdashboard",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(location(&signed_in), "/dashboard");
    let cookie = cookie_pair(&signed_in, "sb-access-token").unwrap();

    let dashboard = app.oneshot(get("/dashboard", Some(&cookie))).await.unwrap();
    assert_eq!(dashboard.status(), StatusCode::OK);
    assert!(body_text(dashboard).await.contains("ada@example.com"));
}

#[tokio::test]
async fn sign_out_ends_the_session() {
    let sessions = MockSessionProvider::new().with_session("token-1", user("ada@example.com"));
    let (app, sessions) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .clone()
        .oneshot(post_form("/auth/signout", "", Some("sb-access-token=token-1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login");
    assert_eq!(sessions.signed_out_tokens(), vec!["token-1".to_string()]);
    let cookies = set_cookies(&response);
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("sb-access-token=;") && c.contains("Max-Age=0"))
    );

    let after = app
        .oneshot(get("/dashboard", Some("sb-access-token=token-1")))
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn sign_out_clears_cookies_even_when_the_provider_is_down() {
    let (app, _) = test_app(MockSessionProvider::new_failing(), MockGatewayProbe::healthy());

    let response = app
        .oneshot(post_form("/auth/signout", "", Some("sb-access-token=token-1")))
        .await
        .unwrap();

    assert_eq!(location(&response), "/auth/login");
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("sb-refresh-token=;") && c.contains("Max-Age=0"))
    );
}

// --- Sign up ---

#[tokio::test]
async fn sign_up_with_immediate_session_goes_to_the_dashboard() {
    let (app, _) = test_app(MockSessionProvider::new(), MockGatewayProbe::healthy());

    let response = app
        .oneshot(post_form(
            "/auth/signup",
            "email=new%40example.com&password=hunter22",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    assert!(cookie_pair(&response, "sb-access-token").is_some());
}

#[tokio::test]
async fn sign_up_awaiting_confirmation_asks_to_check_email() {
    let mut sessions = MockSessionProvider::new();
    sessions.requires_confirmation = true;
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .clone()
        .oneshot(post_form(
            "/auth/signup",
            "email=new%40example.com&password=hunter22",
            None,
        ))
        .await
        .unwrap();

    let target = location(&response);
    assert_eq!(
        target,
        "/auth/signup?message=Check%20your%20email%20to%20confirm%20your%20account."
    );
    assert!(cookie_pair(&response, "sb-access-token").is_none());
    assert!(cookie_pair(&response, "sb-code-verifier").is_some());

    let page = app.oneshot(get(&target, None)).await.unwrap();
    assert!(body_text(page).await.contains("Check your email"));
}

#[tokio::test]
async fn sign_up_with_a_taken_email_reports_the_error() {
    let sessions = MockSessionProvider::new().with_account("ada@example.com", "hunter22");
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .oneshot(post_form(
            "/auth/signup",
            "email=ada%40example.com&password=hunter22",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        "/auth/signup?error=User%20already%20registered"
    );
}

// --- Callback ---

#[tokio::test]
async fn callback_exchanges_the_code_and_follows_next() {
    let sessions = MockSessionProvider::new().with_code("code-1", user("ada@example.com"));
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .clone()
        .oneshot(get(
            "/auth/callback?code=code-1&next=%2Fauth%2Freset-password",
            Some("sb-code-verifier=verifier-1"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/reset-password");
    let cookies = set_cookies(&response);
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("sb-code-verifier=;") && c.contains("Max-Age=0"))
    );
    let cookie = cookie_pair(&response, "sb-access-token").unwrap();

    // The recovery session opens the reset form.
    let form = app
        .oneshot(get("/auth/reset-password", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(form.status(), StatusCode::OK);
    assert!(body_text(form).await.contains("Enter your new password"));
}

#[tokio::test]
async fn callback_without_next_lands_on_the_dashboard() {
    let sessions = MockSessionProvider::new().with_code("code-1", user("ada@example.com"));
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .oneshot(get("/auth/callback?code=code-1", None))
        .await
        .unwrap();

    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn callback_refuses_offsite_next_locations() {
    let sessions = MockSessionProvider::new().with_code("code-1", user("ada@example.com"));
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .oneshot(get("/auth/callback?code=code-1&next=%2F%09%2Fevil.example", None))
        .await
        .unwrap();

    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn callback_failures_return_to_login() {
    let (app, _) = test_app(MockSessionProvider::new(), MockGatewayProbe::healthy());

    for uri in [
        "/auth/callback?code=unknown",
        "/auth/callback",
        "/auth/callback?error_description=Email+link+is+invalid",
    ] {
        let response = app.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(
            location(&response),
            "/auth/login?error=Could%20not%20authenticate",
            "{uri}"
        );
    }
}

// --- Password recovery ---

#[tokio::test]
async fn forgot_password_sends_a_recovery_link_through_the_callback() {
    let (app, sessions) = test_app(MockSessionProvider::new(), MockGatewayProbe::healthy());

    let response = app
        .oneshot(post_form(
            "/auth/forgot-password",
            "email=ada%40example.com",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        "/auth/forgot-password?message=Password%20reset%20email%20sent"
    );
    assert!(cookie_pair(&response, "sb-code-verifier").is_some());
    assert_eq!(
        sessions.reset_requests(),
        vec![(
            "ada@example.com".to_string(),
            "http://localhost:3000/auth/callback?next=%2Fauth%2Freset-password".to_string()
        )]
    );
}

#[tokio::test]
async fn reset_password_updates_and_returns_to_the_dashboard() {
    let ada = user("ada@example.com");
    let sessions = MockSessionProvider::new().with_session("token-1", ada.clone());
    let (app, sessions) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .oneshot(post_form(
            "/auth/reset-password",
            "password=new-secret",
            Some("sb-access-token=token-1"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    assert_eq!(
        sessions.password_updates(),
        vec![(ada.id, "new-secret".to_string())]
    );
}

#[tokio::test]
async fn reset_password_rejects_short_passwords() {
    let sessions = MockSessionProvider::new().with_session("token-1", user("ada@example.com"));
    let (app, sessions) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .oneshot(post_form(
            "/auth/reset-password",
            "password=abc",
            Some("sb-access-token=token-1"),
        ))
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        "/auth/reset-password?error=Password%20must%20be%20at%20least%206%20characters"
    );
    assert!(sessions.password_updates().is_empty());
}

#[tokio::test]
async fn reset_password_requires_a_session() {
    let (app, sessions) = test_app(MockSessionProvider::new(), MockGatewayProbe::healthy());

    let response = app
        .oneshot(post_form("/auth/reset-password", "password=new-secret", None))
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        "/auth/login?redirectTo=/auth/reset-password"
    );
    assert!(sessions.password_updates().is_empty());
}

// --- Pages ---

#[tokio::test]
async fn home_page_explains_missing_credentials() {
    let probe = MockGatewayProbe {
        auth_reachable: false,
        status: GatewayStatus::NotConfigured,
    };
    let (app, _) = test_app(MockSessionProvider::new(), probe);

    let response = app.oneshot(get("/", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Supabase credentials not configured"));
    assert!(body.contains(r#"href="/auth/login""#));
}

#[tokio::test]
async fn home_page_greets_signed_in_visitors() {
    let sessions = MockSessionProvider::new().with_session("token-1", user("ada@example.com"));
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let response = app
        .oneshot(get("/", Some("sb-access-token=token-1")))
        .await
        .unwrap();

    let body = body_text(response).await;
    assert!(body.contains("Connected to Supabase"));
    assert!(body.contains("Signed in as ada@example.com."));
}

#[tokio::test]
async fn page_content_is_escaped() {
    let (app, _) = test_app(MockSessionProvider::new(), MockGatewayProbe::healthy());

    let response = app
        .oneshot(get("/auth/login?error=%3Cscript%3Ealert(1)%3C%2Fscript%3E", None))
        .await
        .unwrap();

    let body = body_text(response).await;
    assert!(!body.contains("<script>"));
    assert!(body.contains("&lt;script&gt;"));
}

#[tokio::test]
async fn legacy_signup_location_moves_permanently() {
    let (app, _) = test_app(MockSessionProvider::new(), MockGatewayProbe::healthy());

    let response = app.oneshot(get("/signup", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(location(&response), "/auth/signup");
}

// --- JSON API ---

#[tokio::test]
async fn health_reports_provider_reachability() {
    let (up, _) = test_app(MockSessionProvider::new(), MockGatewayProbe::healthy());
    let response = up.oneshot(get("/api/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["supabase"], "connected");
    assert!(body["timestamp"].is_string());

    let (down, _) = test_app(MockSessionProvider::new(), MockGatewayProbe::down());
    let response = down.oneshot(get("/api/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["supabase"], "disconnected");
}

#[tokio::test]
async fn status_answers_without_the_provider() {
    let (app, _) = test_app(MockSessionProvider::new_failing(), MockGatewayProbe::down());

    let response = app.oneshot(get("/api/status", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "API is working");
}

#[tokio::test]
async fn routes_endpoint_lists_the_table_in_order() {
    let (app, _) = test_app(MockSessionProvider::new(), MockGatewayProbe::healthy());

    let response = app.oneshot(get("/api/routes", None)).await.unwrap();

    let body = json(response).await;
    let routes = body.as_array().unwrap();
    assert_eq!(routes.len(), 9);
    assert_eq!(routes[0]["path"], "/");
    assert_eq!(routes[1]["path"], "/auth/login");
    assert_eq!(routes[1]["requiresGuest"], true);
    assert_eq!(routes[1]["redirectTo"], "/dashboard");
    let dashboard = routes.iter().find(|r| r["path"] == "/dashboard").unwrap();
    assert_eq!(dashboard["requiresAuth"], true);
    assert_eq!(dashboard["meta"]["title"], "Dashboard");
}

#[tokio::test]
async fn access_endpoint_mirrors_the_edge_guard() {
    let sessions = MockSessionProvider::new().with_session("token-1", user("ada@example.com"));
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let anonymous = app
        .clone()
        .oneshot(get("/api/access?path=%2Fdashboard", None))
        .await
        .unwrap();
    let body = json(anonymous).await;
    assert_eq!(body["allowed"], false);
    assert_eq!(body["location"], "/auth/login?redirectTo=/dashboard");

    let signed_in = app
        .clone()
        .oneshot(get(
            "/api/access?path=%2Fauth%2Flogin",
            Some("sb-access-token=token-1"),
        ))
        .await
        .unwrap();
    let body = json(signed_in).await;
    assert_eq!(body["allowed"], false);
    assert_eq!(body["location"], "/dashboard");

    let public = app
        .oneshot(get("/api/access?path=%2Fabout", None))
        .await
        .unwrap();
    let body = json(public).await;
    assert_eq!(body["allowed"], true);
    assert!(body["location"].is_null());
}

#[tokio::test]
async fn session_endpoint_requires_a_session() {
    let sessions = MockSessionProvider::new().with_session("token-1", user("ada@example.com"));
    let (app, _) = test_app(sessions, MockGatewayProbe::healthy());

    let anonymous = app.clone().oneshot(get("/api/session", None)).await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(anonymous).await["status"], "error");

    let signed_in = app
        .oneshot(get("/api/session", Some("sb-access-token=token-1")))
        .await
        .unwrap();
    assert_eq!(signed_in.status(), StatusCode::OK);
    assert_eq!(json(signed_in).await["user"]["email"], "ada@example.com");
}

#[tokio::test]
async fn deleting_the_session_signs_out() {
    let sessions = MockSessionProvider::new().with_session("token-1", user("ada@example.com"));
    let (app, sessions) = test_app(sessions, MockGatewayProbe::healthy());

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/session")
        .header("cookie", "sb-access-token=token-1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(sessions.signed_out_tokens(), vec!["token-1".to_string()]);
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("sb-access-token=;") && c.contains("Max-Age=0"))
    );
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _) = test_app(MockSessionProvider::new(), MockGatewayProbe::healthy());

    let response = app
        .oneshot(get("/api-docs/openapi.json", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert!(body["paths"]["/api/access"].is_object());
}
