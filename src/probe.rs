use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;

use crate::config::AppConfig;

/// GatewayStatus
///
/// Outcome of probing the hosted REST gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Connected,
    /// The project URL or service key is still the shipped placeholder.
    NotConfigured,
    Unreachable,
    InvalidCredentials,
}

impl GatewayStatus {
    /// Operator-facing explanation shown on the home page.
    pub fn explain(self, supabase_url: &str) -> Option<String> {
        match self {
            GatewayStatus::Connected => None,
            GatewayStatus::NotConfigured => Some(
                "Supabase credentials not configured. Set SUPABASE_URL and \
                 SUPABASE_SERVICE_ROLE_KEY in your .env file."
                    .to_string(),
            ),
            GatewayStatus::Unreachable => Some(format!(
                "Cannot reach Supabase at {supabase_url}. Check SUPABASE_URL."
            )),
            GatewayStatus::InvalidCredentials => Some(
                "Supabase connection failed: invalid API key. Check SUPABASE_SERVICE_ROLE_KEY."
                    .to_string(),
            ),
        }
    }
}

/// GatewayProbe
///
/// Liveness probes against the hosted platform. Probes never fail: every
/// outcome, network errors included, is mapped to a status.
#[async_trait]
pub trait GatewayProbe: Send + Sync {
    /// True when the auth service answered at all.
    async fn auth_reachable(&self) -> bool;

    async fn gateway_status(&self) -> GatewayStatus;
}

/// ProbeState
///
/// The concrete type used to share the probe across the application state.
pub type ProbeState = Arc<dyn GatewayProbe>;

/// SupabaseGateway
///
/// Probes `{SUPABASE_URL}/auth/v1/health` and `{SUPABASE_URL}/rest/v1` with the
/// service role key.
#[derive(Clone)]
pub struct SupabaseGateway {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    configured: bool,
}

impl SupabaseGateway {
    pub fn new(client: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            client,
            base_url: config.supabase_url.clone(),
            service_key: config.service_role_key.clone(),
            configured: !config.supabase_is_placeholder(),
        }
    }
}

#[async_trait]
impl GatewayProbe for SupabaseGateway {
    async fn auth_reachable(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/auth/v1/health", self.base_url))
            .header("apikey", &self.service_key)
            .send()
            .await;

        // Any HTTP answer, 401 included, proves the auth service is up.
        match result {
            Ok(response) => {
                tracing::debug!(status = %response.status(), "auth health probe answered");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "auth health probe failed");
                false
            }
        }
    }

    async fn gateway_status(&self) -> GatewayStatus {
        if !self.configured {
            return GatewayStatus::NotConfigured;
        }

        // Probing a table that does not exist: a 404 still proves the gateway answered.
        let result = self
            .client
            .get(format!("{}/rest/v1/_connection_test_", self.base_url))
            .query(&[("select", "*"), ("limit", "1")])
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await;

        match result {
            Ok(response) => classify_gateway_response(response.status()),
            Err(e) => {
                tracing::warn!(error = %e, "rest gateway probe failed");
                GatewayStatus::Unreachable
            }
        }
    }
}

/// Maps the HTTP status of the REST probe to a gateway status.
pub fn classify_gateway_response(status: StatusCode) -> GatewayStatus {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayStatus::InvalidCredentials,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            GatewayStatus::Unreachable
        }
        _ => GatewayStatus::Connected,
    }
}

/// MockGatewayProbe
///
/// Fixed answers for tests.
#[derive(Clone)]
pub struct MockGatewayProbe {
    pub auth_reachable: bool,
    pub status: GatewayStatus,
}

impl MockGatewayProbe {
    pub fn healthy() -> Self {
        Self {
            auth_reachable: true,
            status: GatewayStatus::Connected,
        }
    }

    pub fn down() -> Self {
        Self {
            auth_reachable: false,
            status: GatewayStatus::Unreachable,
        }
    }
}

#[async_trait]
impl GatewayProbe for MockGatewayProbe {
    async fn auth_reachable(&self) -> bool {
        self.auth_reachable
    }

    async fn gateway_status(&self) -> GatewayStatus {
        self.status
    }
}
