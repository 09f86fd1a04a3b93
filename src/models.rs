use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::session::SessionUser;

// --- Form payloads (application/x-www-form-urlencoded) ---

/// Sign-in and sign-up form.
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
    /// Carried through from the login page so the visitor returns where they started.
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailForm {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub password: String,
}

// --- Query strings ---

/// PageQuery
///
/// Query parameters understood by the auth pages: the return location and the
/// outcome of the previous form submission.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Parameters appended by the auth provider when it sends the browser back.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub next: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AccessQuery {
    /// Path to check, optionally with a query string.
    pub path: String,
}

// --- API responses ---

/// HealthResponse
///
/// Result of `GET /api/health`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// `connected` or `disconnected`.
    pub supabase: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// AccessResponse
///
/// Lets client-side code ask the server for the same decision the edge guard
/// would make before navigating.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessResponse {
    pub path: String,
    pub allowed: bool,
    /// Where the visitor would be sent instead; absent when allowed.
    pub location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub user: SessionUser,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}
