use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

/// Where unauthenticated visitors of a protected route are sent by default.
pub const LOGIN_PATH: &str = "/auth/login";
/// Where signed-in visitors of a guest-only route are sent by default.
pub const DASHBOARD_PATH: &str = "/dashboard";
/// Query parameter carrying the originally requested location on the login redirect.
pub const REDIRECT_QUERY_KEY: &str = "redirectTo";

/// RouteMeta
///
/// Display metadata attached to a route. Used by page rendering (document titles)
/// and exposed through `/api/routes` so a front-end can build navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RouteMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Reserved for role-based access. The resolver does not read it.
    pub roles: Vec<String>,
}

/// RouteDescriptor
///
/// The access requirements of a single path.
///
/// A descriptor must never be both `requires_auth` and `requires_guest`;
/// `RouteTable::new` rejects such a table at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteDescriptor {
    pub path: String,
    pub label: String,
    pub requires_auth: bool,
    pub requires_guest: bool,
    /// Redirect target used when access is denied. Falls back to the table's
    /// login or dashboard path when unset.
    pub redirect_to: Option<String>,
    pub meta: RouteMeta,
}

impl RouteDescriptor {
    /// A route with no access requirements.
    pub fn public(path: &str, label: &str) -> Self {
        Self {
            path: path.to_string(),
            label: label.to_string(),
            requires_auth: false,
            requires_guest: false,
            redirect_to: None,
            meta: RouteMeta::default(),
        }
    }

    /// A route only reachable with an authenticated session.
    pub fn protected(path: &str, label: &str) -> Self {
        Self {
            requires_auth: true,
            ..Self::public(path, label)
        }
    }

    /// A route only reachable without a session (login, signup).
    pub fn guest_only(path: &str, label: &str) -> Self {
        Self {
            requires_guest: true,
            ..Self::public(path, label)
        }
    }

    pub fn fallback(mut self, path: &str) -> Self {
        self.redirect_to = Some(path.to_string());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.meta.title = Some(title.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.meta.description = Some(description.to_string());
        self
    }
}

/// AccessDecision
///
/// The outcome of resolving a request against the route table. Borrowed from
/// the table, so producing one never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision<'a> {
    Allow,
    RedirectTo(&'a str),
}

impl AccessDecision<'_> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// RouteTableError
///
/// Configuration errors detected while building a `RouteTable`. Any of these
/// is fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route {0} cannot require both an authenticated session and a guest visitor")]
    ConflictingAccess(String),
    #[error("route {0} is configured more than once")]
    DuplicatePath(String),
    #[error("route path or fallback {0:?} must start with '/'")]
    InvalidPath(String),
}

/// RouteTable
///
/// The immutable mapping from path to access requirements. Built once in `main`
/// and shared through `AppState`; every enforcement point (the edge guard and the
/// page-level `AuthUser` extractor) asks this table for its decision.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
    index: HashMap<String, usize>,
    login_path: String,
    dashboard_path: String,
}

/// RouteTableState
///
/// The shared handle stored in the application state.
pub type RouteTableState = Arc<RouteTable>;

impl RouteTable {
    /// new
    ///
    /// Validates and indexes the given descriptors. Order is preserved for
    /// iteration so UI listings come out in configuration order.
    pub fn new(routes: Vec<RouteDescriptor>) -> Result<Self, RouteTableError> {
        let mut index = HashMap::with_capacity(routes.len());

        for (position, route) in routes.iter().enumerate() {
            if !route.path.starts_with('/') {
                return Err(RouteTableError::InvalidPath(route.path.clone()));
            }
            if let Some(fallback) = &route.redirect_to {
                if !fallback.starts_with('/') {
                    return Err(RouteTableError::InvalidPath(fallback.clone()));
                }
            }
            if route.requires_auth && route.requires_guest {
                return Err(RouteTableError::ConflictingAccess(route.path.clone()));
            }
            if index.insert(route.path.clone(), position).is_some() {
                return Err(RouteTableError::DuplicatePath(route.path.clone()));
            }
        }

        Ok(Self {
            routes,
            index,
            login_path: LOGIN_PATH.to_string(),
            dashboard_path: DASHBOARD_PATH.to_string(),
        })
    }

    /// standard
    ///
    /// The route table served by this application.
    pub fn standard() -> Result<Self, RouteTableError> {
        Self::new(vec![
            RouteDescriptor::public("/", "Home")
                .title("SupaNext - Home")
                .description("Rust + Supabase starter"),
            RouteDescriptor::guest_only(LOGIN_PATH, "Sign In")
                .fallback(DASHBOARD_PATH)
                .title("Sign In")
                .description("Sign in to your account"),
            RouteDescriptor::guest_only("/auth/signup", "Sign Up")
                .fallback(DASHBOARD_PATH)
                .title("Create Account")
                .description("Create a new account"),
            RouteDescriptor::public("/auth/forgot-password", "Forgot Password")
                .title("Reset Password")
                .description("Reset your password"),
            RouteDescriptor::protected(DASHBOARD_PATH, "Dashboard")
                .fallback(LOGIN_PATH)
                .title("Dashboard")
                .description("User dashboard"),
            RouteDescriptor::public("/auth/callback", "Auth Callback").title("Authenticating..."),
            RouteDescriptor::protected("/auth/reset-password", "Reset Password")
                .fallback(LOGIN_PATH)
                .title("Reset Password")
                .description("Set your new password"),
            RouteDescriptor::public("/api/health", "Health Check"),
            RouteDescriptor::public("/api/status", "API Status"),
        ])
    }

    /// Exact-match lookup; prefix matching is not supported.
    pub fn get(&self, path: &str) -> Option<&RouteDescriptor> {
        self.index.get(path).map(|&position| &self.routes[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.routes.iter()
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }

    pub fn requires_auth(&self, path: &str) -> bool {
        self.get(path).is_some_and(|route| route.requires_auth)
    }

    pub fn requires_guest(&self, path: &str) -> bool {
        self.get(path).is_some_and(|route| route.requires_guest)
    }

    pub fn protected_routes(&self) -> Vec<&str> {
        self.routes
            .iter()
            .filter(|route| route.requires_auth)
            .map(|route| route.path.as_str())
            .collect()
    }

    /// Every configured route that does not require a session, guest-only ones included.
    pub fn public_routes(&self) -> Vec<&str> {
        self.routes
            .iter()
            .filter(|route| !route.requires_auth)
            .map(|route| route.path.as_str())
            .collect()
    }

    /// resolve_access
    ///
    /// Decides whether a request for `path` may proceed given the caller's
    /// already-resolved authentication state.
    ///
    /// - Unknown paths are public.
    /// - Protected routes redirect anonymous visitors to the route fallback or the login path.
    /// - Guest-only routes redirect signed-in visitors to the route fallback or the dashboard.
    ///
    /// If a descriptor somehow carries both flags, the authentication requirement wins.
    pub fn resolve_access(&self, path: &str, is_authenticated: bool) -> AccessDecision<'_> {
        let Some(route) = self.get(path) else {
            return AccessDecision::Allow;
        };

        if route.requires_auth {
            if is_authenticated {
                return AccessDecision::Allow;
            }
            return AccessDecision::RedirectTo(
                route.redirect_to.as_deref().unwrap_or(&self.login_path),
            );
        }

        if route.requires_guest && is_authenticated {
            return AccessDecision::RedirectTo(
                route.redirect_to.as_deref().unwrap_or(&self.dashboard_path),
            );
        }

        AccessDecision::Allow
    }

    /// redirect_location
    ///
    /// Applies the redirect convention on top of `resolve_access`: when an
    /// anonymous visitor is sent to the login page, the original location
    /// (path plus query string) travels along as `redirectTo`.
    pub fn redirect_location(
        &self,
        path: &str,
        query: Option<&str>,
        is_authenticated: bool,
    ) -> Option<String> {
        match self.resolve_access(path, is_authenticated) {
            AccessDecision::Allow => None,
            AccessDecision::RedirectTo(target) if !is_authenticated && target == self.login_path => {
                Some(self.login_redirect(path, query))
            }
            AccessDecision::RedirectTo(target) => Some(target.to_string()),
        }
    }

    /// The login location that sends the visitor back to `path?query` afterwards.
    pub fn login_redirect(&self, path: &str, query: Option<&str>) -> String {
        let origin = match query.filter(|q| !q.is_empty()) {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        format!(
            "{}?{}={}",
            self.login_path,
            REDIRECT_QUERY_KEY,
            encode_return_path(&origin)
        )
    }

    /// safe_return_path
    ///
    /// Validates a `redirectTo` value read back after authentication. Only
    /// same-origin absolute paths are accepted; anything else (missing, a full URL,
    /// a protocol-relative `//host` form) lands on the dashboard.
    ///
    /// Browsers drop tabs and newlines while parsing a `Location`, so `/\t/host`
    /// would become `//host`; control characters and whitespace are refused.
    pub fn safe_return_path<'a>(&'a self, candidate: Option<&'a str>) -> &'a str {
        match candidate {
            Some(path) if is_local_path(path) => path,
            _ => self.dashboard_path.as_str(),
        }
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path
            .chars()
            .any(|c| c == '\\' || c.is_ascii_control() || c.is_whitespace())
}

/// Percent-encodes a return location for use as a query value, leaving `/` readable.
fn encode_return_path(location: &str) -> String {
    urlencoding::encode(location).replace("%2F", "/")
}
