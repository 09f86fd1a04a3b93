use std::env;

/// URL used when no Supabase project is configured (the local docker stack).
pub const LOCAL_SUPABASE_URL: &str = "http://localhost:8000";
/// Placeholder shipped in `.env.example`; treated as "not configured".
pub const PLACEHOLDER_SERVICE_KEY: &str = "your-service-role-key";

const LOCAL_JWT_SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters-long";
const LOCAL_SITE_URL: &str = "http://localhost:3000";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared through `AppState`; never mutated afterwards.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects log format and secret handling.
    pub env: Env,
    // Base URL of the Supabase project (auth under /auth/v1, REST under /rest/v1).
    pub supabase_url: String,
    // Public anon key, sent as `apikey` on every auth call.
    pub anon_key: String,
    // Service role key, only used by the liveness probes.
    pub service_role_key: String,
    // Shared secret used to verify Supabase-issued access tokens (HS256).
    pub jwt_secret: String,
    // Public origin of this site; email links point back here.
    pub site_url: String,
    pub bind_addr: String,
    // Whether session cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
}

/// Env
///
/// Defines the runtime context.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Non-panicking configuration for tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            supabase_url: LOCAL_SUPABASE_URL.to_string(),
            anon_key: "anon-key".to_string(),
            service_role_key: PLACEHOLDER_SERVICE_KEY.to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            site_url: LOCAL_SITE_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cookie_secure: false,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// In production, panics when any Supabase credential is missing so the service
    /// never starts half-configured. Local runs fall back to the local docker stack.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let site_url = env::var("SITE_URL").unwrap_or_else(|_| LOCAL_SITE_URL.to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                supabase_url: trim_url(
                    env::var("SUPABASE_URL").unwrap_or_else(|_| LOCAL_SUPABASE_URL.to_string()),
                ),
                anon_key: env::var("SUPABASE_ANON_KEY").unwrap_or_default(),
                service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                    .unwrap_or_else(|_| PLACEHOLDER_SERVICE_KEY.to_string()),
                jwt_secret: env::var("SUPABASE_JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
                site_url,
                bind_addr,
            },
            Env::Production => Self {
                env: Env::Production,
                supabase_url: trim_url(
                    env::var("SUPABASE_URL").expect("FATAL: SUPABASE_URL required in prod"),
                ),
                anon_key: env::var("SUPABASE_ANON_KEY")
                    .expect("FATAL: SUPABASE_ANON_KEY required in prod"),
                service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                    .expect("FATAL: SUPABASE_SERVICE_ROLE_KEY required in prod"),
                jwt_secret: env::var("SUPABASE_JWT_SECRET")
                    .expect("FATAL: SUPABASE_JWT_SECRET must be set in production."),
                cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(true),
                site_url,
                bind_addr,
            },
        }
    }

    /// True when the Supabase settings are still the shipped defaults.
    pub fn supabase_is_placeholder(&self) -> bool {
        self.supabase_url.is_empty()
            || self.supabase_url == LOCAL_SUPABASE_URL
            || self.service_role_key.is_empty()
            || self.service_role_key == PLACEHOLDER_SERVICE_KEY
    }
}

/// Parses common boolean spellings; anything else counts as unset.
pub fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
