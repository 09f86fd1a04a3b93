use std::{sync::Arc, time::Duration};
use supanext::{
    AppState, RouteTable,
    config::{AppConfig, Env},
    create_router,
    probe::{ProbeState, SupabaseGateway},
    session::{SessionProviderState, SupabaseAuth},
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Timeout for every call to the hosted platform.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// main
///
/// Loads configuration, sets up logging, builds the route table and the
/// Supabase clients, then serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast in production).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "supanext=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Route table. An invalid table is a configuration error; refuse to start.
    let routes = RouteTable::standard()
        .unwrap_or_else(|e| panic!("FATAL: invalid route table: {e}"));
    tracing::info!(
        protected = ?routes.protected_routes(),
        "route table loaded"
    );

    // 4. Supabase clients share one connection pool.
    let http = reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .expect("FATAL: failed to build HTTP client");

    if config.supabase_is_placeholder() {
        tracing::warn!(
            url = %config.supabase_url,
            "Supabase credentials look unconfigured; sign-in will not work"
        );
    }

    let sessions = Arc::new(SupabaseAuth::new(http.clone(), &config)) as SessionProviderState;
    let probe = Arc::new(SupabaseGateway::new(http, &config)) as ProbeState;

    // 5. Unified state and server startup.
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        routes: Arc::new(routes),
        sessions,
        probe,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: cannot bind {bind_addr}: {e}"));

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated");
}
