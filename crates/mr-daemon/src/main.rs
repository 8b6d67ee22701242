//! mr-daemon entry point.
//!
//! Thin: loads configuration, connects the store, sets up tracing and
//! middleware, and starts the HTTP server. Handlers live in `routes.rs`;
//! shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use mr_config::{ConfigConsumer, LoadedConfig, UnusedKeyPolicy};
use mr_daemon::{routes, state};
use mr_db::PgStore;
use mr_store::DeliveryStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

/// Comma-separated YAML paths, base first.
const ENV_CONFIG: &str = "MR_CONFIG";
const ENV_DAEMON_ADDR: &str = "MR_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config()?;
    let report = mr_config::report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    if !report.is_clean() {
        warn!(unused = ?report.unused_leaf_pointers, "config has keys the daemon does not read");
    }
    let settings = loaded.settings()?;
    info!(
        config_hash = %loaded.config_hash,
        timezone = settings.calendar.timezone().name(),
        max_parallel_customers = settings.max_parallel_customers,
        tolerance = %settings.negative_balance_tolerance,
        "config loaded"
    );

    let pool = mr_db::connect_from_env().await?;
    mr_db::migrate(&pool).await?;
    let store: Arc<dyn DeliveryStore> = Arc::new(PgStore::new(pool));

    let bind_addr = bind_addr_from_env().unwrap_or_else(|| settings.bind_addr.clone());
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {bind_addr:?}"))?;

    let shared = Arc::new(state::AppState::new(Arc::clone(&store), settings));
    match store.latest_run().await {
        Ok(last) => *shared.last_run.write().await = last,
        Err(e) => warn!(error = %e, "could not read last generation run"),
    }

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    info!("mr-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_config() -> anyhow::Result<LoadedConfig> {
    match std::env::var(ENV_CONFIG) {
        Ok(raw) if !raw.trim().is_empty() => {
            let paths: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            mr_config::load_layered_yaml(&paths)
                .with_context(|| format!("failed to load {ENV_CONFIG}={raw}"))
        }
        _ => {
            info!("{ENV_CONFIG} not set; using default settings");
            mr_config::defaults()
        }
    }
}

fn bind_addr_from_env() -> Option<String> {
    std::env::var(ENV_DAEMON_ADDR).ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
