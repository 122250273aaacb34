mod config;
mod db;
mod errors;
mod models;
mod preview;
mod resumes;
mod routes;
mod state;
mod store;
mod wizard;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{DocumentStore, PgResumeStore};
use crate::wizard::session::spawn_idle_sweep;
use crate::wizard::SessionRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResumeLetter API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Document store: cache + subscribe/notify, writing through to Postgres
    let documents = Arc::new(DocumentStore::new(Arc::new(PgResumeStore::new(db.clone()))));

    let autosave = config.autosave();
    info!(
        "Autosave: debounce {}ms, indicator {}ms, {} attempts",
        autosave.debounce.as_millis(),
        autosave.indicator.as_millis(),
        autosave.max_attempts
    );
    let preview = config.preview();
    info!(
        "Preview font range: {}pt down to {}pt",
        preview.base_font_pt, preview.min_font_pt
    );

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        documents,
        sessions: Arc::new(SessionRegistry::new()),
    };

    // Abandoned tabs never send DELETE; reclaim their sessions and documents
    spawn_idle_sweep(
        state.sessions.clone(),
        state.documents.clone(),
        config.session_idle_ttl(),
        config.idle_sweep_interval(),
    );
    info!(
        "Idle sweep: sessions idle for {}s are closed, checked every {}s",
        config.session_idle_ttl_secs,
        config.idle_sweep_interval().as_secs()
    );

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
