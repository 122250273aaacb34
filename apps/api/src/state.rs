use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::store::DocumentStore;
use crate::wizard::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Cached documents with subscribe/notify, writing through to Postgres.
    pub documents: Arc<DocumentStore>,
    /// Live wizard sessions. Dropping one cancels its pending autosaves.
    pub sessions: Arc<SessionRegistry>,
}
