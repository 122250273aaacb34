//! Persistence store: where autosaved sections land.
//!
//! `PersistenceStore` is the seam the wizard writes through. `DocumentStore`
//! is the application-state object in front of it: it caches documents,
//! notifies subscribers on every accepted write, and writes through to a
//! backend (`PgResumeStore` in production).

pub mod document_store;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::resume::{ResumeDocument, SectionKey};

pub use document_store::DocumentStore;
pub use postgres::PgResumeStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resume {0} not found")]
    NotFound(Uuid),

    #[error("invalid value for section '{section}': {reason}")]
    InvalidSection { section: SectionKey, reason: String },

    #[error("stored document for resume {resume_id} is unreadable: {reason}")]
    Corrupt { resume_id: Uuid, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Worth retrying: the same write may succeed once the backend recovers.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Database(_) | StoreError::Unavailable(_))
    }
}

#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Fetches the current document.
    async fn load(&self, resume_id: Uuid) -> Result<ResumeDocument, StoreError>;

    /// Replaces one section of the document with `value`.
    async fn update_field(&self, resume_id: Uuid, section: SectionKey, value: Value) -> Result<(), StoreError>;
}

/// Notification published by `DocumentStore` after a write is accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    #[serde(rename_all = "camelCase")]
    SectionUpdated {
        resume_id: Uuid,
        section: SectionKey,
        value: Value,
    },
    #[serde(rename_all = "camelCase")]
    Deleted { resume_id: Uuid },
}

impl StoreEvent {
    pub fn resume_id(&self) -> Uuid {
        match self {
            StoreEvent::SectionUpdated { resume_id, .. } | StoreEvent::Deleted { resume_id } => *resume_id,
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::SectionUpdated { .. } => "section_updated",
            StoreEvent::Deleted { .. } => "deleted",
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_backend_failures_are_transient() {
        assert!(StoreError::Unavailable("down".to_string()).is_transient());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!StoreError::NotFound(Uuid::new_v4()).is_transient());
        assert!(!StoreError::InvalidSection {
            section: SectionKey::Summary,
            reason: "bad".to_string(),
        }
        .is_transient());
    }
}
