use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{PersistenceStore, StoreError};
use crate::models::resume::{ResumeDocument, SectionKey};
use crate::resumes::repository;

/// Backend over the `resumes` table. Each section write touches only its own
/// key inside the JSONB document.
#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistenceStore for PgResumeStore {
    async fn load(&self, resume_id: Uuid) -> Result<ResumeDocument, StoreError> {
        let value = repository::get_document(&self.pool, resume_id)
            .await?
            .ok_or(StoreError::NotFound(resume_id))?;
        ResumeDocument::from_value(value).map_err(|e| StoreError::Corrupt {
            resume_id,
            reason: e.to_string(),
        })
    }

    async fn update_field(&self, resume_id: Uuid, section: SectionKey, value: Value) -> Result<(), StoreError> {
        let updated = repository::update_section(&self.pool, resume_id, section, &value).await?;
        if updated == 0 {
            return Err(StoreError::NotFound(resume_id));
        }
        Ok(())
    }
}
