use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::resume::{ResumeRow, SectionKey};

const CREATE_RESUMES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS resumes (
        id          UUID PRIMARY KEY,
        user_id     UUID NOT NULL,
        title       TEXT NOT NULL,
        document    JSONB NOT NULL DEFAULT '{}'::jsonb,
        is_deleted  BOOLEAN NOT NULL DEFAULT FALSE,
        deleted_at  TIMESTAMPTZ,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const CREATE_USER_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_resumes_user_active
        ON resumes (user_id, updated_at DESC)
        WHERE is_deleted = FALSE
"#;

/// Creates the `resumes` table and its index if they do not exist.
pub async fn ensure_schema(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query(CREATE_RESUMES_TABLE).execute(pool).await?;
    sqlx::query(CREATE_USER_INDEX).execute(pool).await?;
    Ok(())
}

pub async fn insert_resume(
    pool: &PgPool,
    user_id: Uuid,
    title: &str,
    document: &Value,
) -> sqlx::Result<ResumeRow> {
    sqlx::query_as::<_, ResumeRow>(
        r#"
        INSERT INTO resumes (id, user_id, title, document)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(title)
    .bind(document)
    .fetch_one(pool)
    .await
}

/// Non-deleted resumes for a user, most recently edited first.
pub async fn list_resumes(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<ResumeRow>> {
    sqlx::query_as::<_, ResumeRow>(
        r#"
        SELECT * FROM resumes
        WHERE user_id = $1 AND is_deleted = FALSE
        ORDER BY updated_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn get_resume(pool: &PgPool, id: Uuid, user_id: Uuid) -> sqlx::Result<Option<ResumeRow>> {
    sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_document(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Value>> {
    sqlx::query_scalar("SELECT document FROM resumes WHERE id = $1 AND is_deleted = FALSE")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Replaces one top-level key of the stored document. Returns rows affected.
pub async fn update_section(
    pool: &PgPool,
    id: Uuid,
    section: SectionKey,
    value: &Value,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE resumes
        SET document = jsonb_set(document, ARRAY[$2::text], $3, true),
            updated_at = NOW()
        WHERE id = $1 AND is_deleted = FALSE
        "#,
    )
    .bind(id)
    .bind(section.as_str())
    .bind(value)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Soft delete: the row stays, flagged and timestamped. Returns false if
/// there was nothing to delete.
pub async fn soft_delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE resumes
        SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
