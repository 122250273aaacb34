use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeDocument, ResumeRow, SectionKey};
use crate::preview::{render_blocking, PreviewLayout};
use crate::resumes::repository;
use crate::state::AppState;
use crate::store::PersistenceStore;

const DEFAULT_TITLE: &str = "Untitled Resume";

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct CreateResumeRequest {
    pub user_id: Uuid,
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct SectionResponse {
    pub section: SectionKey,
    pub value: Value,
}

async fn require_resume(state: &AppState, id: Uuid, user_id: Uuid) -> Result<ResumeRow, AppError> {
    repository::get_resume(&state.db, id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// POST /api/v1/resumes
pub async fn handle_create_resume(
    State(state): State<AppState>,
    Json(req): Json<CreateResumeRequest>,
) -> Result<(StatusCode, Json<ResumeRow>), AppError> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE);
    if title.chars().count() > 200 {
        return Err(AppError::Validation("title must be at most 200 characters".to_string()));
    }

    let document = ResumeDocument::default();
    let value = serde_json::to_value(&document).map_err(anyhow::Error::from)?;
    let row = repository::insert_resume(&state.db, req.user_id, title, &value).await?;
    state.documents.insert(row.id, document).await;

    info!(resume_id = %row.id, user_id = %req.user_id, "Resume created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    Ok(Json(repository::list_resumes(&state.db, params.user_id).await?))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ResumeRow>, AppError> {
    Ok(Json(require_resume(&state, id, params.user_id).await?))
}

/// PATCH /api/v1/resumes/:id/sections/:section
/// Direct `updateField(section, value)` against the store, outside a wizard session.
pub async fn handle_update_section(
    State(state): State<AppState>,
    Path((id, section)): Path<(Uuid, String)>,
    Query(params): Query<UserIdQuery>,
    Json(value): Json<Value>,
) -> Result<Json<SectionResponse>, AppError> {
    let section: SectionKey = section.parse().map_err(AppError::Validation)?;
    require_resume(&state, id, params.user_id).await?;

    state.documents.update_field(id, section, value).await?;
    let value = state.documents.get(id).await?.section_value(section);
    Ok(Json(SectionResponse { section, value }))
}

/// DELETE /api/v1/resumes/:id
/// Soft delete. Open wizard sessions on the resume are closed first so no
/// pending autosave lands on a deleted row.
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    require_resume(&state, id, params.user_id).await?;

    let closed = state.sessions.close_for_resume(id).await;
    if !repository::soft_delete(&state.db, id, params.user_id).await? {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    }
    state.documents.evict(id).await;

    info!(resume_id = %id, sessions_closed = closed, "Resume soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/resumes/:id/preview
pub async fn handle_resume_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<PreviewLayout>, AppError> {
    require_resume(&state, id, params.user_id).await?;
    let document = state.documents.get(id).await?;
    Ok(Json(render_blocking(document, state.config.preview()).await?))
}

/// GET /api/v1/resumes/:id/events
/// Server-sent events for every accepted write to this resume. Only the
/// owner may subscribe.
pub async fn handle_resume_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    require_resume(&state, id, params.user_id).await?;
    let rx = state.documents.subscribe();
    let events = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.resume_id() == id => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    let sse = Event::default().event(event.name()).data(data);
                    return Some((Ok(sse), rx));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(resume_id = %id, skipped, "SSE subscriber lagged; events skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
