use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::errors::{AppError, WizardError};
use crate::models::resume::{Customization, SectionKey};
use crate::preview::{render_blocking, PreviewLayout};
use crate::resumes::repository;
use crate::state::AppState;
use crate::store::PersistenceStore;
use crate::wizard::navigator::Step;
use crate::wizard::quality::{document_quality, DocumentQuality};
use crate::wizard::session::{FieldOutcome, NextOutcome, SessionView, WizardSession};

#[derive(Deserialize)]
pub struct StartSessionRequest {
    pub user_id: Uuid,
    pub resume_id: Uuid,
}

#[derive(Deserialize)]
pub struct FieldChangeRequest {
    pub field: String,
    #[serde(default)]
    pub value: Value,
    pub entry: Option<usize>,
    pub step: Option<Step>,
}

#[derive(Deserialize)]
pub struct FieldBlurRequest {
    pub field: String,
    pub entry: Option<usize>,
    pub step: Option<Step>,
}

/// A step by camelCase key or 1-based number.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum StepRef {
    Number(u8),
    Key(String),
}

impl StepRef {
    fn resolve(self) -> Result<Step, WizardError> {
        match self {
            StepRef::Number(n) => Step::from_number(n).ok_or_else(|| WizardError::UnknownStep(n.to_string())),
            StepRef::Key(key) => key.parse(),
        }
    }
}

#[derive(Deserialize)]
pub struct JumpRequest {
    pub step: StepRef,
}

#[derive(Deserialize)]
pub struct VisibilityRequest {
    pub section: SectionKey,
    pub visible: bool,
}

#[derive(Deserialize)]
pub struct OrderRequest {
    pub order: Vec<SectionKey>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    pub step: Step,
    pub step_number: u8,
}

impl From<Step> for StepResponse {
    fn from(step: Step) -> Self {
        Self {
            step,
            step_number: step.number(),
        }
    }
}

#[derive(Serialize)]
pub struct EntryResponse {
    pub index: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub section_order: Vec<SectionKey>,
}

async fn with_session<R>(
    state: &AppState,
    session_id: Uuid,
    f: impl FnOnce(&mut WizardSession) -> R,
) -> Result<R, AppError> {
    state
        .sessions
        .with(session_id, f)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Wizard session {session_id} not found")))
}

/// POST /api/v1/wizard
pub async fn handle_start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    repository::get_resume(&state.db, req.resume_id, req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {} not found", req.resume_id)))?;

    let document = state.documents.get(req.resume_id).await?;
    let store: Arc<dyn PersistenceStore> = state.documents.clone();
    let session = WizardSession::start(
        req.resume_id,
        req.user_id,
        document,
        store,
        state.config.autosave(),
    );
    let view = session.view();
    let session_id = state.sessions.insert(session).await;
    let active_sessions = state.sessions.len().await;
    info!(
        session_id = %session_id,
        resume_id = %req.resume_id,
        active_sessions,
        "Wizard session started"
    );
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/wizard/:sid
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(with_session(&state, sid, |s| s.view()).await?))
}

/// DELETE /api/v1/wizard/:sid
pub async fn handle_close_session(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.sessions.close(sid).await {
        return Err(AppError::NotFound(format!("Wizard session {sid} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/wizard/:sid/fields
pub async fn handle_change_field(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
    Json(req): Json<FieldChangeRequest>,
) -> Result<Json<FieldOutcome>, AppError> {
    let outcome = with_session(&state, sid, |s| {
        s.change_field(req.step, req.entry, &req.field, &req.value)
    })
    .await??;
    Ok(Json(outcome))
}

/// POST /api/v1/wizard/:sid/blur
pub async fn handle_blur_field(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
    Json(req): Json<FieldBlurRequest>,
) -> Result<Json<FieldOutcome>, AppError> {
    let outcome = with_session(&state, sid, |s| s.blur_field(req.step, req.entry, &req.field)).await??;
    Ok(Json(outcome))
}

/// POST /api/v1/wizard/:sid/entries
pub async fn handle_add_entry(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> Result<(StatusCode, Json<EntryResponse>), AppError> {
    let index = with_session(&state, sid, |s| s.add_entry()).await??;
    Ok((StatusCode::CREATED, Json(EntryResponse { index })))
}

/// DELETE /api/v1/wizard/:sid/entries/:index
pub async fn handle_remove_entry(
    State(state): State<AppState>,
    Path((sid, index)): Path<(Uuid, usize)>,
) -> Result<StatusCode, AppError> {
    with_session(&state, sid, |s| s.remove_entry(index)).await??;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/wizard/:sid/next
pub async fn handle_next(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> Result<Json<NextOutcome>, AppError> {
    Ok(Json(with_session(&state, sid, |s| s.next()).await?))
}

/// POST /api/v1/wizard/:sid/back
pub async fn handle_back(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> Result<Json<StepResponse>, AppError> {
    let step = with_session(&state, sid, |s| s.back()).await?;
    Ok(Json(step.into()))
}

/// POST /api/v1/wizard/:sid/jump
pub async fn handle_jump(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
    Json(req): Json<JumpRequest>,
) -> Result<Json<StepResponse>, AppError> {
    let target = req.step.resolve()?;
    let step = with_session(&state, sid, |s| s.jump_to(target)).await??;
    Ok(Json(step.into()))
}

/// PUT /api/v1/wizard/:sid/visibility
pub async fn handle_set_visibility(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
    Json(req): Json<VisibilityRequest>,
) -> Result<StatusCode, AppError> {
    with_session(&state, sid, |s| s.set_visibility(req.section, req.visible)).await??;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/wizard/:sid/order
pub async fn handle_set_order(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let section_order = with_session(&state, sid, |s| s.set_order(req.order).to_vec()).await?;
    Ok(Json(OrderResponse { section_order }))
}

/// PUT /api/v1/wizard/:sid/customization
pub async fn handle_set_customization(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
    Json(customization): Json<Customization>,
) -> Result<StatusCode, AppError> {
    with_session(&state, sid, |s| s.set_customization(customization)).await??;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/wizard/:sid/preview
/// Renders the merged session document, including edits not yet saved.
pub async fn handle_session_preview(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> Result<Json<PreviewLayout>, AppError> {
    let document = with_session(&state, sid, |s| s.document().clone()).await?;
    Ok(Json(render_blocking(document, state.config.preview()).await?))
}

/// GET /api/v1/wizard/:sid/quality
pub async fn handle_session_quality(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> Result<Json<DocumentQuality>, AppError> {
    let report = with_session(&state, sid, |s| document_quality(s.document())).await?;
    Ok(Json(report))
}
