pub mod health;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::errors::AppError;
use crate::resumes::handlers as resumes;
use crate::state::AppState;
use crate::wizard::handlers as wizard;

async fn not_implemented() -> Result<(), AppError> {
    Err(AppError::NotImplemented)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume API
        .route(
            "/api/v1/resumes",
            post(resumes::handle_create_resume).get(resumes::handle_list_resumes),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resumes::handle_get_resume).delete(resumes::handle_delete_resume),
        )
        .route(
            "/api/v1/resumes/:id/sections/:section",
            patch(resumes::handle_update_section),
        )
        .route("/api/v1/resumes/:id/preview", get(resumes::handle_resume_preview))
        .route("/api/v1/resumes/:id/events", get(resumes::handle_resume_events))
        // Export is handled by a separate collaborator
        .route("/api/v1/resumes/:id/export", post(not_implemented))
        // Wizard API
        .route("/api/v1/wizard", post(wizard::handle_start_session))
        .route(
            "/api/v1/wizard/:sid",
            get(wizard::handle_get_session).delete(wizard::handle_close_session),
        )
        .route("/api/v1/wizard/:sid/fields", patch(wizard::handle_change_field))
        .route("/api/v1/wizard/:sid/blur", post(wizard::handle_blur_field))
        .route("/api/v1/wizard/:sid/entries", post(wizard::handle_add_entry))
        .route(
            "/api/v1/wizard/:sid/entries/:index",
            delete(wizard::handle_remove_entry),
        )
        .route("/api/v1/wizard/:sid/next", post(wizard::handle_next))
        .route("/api/v1/wizard/:sid/back", post(wizard::handle_back))
        .route("/api/v1/wizard/:sid/jump", post(wizard::handle_jump))
        .route("/api/v1/wizard/:sid/visibility", put(wizard::handle_set_visibility))
        .route("/api/v1/wizard/:sid/order", put(wizard::handle_set_order))
        .route(
            "/api/v1/wizard/:sid/customization",
            put(wizard::handle_set_customization),
        )
        .route("/api/v1/wizard/:sid/preview", get(wizard::handle_session_preview))
        .route("/api/v1/wizard/:sid/quality", get(wizard::handle_session_quality))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::config::Config;
    use crate::models::resume::{ResumeDocument, SectionKey};
    use crate::store::testing::RecordingStore;
    use crate::store::{DocumentStore, PgResumeStore, PersistenceStore};
    use crate::wizard::autosave::AutosaveConfig;
    use crate::wizard::session::WizardSession;
    use crate::wizard::SessionRegistry;

    /// State over a pool that never connects; only routes that stay off the
    /// database are exercised here.
    fn test_state() -> AppState {
        let db = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/resumeletter_test")
            .expect("lazy pool");
        let config = Config {
            database_url: "postgres://localhost/resumeletter_test".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            autosave_debounce_ms: 500,
            autosave_indicator_ms: 1500,
            autosave_max_attempts: 3,
            autosave_retry_backoff_ms: 1000,
            preview_base_font_pt: 11.0,
            preview_min_font_pt: 8.0,
            session_idle_ttl_secs: 1800,
            idle_sweep_interval_secs: 60,
        };
        AppState {
            documents: Arc::new(DocumentStore::new(Arc::new(PgResumeStore::new(db.clone())))),
            sessions: Arc::new(SessionRegistry::new()),
            db,
            config,
        }
    }

    async fn send(method: &str, uri: &str, body: Body) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        build_router(test_state())
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    /// Test state whose documents write to memory, with one wizard session
    /// already open on a fresh resume.
    async fn state_with_session() -> (AppState, Uuid, Arc<RecordingStore>) {
        let backend = Arc::new(RecordingStore::default());
        let mut state = test_state();
        state.documents = Arc::new(DocumentStore::new(backend.clone()));

        let store: Arc<dyn PersistenceStore> = state.documents.clone();
        let session = WizardSession::start(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ResumeDocument::default(),
            store,
            AutosaveConfig::default(),
        );
        let sid = state.sessions.insert(session).await;
        (state, sid, backend)
    }

    async fn call(state: &AppState, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test(start_paused = true)]
    async fn test_wizard_flow_over_http() {
        let (state, sid, backend) = state_with_session().await;
        let fields = format!("/api/v1/wizard/{sid}/fields");

        let (status, body) = call(&state, "PATCH", &fields, json!({ "field": "email", "value": "bad" })).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["error"].is_string());
        assert_eq!(body["stepValid"], json!(false));

        let (status, body) = call(&state, "POST", &format!("/api/v1/wizard/{sid}/next"), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["advanced"], json!(false));
        assert!(!body["issues"].as_array().unwrap().is_empty());

        for (field, value) in [
            ("fullName", "<b>Jane</b> Doe"),
            ("jobTitle", "Engineer"),
            ("email", "jane@x.com"),
            ("phone", "+1 234 567 8900"),
        ] {
            let (status, body) = call(&state, "PATCH", &fields, json!({ "field": field, "value": value })).await;
            assert_eq!(status, StatusCode::OK, "{field}");
            assert_eq!(body["error"], Value::Null, "{field}");
        }

        let (_, body) = call(&state, "POST", &format!("/api/v1/wizard/{sid}/next"), Value::Null).await;
        assert_eq!(body["advanced"], json!(true));
        assert_eq!(body["step"], json!("summary"));

        let (status, body) = call(&state, "GET", &format!("/api/v1/wizard/{sid}"), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentStep"], json!("summary"));
        assert_eq!(body["stepNumber"], json!(2));

        let (status, body) = call(&state, "GET", &format!("/api/v1/wizard/{sid}/preview"), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body["pages"].as_array().unwrap().is_empty());
        assert!(!body.to_string().contains("<b>"));

        let (status, _) = call(&state, "GET", &format!("/api/v1/wizard/{sid}/quality"), Value::Null).await;
        assert_eq!(status, StatusCode::OK);

        // Leaving personal info flushed it through the document store.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let writes = backend.writes();
        assert!(writes.iter().any(|(section, value)| {
            *section == SectionKey::PersonalInfo && value["fullName"] == json!("Jane Doe")
        }));
    }

    #[tokio::test]
    async fn test_wizard_conflicts_map_to_409() {
        let (state, sid, _) = state_with_session().await;
        let (status, body) = call(
            &state,
            "POST",
            &format!("/api/v1/wizard/{sid}/jump"),
            json!({ "step": "skills" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], json!("CONFLICT"));

        let (status, _) = call(&state, "POST", &format!("/api/v1/wizard/{sid}/entries"), Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&state, "DELETE", &format!("/api/v1/wizard/{sid}"), Value::Null).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn test_resume_events_require_owner() {
        let uri = format!("/api/v1/resumes/{}/events", Uuid::new_v4());
        assert_eq!(send("GET", &uri, Body::empty()).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_section_is_rejected_before_lookup() {
        let uri = format!(
            "/api/v1/resumes/{}/sections/coverLetter?user_id={}",
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let body = Body::from(r#"{"text":"hi"}"#);
        assert_eq!(send("PATCH", &uri, body).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(send("GET", "/health", Body::empty()).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_export_is_not_implemented() {
        let uri = format!("/api/v1/resumes/{}/export", Uuid::new_v4());
        assert_eq!(send("POST", &uri, Body::empty()).await, StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let uri = format!("/api/v1/wizard/{}", Uuid::new_v4());
        assert_eq!(send("GET", &uri, Body::empty()).await, StatusCode::NOT_FOUND);

        let uri = format!("/api/v1/wizard/{}/next", Uuid::new_v4());
        assert_eq!(send("POST", &uri, Body::empty()).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_jump_target_is_400() {
        let uri = format!("/api/v1/wizard/{}/jump", Uuid::new_v4());
        let body = Body::from(r#"{"step":"coverLetter"}"#);
        assert_eq!(send("POST", &uri, body).await, StatusCode::BAD_REQUEST);
    }
}
