use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{PersistenceStore, StoreError, StoreEvent};
use crate::models::resume::{ResumeDocument, SectionKey};
use crate::wizard::schema::clean_section;

const EVENT_CAPACITY: usize = 256;

struct Cached {
    document: ResumeDocument,
    last_used: Instant,
}

impl Cached {
    fn new(document: ResumeDocument) -> Self {
        Self {
            document,
            last_used: Instant::now(),
        }
    }
}

/// Explicit, shared document state with subscribe/notify. Passed around by
/// `Arc` through `AppState`; there is no global instance.
pub struct DocumentStore {
    documents: RwLock<HashMap<Uuid, Cached>>,
    events: broadcast::Sender<StoreEvent>,
    backend: Arc<dyn PersistenceStore>,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn PersistenceStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            documents: RwLock::new(HashMap::new()),
            events,
            backend,
        }
    }

    /// Seeds the cache with a freshly created document.
    pub async fn insert(&self, resume_id: Uuid, document: ResumeDocument) {
        self.documents.write().await.insert(resume_id, Cached::new(document));
    }

    /// Cached document, loading it from the backend on a miss.
    pub async fn get(&self, resume_id: Uuid) -> Result<ResumeDocument, StoreError> {
        if let Some(cached) = self.documents.write().await.get_mut(&resume_id) {
            cached.last_used = Instant::now();
            return Ok(cached.document.clone());
        }
        let doc = self.backend.load(resume_id).await?;
        Ok(self
            .documents
            .write()
            .await
            .entry(resume_id)
            .or_insert_with(|| Cached::new(doc))
            .document
            .clone())
    }

    /// Drops cached documents nobody has read or written for `ttl`. They are
    /// reloaded from the backend on the next read.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|_, cached| cached.last_used.elapsed() < ttl);
        let evicted = before - documents.len();
        if evicted > 0 {
            info!(evicted, cached = documents.len(), "Evicted idle documents");
        }
        evicted
    }

    /// Drops the cached copy and tells subscribers the resume is gone.
    pub async fn evict(&self, resume_id: Uuid) {
        self.documents.write().await.remove(&resume_id);
        self.notify(StoreEvent::Deleted { resume_id });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: StoreEvent) {
        // No receivers is fine; nobody is watching this resume.
        if self.events.send(event).is_err() {
            debug!("No store subscribers");
        }
    }
}

#[async_trait]
impl PersistenceStore for DocumentStore {
    async fn load(&self, resume_id: Uuid) -> Result<ResumeDocument, StoreError> {
        self.get(resume_id).await
    }

    /// Validates, sanitizes and normalizes the section value, writes it
    /// through to the backend, then updates the cache and notifies subscribers.
    async fn update_field(&self, resume_id: Uuid, section: SectionKey, value: Value) -> Result<(), StoreError> {
        let invalid = |reason: String| StoreError::InvalidSection { section, reason };
        let mut scratch = ResumeDocument::default();
        scratch
            .apply_section(section, value)
            .map_err(|e| invalid(e.to_string()))?;
        clean_section(section, &mut scratch).map_err(invalid)?;
        if section == SectionKey::Customization {
            scratch.customization.validate().map_err(invalid)?;
        }
        let normalized = scratch.section_value(section);

        self.backend
            .update_field(resume_id, section, normalized.clone())
            .await?;

        if let Some(cached) = self.documents.write().await.get_mut(&resume_id) {
            cached.last_used = Instant::now();
            if let Err(e) = cached.document.apply_section(section, normalized.clone()) {
                warn!(resume_id = %resume_id, section = %section, "Cached document rejected section: {e}");
            }
        }

        self.notify(StoreEvent::SectionUpdated {
            resume_id,
            section,
            value: normalized,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::RecordingStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_writes_through_and_notifies() {
        let id = Uuid::new_v4();
        let backend = Arc::new(RecordingStore::with_document(id, ResumeDocument::default()));
        let store = DocumentStore::new(backend.clone());
        let mut events = store.subscribe();

        store
            .update_field(id, SectionKey::Summary, json!({ "text": "Hello" }))
            .await
            .unwrap();

        assert_eq!(backend.writes(), vec![(SectionKey::Summary, json!({ "text": "Hello" }))]);
        let event = events.recv().await.unwrap();
        assert_eq!(event.resume_id(), id);
        assert_eq!(event.name(), "section_updated");
        assert_eq!(store.get(id).await.unwrap().summary.text, "Hello");
    }

    #[tokio::test]
    async fn test_section_order_is_normalized_before_write() {
        let id = Uuid::new_v4();
        let backend = Arc::new(RecordingStore::with_document(id, ResumeDocument::default()));
        let store = DocumentStore::new(backend.clone());

        store
            .update_field(id, SectionKey::SectionOrder, json!(["skills", "personalInfo"]))
            .await
            .unwrap();

        let (_, written) = backend.writes().remove(0);
        let order: Vec<SectionKey> = serde_json::from_value(written).unwrap();
        assert_eq!(order[0], SectionKey::PersonalInfo);
        assert_eq!(order[1], SectionKey::Skills);
        assert_eq!(order.len(), SectionKey::CONTENT.len());
    }

    #[tokio::test]
    async fn test_malformed_section_is_rejected() {
        let id = Uuid::new_v4();
        let backend = Arc::new(RecordingStore::with_document(id, ResumeDocument::default()));
        let store = DocumentStore::new(backend.clone());

        let err = store
            .update_field(id, SectionKey::WorkExperience, json!("not a list"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidSection { .. }));
        assert_eq!(backend.attempts(), 0);
    }

    #[tokio::test]
    async fn test_direct_writes_are_sanitized() {
        let id = Uuid::new_v4();
        let backend = Arc::new(RecordingStore::with_document(id, ResumeDocument::default()));
        let store = DocumentStore::new(backend.clone());

        store
            .update_field(
                id,
                SectionKey::PersonalInfo,
                json!({
                    "fullName": "<script>alert(1)</script>Jane",
                    "linkedin": "javascript:alert(1)"
                }),
            )
            .await
            .unwrap();

        let (_, written) = backend.writes().remove(0);
        let raw = written.to_string().to_lowercase();
        assert!(!raw.contains("<script"), "{raw}");
        assert!(!raw.contains("javascript:"), "{raw}");
        assert_eq!(written["fullName"], json!("Jane"));
        assert_eq!(store.get(id).await.unwrap().personal_info.full_name, "Jane");
    }

    #[tokio::test]
    async fn test_misordered_work_dates_are_rejected() {
        let id = Uuid::new_v4();
        let backend = Arc::new(RecordingStore::with_document(id, ResumeDocument::default()));
        let store = DocumentStore::new(backend.clone());
        store.get(id).await.unwrap();

        let entry = json!([{
            "jobTitle": "Engineer",
            "company": "Acme",
            "startDate": { "year": 2022, "month": 5 },
            "endDate": { "year": 2019, "month": 1 },
            "currentlyWorking": false
        }]);
        let err = store
            .update_field(id, SectionKey::WorkExperience, entry)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidSection { .. }));
        assert_eq!(backend.attempts(), 0);
        assert!(store.get(id).await.unwrap().work_experience.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_customization_is_rejected() {
        let id = Uuid::new_v4();
        let store = DocumentStore::new(Arc::new(RecordingStore::with_document(id, ResumeDocument::default())));
        let mut custom = serde_json::to_value(crate::models::resume::Customization::default()).unwrap();
        custom["colors"]["primary"] = json!("blue");
        assert!(matches!(
            store.update_field(id, SectionKey::Customization, custom).await,
            Err(StoreError::InvalidSection { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_documents_are_evicted_and_reloaded() {
        let id = Uuid::new_v4();
        let backend = Arc::new(RecordingStore::with_document(id, ResumeDocument::default()));
        let store = DocumentStore::new(backend.clone());
        let warm = Uuid::new_v4();
        store.insert(warm, ResumeDocument::default()).await;
        store.get(id).await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        store.get(warm).await.unwrap();
        assert_eq!(store.evict_idle(Duration::from_secs(30)).await, 1);

        // Still readable: the backend has it.
        assert!(store.get(id).await.is_ok());
        assert!(store.get(warm).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_resume_is_not_found() {
        let store = DocumentStore::new(Arc::new(RecordingStore::default()));
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id).await, Err(StoreError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_evict_notifies_deleted() {
        let id = Uuid::new_v4();
        let store = DocumentStore::new(Arc::new(RecordingStore::default()));
        store.insert(id, ResumeDocument::default()).await;
        let mut events = store.subscribe();

        store.evict(id).await;
        assert_eq!(events.recv().await.unwrap(), StoreEvent::Deleted { resume_id: id });
        assert!(store.get(id).await.is_err());
    }
}
