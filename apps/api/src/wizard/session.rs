//! A wizard session: navigator, per-step form state, the merged document,
//! and one autosave worker per section.
//!
//! Sessions are held in memory by `SessionRegistry`. Dropping a session drops
//! its autosave workers, which cancels any snapshot still in its debounce
//! window. Sessions left idle are shut down by the sweeper instead, which
//! writes pending snapshots first.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::WizardError;
use crate::models::resume::{Customization, ResumeDocument, SectionKey};
use crate::store::{DocumentStore, PersistenceStore};
use crate::wizard::autosave::{Autosave, AutosaveConfig, SaveState};
use crate::wizard::form::{FieldValue, FormStatus};
use crate::wizard::navigator::{Step, StepNavigator, Transition};
use crate::wizard::schema::{StepData, StepIssue, StepView};

/// Result of a single field edit or blur.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOutcome {
    pub field: String,
    pub error: Option<String>,
    pub status: FormStatus,
    pub step_valid: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextOutcome {
    pub advanced: bool,
    pub step: Step,
    /// Everything still blocking the step, empty when `advanced`.
    pub issues: Vec<StepIssue>,
}

/// Save status folded across all sections.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSummary {
    pub saving: bool,
    pub pending: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub sections: BTreeMap<SectionKey, SaveState>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub user_id: Uuid,
    pub current_step: Step,
    pub step_number: u8,
    pub step_title: &'static str,
    pub completed: Vec<Step>,
    pub step: Option<StepView>,
    pub step_valid: bool,
    pub issues: Vec<StepIssue>,
    pub save: SaveSummary,
}

pub struct WizardSession {
    id: Uuid,
    resume_id: Uuid,
    user_id: Uuid,
    navigator: StepNavigator,
    steps: BTreeMap<Step, StepData>,
    document: ResumeDocument,
    autosaves: BTreeMap<SectionKey, Autosave>,
    store: Arc<dyn PersistenceStore>,
    config: AutosaveConfig,
}

impl WizardSession {
    /// Starts at the first step with form state loaded from `document`.
    pub fn start(
        resume_id: Uuid,
        user_id: Uuid,
        document: ResumeDocument,
        store: Arc<dyn PersistenceStore>,
        config: AutosaveConfig,
    ) -> Self {
        let steps = Step::ALL
            .into_iter()
            .filter_map(|step| StepData::load(step, &document).map(|data| (step, data)))
            .collect();
        Self {
            id: Uuid::new_v4(),
            resume_id,
            user_id,
            navigator: StepNavigator::new(),
            steps,
            document,
            autosaves: BTreeMap::new(),
            store,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn resume_id(&self) -> Uuid {
        self.resume_id
    }

    pub fn current_step(&self) -> Step {
        self.navigator.current()
    }

    /// The merged document, blank entries excluded.
    pub fn document(&self) -> &ResumeDocument {
        &self.document
    }

    // ── editing ─────────────────────────────────────────────────────────────

    /// Applies one keystroke-level change to the active step. `step`, when
    /// given, must be the active step.
    pub fn change_field(
        &mut self,
        step: Option<Step>,
        entry: Option<usize>,
        field: &str,
        value: &Value,
    ) -> Result<FieldOutcome, WizardError> {
        let current = self.ensure_active(step)?;
        let data = self.step_data_mut(current, field)?;
        let form = data.form_mut(current, entry)?;
        let error = form.on_change(field, FieldValue::from_json(value))?;
        let status = form.status();
        let step_valid = data.is_valid();

        self.sync_section(current);
        Ok(FieldOutcome {
            field: field.to_string(),
            error,
            status,
            step_valid,
        })
    }

    /// Validates a field on focus loss without changing it.
    pub fn blur_field(
        &mut self,
        step: Option<Step>,
        entry: Option<usize>,
        field: &str,
    ) -> Result<FieldOutcome, WizardError> {
        let current = self.ensure_active(step)?;
        let data = self.step_data_mut(current, field)?;
        let form = data.form_mut(current, entry)?;
        let error = form.on_blur(field)?;
        let status = form.status();
        Ok(FieldOutcome {
            field: field.to_string(),
            error,
            status,
            step_valid: data.is_valid(),
        })
    }

    /// Appends a blank entry to the active list step. Blank entries are not
    /// part of the document, so nothing is saved yet.
    pub fn add_entry(&mut self) -> Result<usize, WizardError> {
        let current = self.navigator.current();
        let data = self
            .steps
            .get_mut(&current)
            .ok_or(WizardError::NotAnEntryStep { step: current })?;
        data.entries_mut(current)?.add()
    }

    pub fn remove_entry(&mut self, index: usize) -> Result<(), WizardError> {
        let current = self.navigator.current();
        let data = self
            .steps
            .get_mut(&current)
            .ok_or(WizardError::NotAnEntryStep { step: current })?;
        data.entries_mut(current)?.remove(index)?;
        self.sync_section(current);
        Ok(())
    }

    // ── navigation ──────────────────────────────────────────────────────────

    /// Advances if the active step is valid. Otherwise every field of the
    /// step is touched so the issue list is complete.
    pub fn next(&mut self) -> NextOutcome {
        let current = self.navigator.current();
        let valid = self.steps.get(&current).map_or(true, StepData::is_valid);
        if !valid {
            if let Some(data) = self.steps.get_mut(&current) {
                data.touch_all();
            }
            debug!(session_id = %self.id, step = %current, "Next blocked by validation");
            return NextOutcome {
                advanced: false,
                step: current,
                issues: self.issues(),
            };
        }

        let transition = self.navigator.next(true);
        self.on_transition(transition);
        NextOutcome {
            advanced: transition.moved(),
            step: transition.to,
            issues: Vec::new(),
        }
    }

    pub fn back(&mut self) -> Step {
        let transition = self.navigator.back();
        self.on_transition(transition);
        transition.to
    }

    pub fn jump_to(&mut self, target: Step) -> Result<Step, WizardError> {
        let transition = self.navigator.jump_to(target)?;
        self.on_transition(transition);
        Ok(transition.to)
    }

    // ── finalize preferences ────────────────────────────────────────────────

    pub fn set_visibility(&mut self, section: SectionKey, visible: bool) -> Result<(), WizardError> {
        if section == SectionKey::PersonalInfo {
            return Err(WizardError::SectionLocked(section));
        }
        if !self.document.set_visibility(section, visible) {
            return Err(WizardError::InvalidValue {
                field: section.to_string(),
                reason: "only content sections can be shown or hidden".to_string(),
            });
        }
        self.schedule_save(SectionKey::SectionVisibility);
        Ok(())
    }

    /// Reorders sections. Personal info is forced first; missing sections are
    /// appended in their default position.
    pub fn set_order(&mut self, order: Vec<SectionKey>) -> &[SectionKey] {
        self.document.set_order(order);
        self.schedule_save(SectionKey::SectionOrder);
        &self.document.section_order
    }

    pub fn set_customization(&mut self, customization: Customization) -> Result<(), WizardError> {
        customization.validate().map_err(WizardError::InvalidCustomization)?;
        self.document.customization = customization;
        self.schedule_save(SectionKey::Customization);
        Ok(())
    }

    // ── reads ───────────────────────────────────────────────────────────────

    /// Outstanding issues on the active step, entries numbered from 1.
    pub fn issues(&self) -> Vec<StepIssue> {
        let current = self.navigator.current();
        self.steps
            .get(&current)
            .map(|data| data.issues(current))
            .unwrap_or_default()
    }

    /// Folds every section's save state. The banner shows the most recent
    /// unresolved failure.
    pub fn save_summary(&self) -> SaveSummary {
        let mut summary = SaveSummary::default();
        let mut newest_error: Option<DateTime<Utc>> = None;
        for (section, autosave) in &self.autosaves {
            let state = autosave.status();
            summary.saving |= state.saving;
            summary.pending |= state.pending;
            summary.last_saved_at = summary.last_saved_at.max(state.last_saved_at);
            if state.last_error.is_some() && state.last_error_at >= newest_error {
                newest_error = state.last_error_at;
                summary.last_error = state.last_error.clone();
            }
            summary.sections.insert(*section, state);
        }
        summary
    }

    /// Writes every pending snapshot, then stops the autosave workers.
    pub async fn shutdown(self) {
        for (_, autosave) in self.autosaves {
            autosave.shutdown().await;
        }
    }

    pub fn view(&self) -> SessionView {
        let current = self.navigator.current();
        let data = self.steps.get(&current);
        SessionView {
            id: self.id,
            resume_id: self.resume_id,
            user_id: self.user_id,
            current_step: current,
            step_number: current.number(),
            step_title: current.title(),
            completed: self.navigator.completed().iter().copied().collect(),
            step: data.map(StepData::view),
            step_valid: data.map_or(true, StepData::is_valid),
            issues: self.issues(),
            save: self.save_summary(),
        }
    }

    // ── internals ───────────────────────────────────────────────────────────

    fn ensure_active(&self, step: Option<Step>) -> Result<Step, WizardError> {
        let current = self.navigator.current();
        match step {
            Some(step) if step != current => Err(WizardError::StepNotActive { step, current }),
            _ => Ok(current),
        }
    }

    fn step_data_mut(&mut self, step: Step, field: &str) -> Result<&mut StepData, WizardError> {
        // Finalize has no form fields.
        self.steps.get_mut(&step).ok_or_else(|| WizardError::UnknownField {
            field: field.to_string(),
        })
    }

    /// Folds the step's form state into the document and schedules a save.
    fn sync_section(&mut self, step: Step) {
        let (Some(data), Some(section)) = (self.steps.get(&step), step.section()) else {
            return;
        };
        data.write_into(step, &mut self.document);
        self.schedule_save(section);
    }

    fn schedule_save(&mut self, section: SectionKey) {
        let snapshot = self.document.section_value(section);
        self.autosave(section).change(snapshot);
    }

    fn autosave(&mut self, section: SectionKey) -> &Autosave {
        let (resume_id, store, config) = (self.resume_id, &self.store, self.config);
        self.autosaves
            .entry(section)
            .or_insert_with(|| Autosave::spawn(resume_id, section, store.clone(), config))
    }

    /// Leaving a step writes its pending snapshot right away.
    fn on_transition(&mut self, transition: Transition) {
        if !transition.moved() {
            return;
        }
        info!(
            session_id = %self.id,
            from = %transition.from,
            to = %transition.to,
            "Wizard step changed"
        );
        if let Some(autosave) = transition.from.section().and_then(|s| self.autosaves.get(&s)) {
            autosave.flush();
        }
    }
}

struct Tracked {
    session: WizardSession,
    last_active: Instant,
}

/// In-memory sessions keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Tracked>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: WizardSession) -> Uuid {
        let id = session.id();
        let tracked = Tracked {
            session,
            last_active: Instant::now(),
        };
        self.sessions.lock().await.insert(id, tracked);
        id
    }

    /// Runs `f` against the session, or returns `None` if it does not exist.
    /// Counts as activity for the idle sweep.
    pub async fn with<R>(&self, id: Uuid, f: impl FnOnce(&mut WizardSession) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().await;
        sessions.get_mut(&id).map(|tracked| {
            tracked.last_active = Instant::now();
            f(&mut tracked.session)
        })
    }

    /// Removes and drops the session, cancelling its pending saves.
    pub async fn close(&self, id: Uuid) -> bool {
        let removed = self.sessions.lock().await.remove(&id);
        if removed.is_some() {
            info!(session_id = %id, "Wizard session closed");
        }
        removed.is_some()
    }

    /// Closes every session editing `resume_id`. Returns how many were closed.
    pub async fn close_for_resume(&self, resume_id: Uuid) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, t| t.session.resume_id() != resume_id);
        before - sessions.len()
    }

    /// Shuts down sessions with no activity for `ttl`, writing their pending
    /// snapshots first. Returns how many were removed.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let stale: Vec<(Uuid, Tracked)> = {
            let mut sessions = self.sessions.lock().await;
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, t)| t.last_active.elapsed() >= ttl)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|t| (id, t)))
                .collect()
        };

        let swept = stale.len();
        for (id, tracked) in stale {
            tracked.session.shutdown().await;
            info!(session_id = %id, "Idle wizard session closed");
        }
        swept
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Background task that closes idle sessions and evicts idle documents
/// every `every`.
pub fn spawn_idle_sweep(
    sessions: Arc<SessionRegistry>,
    documents: Arc<DocumentStore>,
    ttl: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let swept = sessions.sweep_idle(ttl).await;
            let evicted = documents.evict_idle(ttl).await;
            if swept > 0 || evicted > 0 {
                debug!(swept, evicted, "Idle sweep finished");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::RecordingStore;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;

    fn start(store: &Arc<RecordingStore>) -> WizardSession {
        WizardSession::start(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ResumeDocument::default(),
            store.clone(),
            AutosaveConfig::default(),
        )
    }

    fn fill_personal_info(session: &mut WizardSession) {
        for (field, value) in [
            ("fullName", "Jane Doe"),
            ("jobTitle", "Engineer"),
            ("email", "jane@x.com"),
            ("phone", "+1 234 567 8900"),
        ] {
            let outcome = session.change_field(None, None, field, &json!(value)).unwrap();
            assert_eq!(outcome.error, None, "{field}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_personal_info_blocks_next() {
        let store = Arc::new(RecordingStore::default());
        let mut session = start(&store);

        let name = session.change_field(None, None, "fullName", &json!("")).unwrap();
        let email = session.change_field(None, None, "email", &json!("bad")).unwrap();
        assert!(name.error.is_some());
        assert!(email.error.is_some());
        assert!(!email.step_valid);

        let outcome = session.next();
        assert!(!outcome.advanced);
        assert_eq!(outcome.step, Step::PersonalInfo);
        assert_eq!(session.current_step(), Step::PersonalInfo);
        let fields: Vec<&str> = outcome.issues.iter().map(|i| i.issue.field.as_str()).collect();
        assert_eq!(fields, vec!["fullName", "jobTitle", "email", "phone"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_personal_info_advances_to_step_two() {
        let store = Arc::new(RecordingStore::default());
        let mut session = start(&store);
        fill_personal_info(&mut session);

        assert!(session.view().step_valid);
        let outcome = session.next();
        assert!(outcome.advanced);
        assert_eq!(outcome.step, Step::Summary);
        assert_eq!(session.view().step_number, 2);
        assert_eq!(session.document().personal_info.full_name, "Jane Doe");
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_a_step_flushes_its_save() {
        let store = Arc::new(RecordingStore::default());
        let mut session = start(&store);
        fill_personal_info(&mut session);
        session.next();

        // Well inside the debounce window.
        sleep(Duration::from_millis(10)).await;
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, SectionKey::PersonalInfo);
        assert_eq!(writes[0].1["email"], json!("jane@x.com"));

        sleep(Duration::from_secs(2)).await;
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_session_cancels_pending_save() {
        let store = Arc::new(RecordingStore::default());
        let mut session = start(&store);
        session
            .change_field(None, None, "fullName", &json!("Jane"))
            .unwrap();
        drop(session);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(store.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_only_reach_the_active_step() {
        let store = Arc::new(RecordingStore::default());
        let mut session = start(&store);
        let err = session
            .change_field(Some(Step::Summary), None, "text", &json!("Hello"))
            .unwrap_err();
        assert_eq!(
            err,
            WizardError::StepNotActive {
                step: Step::Summary,
                current: Step::PersonalInfo
            }
        );
        assert!(matches!(
            session.change_field(None, None, "text", &json!("Hello")),
            Err(WizardError::UnknownField { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_entries_validate_by_entry() {
        let store = Arc::new(RecordingStore::default());
        let mut session = start(&store);
        fill_personal_info(&mut session);
        session.next();
        session.next();
        assert_eq!(session.current_step(), Step::WorkExperience);

        // Zero entries is a valid list step.
        assert!(session.view().step_valid);

        let first = session.add_entry().unwrap();
        let second = session.add_entry().unwrap();
        assert_eq!((first, second), (0, 1));
        session
            .change_field(None, Some(1), "company", &json!("Acme"))
            .unwrap();

        let outcome = session.next();
        assert!(!outcome.advanced);
        assert!(outcome.issues.iter().all(|i| i.entry == Some(2)));

        assert!(matches!(
            session.change_field(None, None, "company", &json!("Acme")),
            Err(WizardError::EntryIndexRequired { .. })
        ));
        assert!(matches!(
            session.change_field(None, Some(5), "company", &json!("Acme")),
            Err(WizardError::EntryIndexOutOfRange { index: 5, len: 2 })
        ));

        session.remove_entry(1).unwrap();
        assert!(session.next().advanced);
        assert!(session.document().work_experience.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_only_on_list_steps() {
        let store = Arc::new(RecordingStore::default());
        let mut session = start(&store);
        assert!(matches!(
            session.add_entry(),
            Err(WizardError::NotAnEntryStep { step: Step::PersonalInfo })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jump_back_and_forward_within_completed() {
        let store = Arc::new(RecordingStore::default());
        let mut session = start(&store);
        fill_personal_info(&mut session);
        session.next();
        session.next();

        assert_eq!(session.jump_to(Step::PersonalInfo).unwrap(), Step::PersonalInfo);
        assert_eq!(session.jump_to(Step::Summary).unwrap(), Step::Summary);
        assert!(matches!(
            session.jump_to(Step::Skills),
            Err(WizardError::NavigationLocked { .. })
        ));
        assert_eq!(session.back(), Step::PersonalInfo);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_preferences_are_saved() {
        let store = Arc::new(RecordingStore::default());
        let mut session = start(&store);

        assert_eq!(
            session.set_visibility(SectionKey::PersonalInfo, false),
            Err(WizardError::SectionLocked(SectionKey::PersonalInfo))
        );
        session.set_visibility(SectionKey::Projects, false).unwrap();
        let order = session
            .set_order(vec![SectionKey::Skills, SectionKey::PersonalInfo])
            .to_vec();
        assert_eq!(&order[..2], &[SectionKey::PersonalInfo, SectionKey::Skills]);

        let mut custom = Customization::default();
        custom.colors.primary = "blue".to_string();
        assert!(matches!(
            session.set_customization(custom),
            Err(WizardError::InvalidCustomization(_))
        ));

        sleep(Duration::from_secs(1)).await;
        let sections: Vec<SectionKey> = store.writes().into_iter().map(|(s, _)| s).collect();
        assert!(sections.contains(&SectionKey::SectionVisibility));
        assert!(sections.contains(&SectionKey::SectionOrder));
        assert!(!sections.contains(&SectionKey::Customization));
        assert!(!session.document().is_visible(SectionKey::Projects));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_lifecycle() {
        let store = Arc::new(RecordingStore::default());
        let registry = SessionRegistry::new();
        let session = start(&store);
        let resume_id = session.resume_id();
        let id = registry.insert(session).await;

        let step = registry.with(id, |s| s.current_step()).await;
        assert_eq!(step, Some(Step::PersonalInfo));
        assert!(registry.with(Uuid::new_v4(), |s| s.current_step()).await.is_none());

        assert_eq!(registry.close_for_resume(resume_id).await, 1);
        assert!(!registry.close(id).await);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_banner_shows_most_recent_failure() {
        let store = Arc::new(RecordingStore::rejecting());
        let mut session = start(&store);

        session.set_visibility(SectionKey::Projects, false).unwrap();
        sleep(Duration::from_secs(1)).await;
        session.set_order(vec![SectionKey::Skills]);
        sleep(Duration::from_secs(1)).await;

        let summary = session.save_summary();
        assert_eq!(summary.sections.len(), 2);
        let banner = summary.last_error.unwrap();
        assert!(banner.contains("sectionOrder"), "{banner}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_swept_after_saving() {
        let store = Arc::new(RecordingStore::default());
        let registry = SessionRegistry::new();
        let stale = registry.insert(start(&store)).await;
        registry
            .with(stale, |s| s.change_field(None, None, "fullName", &json!("Jane")))
            .await
            .unwrap()
            .unwrap();

        sleep(Duration::from_millis(100)).await;
        let fresh = registry.insert(start(&store)).await;

        // Still inside the debounce window; the sweep writes it out.
        assert_eq!(registry.sweep_idle(Duration::from_millis(50)).await, 1);
        assert_eq!(store.values().len(), 1);
        assert_eq!(store.values()[0]["fullName"], json!("Jane"));

        assert!(registry.with(stale, |_| ()).await.is_none());
        assert!(registry.with(fresh, |_| ()).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_closes_abandoned_sessions() {
        let store = Arc::new(RecordingStore::default());
        let registry = Arc::new(SessionRegistry::new());
        let documents = Arc::new(DocumentStore::new(store.clone()));
        let resume_id = Uuid::new_v4();
        documents.insert(resume_id, ResumeDocument::default()).await;
        registry.insert(start(&store)).await;

        let sweeper = spawn_idle_sweep(
            registry.clone(),
            documents.clone(),
            Duration::from_secs(30),
            Duration::from_secs(10),
        );
        sleep(Duration::from_secs(45)).await;
        assert_eq!(registry.len().await, 0);
        // Evicted from the cache, and the backend never had it.
        assert!(documents.get(resume_id).await.is_err());
        sweeper.abort();
    }
}
