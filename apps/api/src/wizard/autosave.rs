//! Debounced persistence of one document section.
//!
//! Each `Autosave` owns a background task. Every change restarts the debounce
//! timer; when it elapses the latest snapshot (and only that one) is written to
//! the store. The task is aborted when the `Autosave` is dropped, so a snapshot
//! still waiting for its window is discarded rather than written late.
//! `shutdown` is the orderly alternative: it writes first, then stops.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::resume::SectionKey;
use crate::store::PersistenceStore;

/// Far enough ahead that an idle timer never fires.
const IDLE: Duration = Duration::from_secs(60 * 60 * 24);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// Quiet period before a snapshot is written.
    pub debounce: Duration,
    /// How long `saving` stays raised after a write attempt finishes.
    pub indicator: Duration,
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_backoff: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            indicator: Duration::from_millis(1500),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1000),
        }
    }
}

/// What the client shows next to the form: the transient "saving" flag and
/// the "save failed" banner.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    pub saving: bool,
    /// A change is waiting for its debounce window to close.
    pub pending: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub saves_completed: u64,
}

#[derive(Debug)]
enum Command {
    Change(Value),
    Flush,
    /// Write anything pending, then stop.
    Shutdown,
}

pub struct Autosave {
    section: SectionKey,
    tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SaveState>,
    task: JoinHandle<()>,
}

impl Autosave {
    pub fn spawn(
        resume_id: Uuid,
        section: SectionKey,
        store: Arc<dyn PersistenceStore>,
        config: AutosaveConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SaveState::default());
        let worker = Worker {
            resume_id,
            section,
            store,
            config,
            status: status_tx,
        };
        let task = tokio::spawn(worker.run(rx));
        Self {
            section,
            tx,
            status,
            task,
        }
    }

    /// Queues `snapshot` and restarts the debounce window. Never blocks.
    pub fn change(&self, snapshot: Value) {
        if self.tx.send(Command::Change(snapshot)).is_err() {
            debug!(section = %self.section, "Autosave worker gone; change dropped");
        }
    }

    /// Writes any pending snapshot now instead of waiting for the window.
    pub fn flush(&self) {
        if self.tx.send(Command::Flush).is_err() {
            debug!(section = %self.section, "Autosave worker gone; flush dropped");
        }
    }

    pub fn status(&self) -> SaveState {
        self.status.borrow().clone()
    }

    /// Writes any pending snapshot, then waits for the worker to stop.
    pub async fn shutdown(mut self) {
        if self.tx.send(Command::Shutdown).is_err() {
            return;
        }
        if let Err(e) = (&mut self.task).await {
            debug!(section = %self.section, "Autosave worker ended abnormally: {e}");
        }
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Worker {
    resume_id: Uuid,
    section: SectionKey,
    store: Arc<dyn PersistenceStore>,
    config: AutosaveConfig,
    status: watch::Sender<SaveState>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let mut pending: Option<Value> = None;
        let mut indicator_armed = false;

        let debounce = sleep_until(Instant::now() + IDLE);
        let indicator = sleep_until(Instant::now() + IDLE);
        tokio::pin!(debounce);
        tokio::pin!(indicator);

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Change(snapshot)) => {
                        if pending.replace(snapshot).is_some() {
                            debug!(section = %self.section, "Coalesced autosave snapshot");
                        }
                        debounce.as_mut().reset(Instant::now() + self.config.debounce);
                        self.status.send_modify(|s| s.pending = true);
                    }
                    Some(Command::Flush) => {
                        if let Some(snapshot) = pending.take() {
                            self.persist(snapshot).await;
                            indicator.as_mut().reset(Instant::now() + self.config.indicator);
                            indicator_armed = true;
                        }
                    }
                    Some(Command::Shutdown) => {
                        if let Some(snapshot) = pending.take() {
                            self.persist(snapshot).await;
                        }
                        break;
                    }
                    None => {
                        if pending.is_some() {
                            debug!(section = %self.section, "Autosave owner gone; pending snapshot discarded");
                        }
                        break;
                    }
                },
                _ = &mut debounce, if pending.is_some() => {
                    if let Some(snapshot) = pending.take() {
                        self.persist(snapshot).await;
                        indicator.as_mut().reset(Instant::now() + self.config.indicator);
                        indicator_armed = true;
                    }
                }
                _ = &mut indicator, if indicator_armed => {
                    indicator_armed = false;
                    self.status.send_modify(|s| s.saving = false);
                }
            }
        }
    }

    /// Writes one snapshot, retrying with doubling backoff. The final failure
    /// is logged and surfaced through `last_error`; it never reaches the editor.
    async fn persist(&self, snapshot: Value) {
        self.status.send_modify(|s| {
            s.saving = true;
            s.pending = false;
        });

        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self
                .store
                .update_field(self.resume_id, self.section, snapshot.clone())
                .await
            {
                Ok(()) => {
                    info!(resume_id = %self.resume_id, section = %self.section, attempt, "Section autosaved");
                    self.status.send_modify(|s| {
                        s.last_saved_at = Some(Utc::now());
                        s.last_error = None;
                        s.last_error_at = None;
                        s.saves_completed += 1;
                    });
                    return;
                }
                Err(e) if attempt < max_attempts && e.is_transient() => {
                    let delay = self.config.retry_backoff * (1u32 << (attempt - 1).min(16));
                    warn!(
                        resume_id = %self.resume_id,
                        section = %self.section,
                        attempt,
                        "Autosave failed: {e}; retrying after {}ms",
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        resume_id = %self.resume_id,
                        section = %self.section,
                        attempt,
                        "Autosave gave up: {e}"
                    );
                    self.status.send_modify(|s| {
                        s.last_error = Some(e.to_string());
                        s.last_error_at = Some(Utc::now());
                    });
                    return;
                }
            }
        }
    }
}
