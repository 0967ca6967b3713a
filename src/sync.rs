//! Reconciliation with the external backend.
//!
//! One [`SyncService`] exists per running application. It is constructed
//! explicitly with the store and backend it coordinates, brought up with
//! [`initialize`](SyncService::initialize) and torn down with
//! [`destroy`](SyncService::destroy) — no ambient globals.
//!
//! Responsibilities:
//!
//! - **load**: overwrite local collections with the backend's
//!   authoritative copy (not an undoable action);
//! - **save**: push every local entity independently — one failure never
//!   stops the rest (best-effort fan-out, summarized in a [`SyncReport`]);
//! - **jobs**: drive long-running processing/generation, translating
//!   backend outcomes into status flips through the store's observation
//!   paths;
//! - **auto-sync**: a `tokio::time::interval` task that pushes on a fixed
//!   period while the user's autosave setting is on.
//!
//! Neither direction does conflict detection: save overwrites the backend
//! copy, load overwrites the local copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::{Backend, WireDataset, WireSourceText};
use crate::models::{Dataset, DatasetStatus, ProcessingStatus, SourceText};
use crate::store::EntityStore;

/// Default period of the auto-sync timer.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);

/// Auto-sync timer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

/// Outcome of a best-effort push pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub pushed: usize,
    pub failed: usize,
}

/// Coordinator for backend reconciliation and job orchestration.
pub struct SyncService {
    store: Arc<EntityStore>,
    backend: Arc<dyn Backend>,
    options: Mutex<SyncOptions>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SyncService {
    pub fn new(store: Arc<EntityStore>, backend: Arc<dyn Backend>) -> Self {
        Self {
            store,
            backend,
            options: Mutex::new(SyncOptions::default()),
            timer: Mutex::new(None),
        }
    }

    /// Bring the service up: hydrate settings from the backend, pull the
    /// authoritative collections, and start the auto-sync timer.
    pub async fn initialize(&self) -> Result<()> {
        match self.backend.get_settings().await {
            Ok(Some(settings)) => self.store.replace_settings_observed(settings),
            Ok(None) => debug!("backend has no settings stored, keeping defaults"),
            Err(e) => warn!(error = %e, "settings hydration failed, keeping defaults"),
        }
        self.load_from_backend()
            .await
            .context("initial backend load")?;
        self.restart_timer();
        Ok(())
    }

    /// Tear the service down, stopping the auto-sync timer.
    pub fn destroy(&self) {
        if let Some(handle) = self.timer.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Replace the timer configuration, stopping and restarting the task.
    pub fn configure_sync(&self, options: SyncOptions) {
        *self.options.lock().unwrap() = options;
        self.restart_timer();
    }

    pub fn sync_options(&self) -> SyncOptions {
        *self.options.lock().unwrap()
    }

    fn restart_timer(&self) {
        let mut timer = self.timer.lock().unwrap();
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        let options = *self.options.lock().unwrap();
        if !options.enabled {
            return;
        }
        let store = Arc::clone(&self.store);
        let backend = Arc::clone(&self.backend);
        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(options.interval);
            // The first tick of a tokio interval completes immediately;
            // consume it so pushes start one full period from now.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !store.settings().autosave {
                    continue;
                }
                let report = push_all(&store, backend.as_ref()).await;
                if report.failed > 0 {
                    warn!(failed = report.failed, "periodic sync left entities unpushed");
                }
            }
        }));
    }

    /// Overwrite local collections with the backend's full authoritative
    /// set. Bypasses history.
    pub async fn load_from_backend(&self) -> Result<()> {
        let texts = self
            .backend
            .list_source_texts()
            .await
            .context("listing source texts")?;
        let datasets = self
            .backend
            .list_datasets()
            .await
            .context("listing datasets")?;

        let texts: HashMap<String, SourceText> = texts
            .into_iter()
            .map(|wire| {
                let st = SourceText::from(wire);
                (st.id.clone(), st)
            })
            .collect();
        let datasets: HashMap<String, Dataset> = datasets
            .into_iter()
            .map(|wire| {
                let ds = Dataset::from(wire);
                (ds.id.clone(), ds)
            })
            .collect();

        self.store.replace_all(texts, datasets);
        Ok(())
    }

    /// Push every local entity to the backend, independently.
    pub async fn save_to_backend(&self) -> SyncReport {
        push_all(&self.store, self.backend.as_ref()).await
    }

    /// Push a single source text on demand (after a direct edit).
    pub async fn sync_source_text(&self, id: &str) -> Result<()> {
        let text = match self.store.source_text(id) {
            Some(text) => text,
            None => return Ok(()),
        };
        self.backend
            .save_source_text(&WireSourceText::from(&text))
            .await
            .with_context(|| format!("pushing source text {}", id))
    }

    /// Push a single dataset on demand.
    pub async fn sync_dataset(&self, id: &str) -> Result<()> {
        let dataset = match self.store.dataset(id) {
            Some(dataset) => dataset,
            None => return Ok(()),
        };
        self.backend
            .save_dataset(&WireDataset::from(&dataset))
            .await
            .with_context(|| format!("pushing dataset {}", id))
    }

    /// Run backend processing for a source text.
    ///
    /// Optimistically flips status to `Processing`, then translates the
    /// backend's answer into the terminal status. All transitions go
    /// through observation paths and are not undoable. Returns the
    /// terminal status; backend transport errors are folded into `Failed`.
    pub async fn process_source_text(&self, id: &str) -> ProcessingStatus {
        if !self
            .store
            .set_source_text_status(id, ProcessingStatus::Processing)
        {
            return ProcessingStatus::Failed;
        }
        let strategy = self.store.settings().default_chunking;
        match self.backend.process_source_text(id, Some(strategy)).await {
            Ok(outcome) if outcome.success => {
                self.store
                    .set_source_text_counts(id, outcome.word_count, outcome.char_count);
                self.store
                    .set_source_text_status(id, ProcessingStatus::Completed);
                ProcessingStatus::Completed
            }
            Ok(outcome) => {
                debug!(id, error = ?outcome.error, "backend reported processing failure");
                self.store.set_source_text_failure(id, outcome.error);
                ProcessingStatus::Failed
            }
            Err(e) => {
                warn!(id, error = %e, "processing call failed");
                self.store.set_source_text_failure(id, Some(e.to_string()));
                ProcessingStatus::Failed
            }
        }
    }

    /// Run backend generation for a dataset: draft → processing → ready,
    /// or back to draft on failure.
    pub async fn generate_dataset(&self, id: &str) -> DatasetStatus {
        let export = match self.store.dataset(id) {
            Some(dataset) => dataset.metadata.export.clone(),
            None => return DatasetStatus::Draft,
        };
        self.store.set_dataset_status(id, DatasetStatus::Processing);
        match self.backend.generate_dataset(id, &export).await {
            Ok(outcome) if outcome.success => {
                let chunks = outcome.chunks.into_iter().map(Into::into).collect();
                self.store.set_dataset_chunks_observed(id, chunks);
                self.store.set_dataset_status(id, DatasetStatus::Ready);
                DatasetStatus::Ready
            }
            Ok(outcome) => {
                debug!(id, error = ?outcome.error, "backend reported generation failure");
                self.store.set_dataset_status(id, DatasetStatus::Draft);
                DatasetStatus::Draft
            }
            Err(e) => {
                warn!(id, error = %e, "generation call failed");
                self.store.set_error(format!("generation failed: {}", e));
                self.store.set_dataset_status(id, DatasetStatus::Draft);
                DatasetStatus::Draft
            }
        }
    }

    /// User-triggered force-consistency pass: push everything, then pull
    /// the backend's view back. Errors here are visible to the caller.
    pub async fn manual_sync(&self) -> Result<SyncReport> {
        let report = self.save_to_backend().await;
        self.load_from_backend().await.context("manual reload")?;
        Ok(report)
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Best-effort fan-out shared by the timer task and the public save path.
async fn push_all(store: &EntityStore, backend: &dyn Backend) -> SyncReport {
    let mut report = SyncReport::default();
    for text in store.source_texts() {
        match backend.save_source_text(&WireSourceText::from(&text)).await {
            Ok(()) => report.pushed += 1,
            Err(e) => {
                warn!(id = %text.id, error = %e, "source text push failed");
                report.failed += 1;
            }
        }
    }
    for dataset in store.datasets() {
        match backend.save_dataset(&WireDataset::from(&dataset)).await {
            Ok(()) => report.pushed += 1,
            Err(e) => {
                warn!(id = %dataset.id, error = %e, "dataset push failed");
                report.failed += 1;
            }
        }
    }
    report
}
