//! The entity store: sole owner of canonical application state.
//!
//! All reads elsewhere go through the selector methods here, and every
//! write funnels through a named mutation entry point. Mutations come in
//! two classes:
//!
//! - **user-intent** mutations snapshot the tracked state into history
//!   before applying, so they can be undone;
//! - **system-observation** mutations (status flips driven by the sync
//!   service, full backend reloads, active-selection pointers) apply
//!   without touching history.
//!
//! The distinction is structural: user-intent operations go through
//! [`EntityStore::mutate`], observations through [`EntityStore::observe`].
//! A no-op (unknown id, duplicate membership) never records a snapshot.
//!
//! State lives behind a `std::sync::RwLock` and all methods take `&self`;
//! each mutation holds the write guard for its whole snapshot-then-apply
//! sequence, so the sequence is atomic with respect to every other store
//! operation. Locks are never held across an await point.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::backend::Backend;
use crate::error::SettingsError;
use crate::history::{History, Snapshot, DEFAULT_CAPACITY};
use crate::models::{
    Dataset, DatasetPatch, DatasetStatus, NewDataset, NewSourceText, ProcessingStatus, SourceText,
    SourceTextPatch, TextChunk,
};
use crate::settings::{validate_settings, AppSettings, SettingsPatch};

#[derive(Debug, Default)]
struct StoreState {
    source_texts: HashMap<String, SourceText>,
    datasets: HashMap<String, Dataset>,
    settings: AppSettings,
    active_dataset_id: Option<String>,
    active_source_text_id: Option<String>,
    history: History,
    /// Best-effort failure channel for background operations (auto-save,
    /// periodic sync). Not part of any snapshot.
    last_error: Option<String>,
}

impl StoreState {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            source_texts: self.source_texts.clone(),
            datasets: self.datasets.clone(),
            settings: self.settings.clone(),
            active_dataset_id: self.active_dataset_id.clone(),
            active_source_text_id: self.active_source_text_id.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.source_texts = snapshot.source_texts;
        self.datasets = snapshot.datasets;
        self.settings = snapshot.settings;
        self.active_dataset_id = snapshot.active_dataset_id;
        self.active_source_text_id = snapshot.active_source_text_id;
    }
}

/// Canonical, addressable store of source texts, datasets, and settings.
pub struct EntityStore {
    state: RwLock<StoreState>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(StoreState {
                history: History::new(capacity),
                ..Default::default()
            }),
        }
    }

    /// Apply a user-intent mutation: snapshot first, commit only if the
    /// closure reports a change. `None` means no-op, and no-ops leave
    /// history untouched.
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> Option<R>) -> Option<R> {
        let mut state = self.state.write().unwrap();
        let before = state.snapshot();
        let result = f(&mut state);
        if result.is_some() {
            state.history.push(before);
        }
        result
    }

    /// Apply a system-observation mutation: no snapshot, no history entry.
    fn observe<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.state.write().unwrap();
        f(&mut state)
    }

    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let state = self.state.read().unwrap();
        f(&state)
    }

    // ── Source texts ────────────────────────────────────────────────────

    /// Insert a new source text, generating its id and timestamps.
    pub fn add_source_text(&self, new: NewSourceText) -> String {
        self.mutate(|state| {
            let st = SourceText::from_new(new, Utc::now());
            let id = st.id.clone();
            state.source_texts.insert(id.clone(), st);
            Some(id)
        })
        .unwrap_or_default()
    }

    /// Merge a partial update into an existing source text. No-op if the
    /// id is unknown.
    pub fn update_source_text(&self, id: &str, patch: SourceTextPatch) -> bool {
        self.mutate(|state| {
            let st = state.source_texts.get_mut(id)?;
            st.apply_patch(patch, Utc::now());
            Some(())
        })
        .is_some()
    }

    /// Remove a source text and run the referential-integrity pass that
    /// strips the id from every dataset referencing it. One transaction,
    /// one history entry.
    pub fn delete_source_text(&self, id: &str) -> bool {
        self.mutate(|state| {
            state.source_texts.remove(id)?;
            prune_dangling_sources(state, Utc::now());
            Some(())
        })
        .is_some()
    }

    /// Status transition driven by the sync service. Does not participate
    /// in history: background observations are not undoable.
    pub fn set_source_text_status(&self, id: &str, status: ProcessingStatus) -> bool {
        self.observe(|state| match state.source_texts.get_mut(id) {
            Some(st) => {
                st.status = status;
                if status != ProcessingStatus::Failed {
                    st.processing_error = None;
                }
                st.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    /// Record a backend processing failure: flips status to `Failed` and
    /// keeps the failure detail. Observation path, like the status setter.
    pub fn set_source_text_failure(&self, id: &str, error: Option<String>) -> bool {
        self.observe(|state| match state.source_texts.get_mut(id) {
            Some(st) => {
                st.status = ProcessingStatus::Failed;
                st.processing_error = error;
                st.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    /// Observation sibling of [`update_source_text`](Self::update_source_text)
    /// for processing results written back by the sync service.
    pub fn set_source_text_counts(&self, id: &str, words: u64, chars: u64) -> bool {
        self.observe(|state| match state.source_texts.get_mut(id) {
            Some(st) => {
                st.metadata.word_count = Some(words);
                st.metadata.char_count = Some(chars);
                st.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    // ── Datasets ────────────────────────────────────────────────────────

    pub fn create_dataset(&self, new: NewDataset) -> String {
        self.mutate(|state| {
            let ds = Dataset::from_new(new, Utc::now());
            let id = ds.id.clone();
            state.datasets.insert(id.clone(), ds);
            Some(id)
        })
        .unwrap_or_default()
    }

    pub fn update_dataset(&self, id: &str, patch: DatasetPatch) -> bool {
        self.mutate(|state| {
            let ds = state.datasets.get_mut(id)?;
            ds.apply_patch(patch, Utc::now());
            Some(())
        })
        .is_some()
    }

    pub fn delete_dataset(&self, id: &str) -> bool {
        self.mutate(|state| {
            state.datasets.remove(id)?;
            if state.active_dataset_id.as_deref() == Some(id) {
                state.active_dataset_id = None;
            }
            Some(())
        })
        .is_some()
    }

    /// Append a source reference to a dataset. No-op if either id is
    /// unknown or the reference already exists.
    pub fn add_source_to_dataset(&self, dataset_id: &str, source_id: &str) -> bool {
        self.mutate(|state| {
            if !state.source_texts.contains_key(source_id) {
                return None;
            }
            let ds = state.datasets.get_mut(dataset_id)?;
            if ds.source_ids.iter().any(|s| s == source_id) {
                return None;
            }
            ds.source_ids.push(source_id.to_string());
            ds.updated_at = Utc::now();
            Some(())
        })
        .is_some()
    }

    pub fn remove_source_from_dataset(&self, dataset_id: &str, source_id: &str) -> bool {
        self.mutate(|state| {
            let ds = state.datasets.get_mut(dataset_id)?;
            let before = ds.source_ids.len();
            ds.source_ids.retain(|s| s != source_id);
            if ds.source_ids.len() == before {
                return None;
            }
            ds.updated_at = Utc::now();
            Some(())
        })
        .is_some()
    }

    /// Replace a dataset's chunk list (user-intent path, e.g. manual chunk
    /// editing). Recomputes the chunk/word aggregates as a side effect.
    pub fn update_dataset_chunks(&self, dataset_id: &str, chunks: Vec<TextChunk>) -> bool {
        self.mutate(|state| {
            let ds = state.datasets.get_mut(dataset_id)?;
            ds.chunks = chunks;
            ds.recompute_aggregates();
            ds.updated_at = Utc::now();
            Some(())
        })
        .is_some()
    }

    /// Observation sibling of [`update_dataset_chunks`](Self::update_dataset_chunks)
    /// used when backend generation writes chunks back.
    pub fn set_dataset_chunks_observed(&self, dataset_id: &str, chunks: Vec<TextChunk>) -> bool {
        self.observe(|state| match state.datasets.get_mut(dataset_id) {
            Some(ds) => {
                ds.chunks = chunks;
                ds.recompute_aggregates();
                ds.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    pub fn set_dataset_status(&self, id: &str, status: DatasetStatus) -> bool {
        self.observe(|state| match state.datasets.get_mut(id) {
            Some(ds) => {
                ds.status = status;
                ds.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    // ── Settings ────────────────────────────────────────────────────────

    /// The validated settings-update path: merge, validate, persist to the
    /// backend, and only then commit locally (with a history entry).
    ///
    /// All-or-nothing across both copies: a validation failure or backend
    /// refusal leaves local settings and history exactly as they were.
    pub async fn update_settings(
        &self,
        patch: SettingsPatch,
        backend: &dyn Backend,
    ) -> Result<AppSettings, SettingsError> {
        let candidate = {
            let state = self.state.read().unwrap();
            validate_settings(&state.settings, patch)?
        };
        let ack = backend
            .save_settings(&candidate)
            .await
            .map_err(|e| SettingsError::Backend(e.to_string()))?;
        if !ack.success {
            return Err(SettingsError::Backend(
                ack.error.unwrap_or_else(|| "unspecified".to_string()),
            ));
        }
        self.mutate(|state| {
            state.settings = candidate.clone();
            Some(())
        });
        Ok(candidate)
    }

    /// Replace settings without the backend gate (startup hydration from
    /// the backend's copy). Observation path: no history entry.
    pub fn replace_settings_observed(&self, settings: AppSettings) {
        self.observe(|state| state.settings = settings);
    }

    // ── Active selection ────────────────────────────────────────────────

    /// UI-convenience pointer; does not participate in history.
    pub fn set_active_dataset(&self, id: Option<String>) {
        self.observe(|state| state.active_dataset_id = id);
    }

    /// UI-convenience pointer; does not participate in history.
    pub fn set_active_source_text(&self, id: Option<String>) {
        self.observe(|state| state.active_source_text_id = id);
    }

    // ── History ─────────────────────────────────────────────────────────

    pub fn undo(&self) -> bool {
        let mut state = self.state.write().unwrap();
        let current = state.snapshot();
        match state.history.undo(current) {
            Some(restored) => {
                state.restore(restored);
                true
            }
            None => false,
        }
    }

    pub fn redo(&self) -> bool {
        let mut state = self.state.write().unwrap();
        let current = state.snapshot();
        match state.history.redo(current) {
            Some(restored) => {
                state.restore(restored);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.read(|state| state.history.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.read(|state| state.history.can_redo())
    }

    pub fn history_len(&self) -> usize {
        self.read(|state| state.history.len())
    }

    // ── Wholesale replacement (observation paths) ───────────────────────

    /// Overwrite both collections with the backend's authoritative copy.
    /// A full reload is not an undoable user action.
    pub fn replace_all(
        &self,
        source_texts: HashMap<String, SourceText>,
        datasets: HashMap<String, Dataset>,
    ) {
        self.observe(|state| {
            state.source_texts = source_texts;
            state.datasets = datasets;
        });
    }

    /// Replace the five tracked fields from a persisted document (startup
    /// load). History is untouched.
    pub fn restore_tracked(&self, snapshot: Snapshot) {
        self.observe(|state| state.restore(snapshot));
    }

    /// Deep copy of the tracked fields, for persistence and export.
    pub fn tracked(&self) -> Snapshot {
        self.read(|state| state.snapshot())
    }

    /// Overlay imported entities onto the current collections. Additive:
    /// entities with matching ids are replaced, everything else is kept.
    /// One history entry covers the whole import.
    pub fn apply_import(
        &self,
        source_texts: Vec<SourceText>,
        datasets: Vec<Dataset>,
        settings: Option<AppSettings>,
    ) {
        self.mutate(|state| {
            for st in source_texts {
                state.source_texts.insert(st.id.clone(), st);
            }
            for ds in datasets {
                state.datasets.insert(ds.id.clone(), ds);
            }
            if let Some(settings) = settings {
                state.settings = settings;
            }
            Some(())
        });
    }

    // ── Error flag ──────────────────────────────────────────────────────

    pub fn set_error(&self, message: impl Into<String>) {
        self.observe(|state| state.last_error = Some(message.into()));
    }

    pub fn last_error(&self) -> Option<String> {
        self.read(|state| state.last_error.clone())
    }

    pub fn take_error(&self) -> Option<String> {
        self.observe(|state| state.last_error.take())
    }

    // ── Selectors ───────────────────────────────────────────────────────

    pub fn source_text(&self, id: &str) -> Option<SourceText> {
        self.read(|state| state.source_texts.get(id).cloned())
    }

    /// All source texts, ordered by creation time for stable listings.
    pub fn source_texts(&self) -> Vec<SourceText> {
        self.read(|state| {
            let mut all: Vec<SourceText> = state.source_texts.values().cloned().collect();
            all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            all
        })
    }

    pub fn source_text_count(&self) -> usize {
        self.read(|state| state.source_texts.len())
    }

    pub fn dataset(&self, id: &str) -> Option<Dataset> {
        self.read(|state| state.datasets.get(id).cloned())
    }

    pub fn datasets(&self) -> Vec<Dataset> {
        self.read(|state| {
            let mut all: Vec<Dataset> = state.datasets.values().cloned().collect();
            all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            all
        })
    }

    pub fn dataset_count(&self) -> usize {
        self.read(|state| state.datasets.len())
    }

    pub fn settings(&self) -> AppSettings {
        self.read(|state| state.settings.clone())
    }

    pub fn active_dataset_id(&self) -> Option<String> {
        self.read(|state| state.active_dataset_id.clone())
    }

    pub fn active_source_text_id(&self) -> Option<String> {
        self.read(|state| state.active_source_text_id.clone())
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Referential-integrity pass: drop dataset references to source texts
/// that no longer exist, and clear a dangling active-selection pointer.
fn prune_dangling_sources(state: &mut StoreState, now: DateTime<Utc>) {
    let StoreState {
        source_texts,
        datasets,
        active_source_text_id,
        ..
    } = state;
    for ds in datasets.values_mut() {
        let before = ds.source_ids.len();
        ds.source_ids.retain(|id| source_texts.contains_key(id));
        if ds.source_ids.len() != before {
            ds.updated_at = now;
        }
    }
    if let Some(active) = active_source_text_id.as_deref() {
        if !source_texts.contains_key(active) {
            *active_source_text_id = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn new_text(title: &str) -> NewSourceText {
        NewSourceText {
            title: title.to_string(),
            kind: SourceKind::Book,
            ..Default::default()
        }
    }

    #[test]
    fn test_add_then_double_undo_then_redo() {
        let store = EntityStore::new();
        let a = store.add_source_text(new_text("A"));
        store.add_source_text(new_text("B"));
        assert_eq!(store.source_text_count(), 2);

        assert!(store.undo());
        assert!(store.undo());
        assert_eq!(store.source_text_count(), 0);

        assert!(store.redo());
        assert_eq!(store.source_text_count(), 1);
        assert_eq!(store.source_text(&a).unwrap().title, "A");
    }

    #[test]
    fn test_update_unknown_id_is_noop_without_snapshot() {
        let store = EntityStore::new();
        let applied = store.update_source_text(
            "nope",
            SourceTextPatch {
                title: Some("x".to_string()),
                ..Default::default()
            },
        );
        assert!(!applied);
        assert_eq!(store.history_len(), 0);
        assert!(!store.can_undo());
    }

    #[test]
    fn test_delete_cascades_to_referencing_datasets_only() {
        let store = EntityStore::new();
        let a = store.add_source_text(new_text("A"));
        let b = store.add_source_text(new_text("B"));

        let d1 = store.create_dataset(NewDataset {
            name: "d1".to_string(),
            source_ids: vec![a.clone(), b.clone()],
            ..Default::default()
        });
        let d2 = store.create_dataset(NewDataset {
            name: "d2".to_string(),
            source_ids: vec![a.clone()],
            ..Default::default()
        });
        let d3 = store.create_dataset(NewDataset {
            name: "d3".to_string(),
            source_ids: vec![b.clone()],
            ..Default::default()
        });

        assert!(store.delete_source_text(&a));

        assert_eq!(store.dataset(&d1).unwrap().source_ids, vec![b.clone()]);
        assert!(store.dataset(&d2).unwrap().source_ids.is_empty());
        // d3 never referenced A and keeps its reference untouched.
        assert_eq!(store.dataset(&d3).unwrap().source_ids, vec![b]);
    }

    #[test]
    fn test_delete_clears_active_pointer() {
        let store = EntityStore::new();
        let a = store.add_source_text(new_text("A"));
        store.set_active_source_text(Some(a.clone()));
        store.delete_source_text(&a);
        assert_eq!(store.active_source_text_id(), None);
    }

    #[test]
    fn test_cascade_and_delete_undo_as_one_transaction() {
        let store = EntityStore::new();
        let a = store.add_source_text(new_text("A"));
        let d = store.create_dataset(NewDataset {
            name: "d".to_string(),
            source_ids: vec![a.clone()],
            ..Default::default()
        });

        store.delete_source_text(&a);
        assert!(store.dataset(&d).unwrap().source_ids.is_empty());

        assert!(store.undo());
        assert!(store.source_text(&a).is_some());
        assert_eq!(store.dataset(&d).unwrap().source_ids, vec![a]);
    }

    #[test]
    fn test_update_dataset_merges_patch_and_skips_unknown_id() {
        let store = EntityStore::new();
        let d = store.create_dataset(NewDataset {
            name: "d".to_string(),
            ..Default::default()
        });

        assert!(store.update_dataset(
            &d,
            DatasetPatch {
                name: Some("renamed".to_string()),
                description: Some(Some("epic poetry".to_string())),
                ..Default::default()
            },
        ));
        let ds = store.dataset(&d).unwrap();
        assert_eq!(ds.name, "renamed");
        assert_eq!(ds.description.as_deref(), Some("epic poetry"));

        assert!(!store.update_dataset("ghost", DatasetPatch::default()));
        // Create and rename each pushed one entry; the miss pushed none.
        assert_eq!(store.history_len(), 2);
    }

    #[test]
    fn test_delete_dataset_clears_active_pointer_and_is_undoable() {
        let store = EntityStore::new();
        let d = store.create_dataset(NewDataset {
            name: "d".to_string(),
            ..Default::default()
        });
        store.set_active_dataset(Some(d.clone()));

        assert!(store.delete_dataset(&d));
        assert!(store.dataset(&d).is_none());
        assert_eq!(store.active_dataset_id(), None);
        assert!(!store.delete_dataset(&d));

        assert!(store.undo());
        assert_eq!(store.dataset(&d).unwrap().name, "d");
    }

    #[test]
    fn test_remove_source_from_dataset_noop_without_membership() {
        let store = EntityStore::new();
        let a = store.add_source_text(new_text("A"));
        let d = store.create_dataset(NewDataset {
            name: "d".to_string(),
            source_ids: vec![a.clone()],
            ..Default::default()
        });
        let before = store.history_len();

        assert!(!store.remove_source_from_dataset(&d, "ghost"));
        assert!(!store.remove_source_from_dataset("ghost", &a));
        assert_eq!(store.history_len(), before);

        assert!(store.remove_source_from_dataset(&d, &a));
        assert!(store.dataset(&d).unwrap().source_ids.is_empty());
        // The reference went away; the source text itself stays.
        assert!(store.source_text(&a).is_some());
        assert_eq!(store.history_len(), before + 1);
    }

    #[test]
    fn test_add_source_to_dataset_rejects_duplicates_and_unknowns() {
        let store = EntityStore::new();
        let a = store.add_source_text(new_text("A"));
        let d = store.create_dataset(NewDataset {
            name: "d".to_string(),
            ..Default::default()
        });

        assert!(store.add_source_to_dataset(&d, &a));
        assert!(!store.add_source_to_dataset(&d, &a));
        assert!(!store.add_source_to_dataset(&d, "ghost"));
        assert!(!store.add_source_to_dataset("ghost", &a));
        assert_eq!(store.dataset(&d).unwrap().source_ids.len(), 1);
    }

    #[test]
    fn test_status_flip_bypasses_history() {
        let store = EntityStore::new();
        let a = store.add_source_text(new_text("A"));
        let before = store.history_len();

        store.set_source_text_status(&a, ProcessingStatus::Processing);
        store.set_source_text_status(&a, ProcessingStatus::Completed);

        assert_eq!(store.history_len(), before);
        assert_eq!(
            store.source_text(&a).unwrap().status,
            ProcessingStatus::Completed
        );

        // Undoing the add removes the entity entirely; the status flips
        // were never separate history entries.
        assert!(store.undo());
        assert!(store.source_text(&a).is_none());
    }

    #[test]
    fn test_update_dataset_chunks_recomputes_aggregates() {
        let store = EntityStore::new();
        let a = store.add_source_text(new_text("A"));
        let d = store.create_dataset(NewDataset {
            name: "d".to_string(),
            source_ids: vec![a.clone()],
            ..Default::default()
        });

        let chunks = vec![
            TextChunk::from_content(&a, 0, "alpha beta gamma".to_string()),
            TextChunk::from_content(&a, 1, "delta".to_string()),
        ];
        assert!(store.update_dataset_chunks(&d, chunks));

        let ds = store.dataset(&d).unwrap();
        assert_eq!(ds.metadata.total_chunks, 2);
        assert_eq!(ds.metadata.total_words, 4);
    }

    #[test]
    fn test_history_window_stays_bounded() {
        let store = EntityStore::with_history_capacity(10);
        for i in 0..100 {
            store.add_source_text(new_text(&format!("t{}", i)));
            assert!(store.history_len() <= 10);
        }
    }

    #[test]
    fn test_new_mutation_invalidates_redo() {
        let store = EntityStore::new();
        store.add_source_text(new_text("A"));
        store.add_source_text(new_text("B"));
        store.undo();
        assert!(store.can_redo());

        store.add_source_text(new_text("C"));
        assert!(!store.can_redo());
        assert!(!store.redo());
    }

    #[test]
    fn test_active_selection_not_undoable() {
        let store = EntityStore::new();
        let a = store.add_source_text(new_text("A"));
        store.set_active_source_text(Some(a.clone()));
        store.undo();
        // The add was undone; the pointer write never entered history.
        assert_eq!(store.history_len(), 1);
        assert!(store.can_redo());
    }
}
