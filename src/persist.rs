//! Durable persistence: the application state file and the portable
//! export/import format.
//!
//! The state file is a single camelCase JSON document holding the five
//! tracked fields, written in full on every save. Saving is best-effort
//! (typically fired from an exit hook): a failure sets the store's global
//! error flag and logs, but never raises. Loading silently falls back to
//! defaults — a missing file is the expected first-run case.
//!
//! Export adds a format version and timestamp on top of the same fields.
//! Import is additive: entities are overlaid by id onto the existing
//! collections under a single history entry, and malformed input is a
//! visible error because importing is a deliberate user action.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::history::Snapshot;
use crate::models::{Dataset, SourceText};
use crate::settings::{check_settings, AppSettings};
use crate::store::EntityStore;

/// Version string written into every export document.
pub const EXPORT_FORMAT_VERSION: &str = "1.0.0";

/// On-disk layout of the state file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub source_texts: HashMap<String, SourceText>,
    pub datasets: HashMap<String, Dataset>,
    pub settings: AppSettings,
    pub active_dataset_id: Option<String>,
    pub active_source_text_id: Option<String>,
}

impl From<Snapshot> for PersistedState {
    fn from(snap: Snapshot) -> Self {
        Self {
            source_texts: snap.source_texts,
            datasets: snap.datasets,
            settings: snap.settings,
            active_dataset_id: snap.active_dataset_id,
            active_source_text_id: snap.active_source_text_id,
        }
    }
}

impl From<PersistedState> for Snapshot {
    fn from(state: PersistedState) -> Self {
        Self {
            source_texts: state.source_texts,
            datasets: state.datasets,
            settings: state.settings,
            active_dataset_id: state.active_dataset_id,
            active_source_text_id: state.active_source_text_id,
        }
    }
}

/// Portable export envelope. Unknown fields in imported documents are
/// ignored; missing optional fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub source_texts: HashMap<String, SourceText>,
    #[serde(default)]
    pub datasets: HashMap<String, Dataset>,
    #[serde(default)]
    pub settings: Option<AppSettings>,
}

/// Well-known location of the state file.
pub fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("corpus-studio")
        .join("state.json")
}

/// Serialize the tracked state to `path`, overwriting any previous file.
///
/// Best-effort: failures are recorded on the store's error flag and
/// logged, never raised.
pub fn save_state(store: &EntityStore, path: &Path) {
    let state = PersistedState::from(store.tracked());
    if let Err(e) = write_state_file(&state, path) {
        warn!(path = %path.display(), error = %e, "state save failed");
        store.set_error(format!("save failed: {}", e));
    }
}

fn write_state_file(state: &PersistedState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Read the state file and replace in-memory state (history untouched).
///
/// Returns `true` if a file was loaded. Any failure — missing file,
/// malformed JSON — leaves the store on defaults and is logged at debug
/// level only, since this path is expected to fail on first run.
pub fn load_state(store: &EntityStore, path: &Path) -> bool {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no state file loaded");
            return false;
        }
    };
    match serde_json::from_str::<PersistedState>(&content) {
        Ok(state) => {
            store.restore_tracked(Snapshot::from(state));
            true
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "state file unreadable, using defaults");
            false
        }
    }
}

/// Build a portable export of the current state.
pub fn export_state(store: &EntityStore) -> ExportDocument {
    let snap = store.tracked();
    ExportDocument {
        version: EXPORT_FORMAT_VERSION.to_string(),
        exported_at: Utc::now(),
        source_texts: snap.source_texts,
        datasets: snap.datasets,
        settings: Some(snap.settings),
    }
}

pub fn export_json(store: &EntityStore) -> Result<String> {
    serde_json::to_string_pretty(&export_state(store)).context("serializing export")
}

/// What an import changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub source_texts: usize,
    pub datasets: usize,
}

/// Merge an export document into the store.
///
/// Additive: entities with matching ids are overlaid, everything else is
/// kept. One history entry covers the whole import. Malformed input sets
/// the global error flag and re-raises — import is a deliberate user
/// action and should visibly fail. Unparseable JSON and a settings record
/// that fails validation are both treated as malformed; nothing from the
/// document is committed in either case.
pub fn import_state(store: &EntityStore, json: &str) -> Result<ImportSummary> {
    let doc: ExportDocument = match serde_json::from_str(json) {
        Ok(doc) => doc,
        Err(e) => {
            store.set_error(format!("import failed: {}", e));
            return Err(anyhow::Error::from(e).context("parsing import document"));
        }
    };
    if let Some(settings) = &doc.settings {
        if let Err(e) = check_settings(settings) {
            store.set_error(format!("import failed: {}", e));
            return Err(anyhow::Error::from(e).context("validating imported settings"));
        }
    }
    let summary = ImportSummary {
        source_texts: doc.source_texts.len(),
        datasets: doc.datasets.len(),
    };
    store.apply_import(
        doc.source_texts.into_values().collect(),
        doc.datasets.into_values().collect(),
        doc.settings,
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewDataset, NewSourceText};
    use tempfile::TempDir;

    fn store_with_entities() -> (EntityStore, String, String) {
        let store = EntityStore::new();
        let text_id = store.add_source_text(NewSourceText {
            title: "Iliad".to_string(),
            ..Default::default()
        });
        let dataset_id = store.create_dataset(NewDataset {
            name: "epic".to_string(),
            source_ids: vec![text_id.clone()],
            ..Default::default()
        });
        (store, text_id, dataset_id)
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("state.json");
        let (store, text_id, dataset_id) = store_with_entities();
        store.set_active_dataset(Some(dataset_id.clone()));

        save_state(&store, &path);
        assert_eq!(store.last_error(), None);

        let restored = EntityStore::new();
        assert!(load_state(&restored, &path));
        assert_eq!(restored.source_text(&text_id).unwrap().title, "Iliad");
        assert_eq!(restored.dataset(&dataset_id).unwrap().name, "epic");
        assert_eq!(restored.active_dataset_id(), Some(dataset_id));
        // Loading is not an undoable action.
        assert!(!restored.can_undo());
    }

    #[test]
    fn test_load_missing_file_falls_back_silently() {
        let tmp = TempDir::new().unwrap();
        let store = EntityStore::new();
        assert!(!load_state(&store, &tmp.path().join("absent.json")));
        assert_eq!(store.last_error(), None);
        assert_eq!(store.source_text_count(), 0);
    }

    #[test]
    fn test_load_malformed_file_falls_back_silently() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = EntityStore::new();
        assert!(!load_state(&store, &path));
        assert_eq!(store.last_error(), None);
    }

    #[test]
    fn test_save_failure_sets_error_flag_without_raising() {
        let tmp = TempDir::new().unwrap();
        // A directory at the target path makes the write fail.
        let path = tmp.path().join("state.json");
        std::fs::create_dir_all(&path).unwrap();
        let (store, _, _) = store_with_entities();

        save_state(&store, &path);
        assert!(store.last_error().unwrap().contains("save failed"));
    }

    #[test]
    fn test_export_import_round_trip_on_fresh_store() {
        let (store, text_id, dataset_id) = store_with_entities();
        let json = export_json(&store).unwrap();

        let fresh = EntityStore::new();
        let summary = import_state(&fresh, &json).unwrap();
        assert_eq!(summary.source_texts, 1);
        assert_eq!(summary.datasets, 1);
        assert_eq!(
            fresh.source_text(&text_id).unwrap(),
            store.source_text(&text_id).unwrap()
        );
        assert_eq!(
            fresh.dataset(&dataset_id).unwrap(),
            store.dataset(&dataset_id).unwrap()
        );
    }

    #[test]
    fn test_import_is_additive_and_undoable_as_one_step() {
        let (exporter, text_id, _) = store_with_entities();
        let json = export_json(&exporter).unwrap();

        let target = EntityStore::new();
        let kept_id = target.add_source_text(NewSourceText {
            title: "Kept".to_string(),
            ..Default::default()
        });
        import_state(&target, &json).unwrap();
        assert_eq!(target.source_text_count(), 2);
        assert!(target.source_text(&kept_id).is_some());

        // One undo removes the whole import, not half of it.
        assert!(target.undo());
        assert_eq!(target.source_text_count(), 1);
        assert!(target.source_text(&text_id).is_none());
    }

    #[test]
    fn test_import_malformed_sets_error_and_raises() {
        let store = EntityStore::new();
        let err = import_state(&store, "{broken");
        assert!(err.is_err());
        assert!(store.last_error().unwrap().contains("import failed"));
        assert!(!store.can_undo());
    }

    #[test]
    fn test_import_rejects_settings_breaking_sync_interval_floor() {
        let store = EntityStore::new();
        let json = format!(
            r#"{{"version": "1.0.0", "exportedAt": "{}", "settings": {{"cloudSync": {{"intervalMinutes": 0}}}}}}"#,
            Utc::now().to_rfc3339()
        );
        assert!(import_state(&store, &json).is_err());
        assert!(store.last_error().unwrap().contains("import failed"));
        // Nothing committed: defaults stand, and later patches still merge
        // over a valid current value.
        assert!(store.settings().cloud_sync.interval_minutes >= 1);
        assert!(!store.can_undo());
    }

    #[test]
    fn test_import_tolerates_unknown_and_missing_fields() {
        let store = EntityStore::new();
        let json = format!(
            r#"{{"version": "1.0.0", "exportedAt": "{}", "futureField": 42}}"#,
            Utc::now().to_rfc3339()
        );
        let summary = import_state(&store, &json).unwrap();
        assert_eq!(summary.source_texts, 0);
        assert_eq!(summary.datasets, 0);
    }

    #[test]
    fn test_export_document_carries_version_and_timestamp() {
        let (store, _, _) = store_with_entities();
        let json = export_json(&store).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], EXPORT_FORMAT_VERSION);
        assert!(value.get("exportedAt").is_some());
        assert!(value["sourceTexts"].is_object());
    }
}
