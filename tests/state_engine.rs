//! End-to-end tests over the store, history, settings path, and
//! persistence working together.

use std::sync::Arc;

use tempfile::TempDir;

use corpus_studio::backend::memory::InMemoryBackend;
use corpus_studio::backend::Backend;
use corpus_studio::error::SettingsError;
use corpus_studio::models::{NewDataset, NewSourceText};
use corpus_studio::persist;
use corpus_studio::settings::{CloudSyncConfig, SettingsPatch, Theme};
use corpus_studio::store::EntityStore;

fn add_text(store: &EntityStore, title: &str) -> String {
    store.add_source_text(NewSourceText {
        title: title.to_string(),
        ..Default::default()
    })
}

#[test]
fn add_two_undo_twice_redo_once() {
    let store = EntityStore::new();
    let a = add_text(&store, "A");
    add_text(&store, "B");

    assert!(store.undo());
    assert!(store.undo());
    assert_eq!(store.source_text_count(), 0);
    assert!(!store.undo());

    assert!(store.redo());
    assert_eq!(store.source_text_count(), 1);
    assert_eq!(store.source_text(&a).unwrap().title, "A");
}

#[test]
fn undo_redo_round_trip_restores_structural_equality() {
    let store = EntityStore::new();
    let a = add_text(&store, "A");
    let d = store.create_dataset(NewDataset {
        name: "d".to_string(),
        source_ids: vec![a.clone()],
        ..Default::default()
    });
    store.delete_source_text(&a);

    let before_undo = store.tracked();
    assert!(store.undo());
    assert!(store.redo());
    let after_redo = store.tracked();
    assert_eq!(before_undo, after_redo);
    assert!(store.dataset(&d).unwrap().source_ids.is_empty());
}

#[test]
fn history_never_exceeds_capacity_across_mixed_mutations() {
    let store = EntityStore::with_history_capacity(50);
    let mut ids = Vec::new();
    for i in 0..40 {
        ids.push(add_text(&store, &format!("t{}", i)));
    }
    for id in &ids {
        store.update_source_text(
            id,
            corpus_studio::models::SourceTextPatch {
                language: Some("grc".to_string()),
                ..Default::default()
            },
        );
        assert!(store.history_len() <= 50);
    }
    for id in &ids {
        store.delete_source_text(id);
        assert!(store.history_len() <= 50);
    }
    assert_eq!(store.history_len(), 50);
}

#[tokio::test]
async fn settings_validation_failure_touches_nothing() {
    let store = EntityStore::new();
    let backend = InMemoryBackend::new();
    add_text(&store, "A");
    let settings_before = store.settings();
    let history_before = store.history_len();

    let patch = SettingsPatch {
        cloud_sync: Some(CloudSyncConfig {
            interval_minutes: 0,
            ..Default::default()
        }),
        ..Default::default()
    };
    let err = store.update_settings(patch, &backend).await.unwrap_err();
    assert!(matches!(err, SettingsError::Validation(_)));

    assert_eq!(store.settings(), settings_before);
    assert_eq!(store.history_len(), history_before);
    // Nothing reached the backend either.
    assert_eq!(backend.get_settings().await.unwrap(), None);
}

#[tokio::test]
async fn settings_backend_refusal_leaves_local_copy() {
    let store = EntityStore::new();
    let backend = InMemoryBackend::new();
    backend.fail_settings(true);
    let settings_before = store.settings();

    let patch = SettingsPatch {
        theme: Some(Theme::Dark),
        ..Default::default()
    };
    let err = store.update_settings(patch, &backend).await.unwrap_err();
    assert!(matches!(err, SettingsError::Backend(_)));
    assert_eq!(store.settings(), settings_before);
    assert!(!store.can_undo());
}

#[tokio::test]
async fn settings_commit_is_atomic_across_both_copies_and_undoable() {
    let store = EntityStore::new();
    let backend = InMemoryBackend::new();

    let patch = SettingsPatch {
        theme: Some(Theme::Dark),
        ..Default::default()
    };
    let committed = store.update_settings(patch, &backend).await.unwrap();
    assert_eq!(committed.theme, Theme::Dark);
    assert_eq!(store.settings().theme, Theme::Dark);
    assert_eq!(
        backend.get_settings().await.unwrap().unwrap().theme,
        Theme::Dark
    );

    // The local commit is a user-intent mutation.
    assert!(store.undo());
    assert_eq!(store.settings().theme, Theme::System);
}

#[test]
fn state_file_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("state.json");

    let store = Arc::new(EntityStore::new());
    let a = add_text(&store, "Iliad");
    let d = store.create_dataset(NewDataset {
        name: "epics".to_string(),
        source_ids: vec![a.clone()],
        ..Default::default()
    });
    store.set_active_dataset(Some(d.clone()));
    persist::save_state(&store, &path);

    // Simulated restart: fresh store, fresh history.
    let reborn = EntityStore::new();
    assert!(persist::load_state(&reborn, &path));
    assert_eq!(reborn.source_text(&a), store.source_text(&a));
    assert_eq!(reborn.dataset(&d), store.dataset(&d));
    assert_eq!(reborn.active_dataset_id(), Some(d));
    // History does not survive restarts.
    assert!(!reborn.can_undo());
}

#[test]
fn export_import_reproduces_collections_on_fresh_store() {
    let store = EntityStore::new();
    let a = add_text(&store, "A");
    let b = add_text(&store, "B");
    let d = store.create_dataset(NewDataset {
        name: "both".to_string(),
        source_ids: vec![a.clone(), b.clone()],
        ..Default::default()
    });

    let json = persist::export_json(&store).unwrap();
    let fresh = EntityStore::new();
    persist::import_state(&fresh, &json).unwrap();

    assert_eq!(fresh.source_text_count(), 2);
    assert_eq!(fresh.source_text(&a), store.source_text(&a));
    assert_eq!(fresh.source_text(&b), store.source_text(&b));
    assert_eq!(fresh.dataset(&d), store.dataset(&d));
}
