//! In-memory [`Backend`] implementation for tests and the demo CLI.
//!
//! Stores wire-format entities behind `std::sync::RwLock` and fabricates
//! deterministic processing results. Failure injection flags and call
//! counters let tests drive the error paths and verify call absence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{ChunkingStrategy, ExportConfig, TextChunk};
use crate::settings::AppSettings;

use super::{
    Backend, GenerateOutcome, ProcessOutcome, SaveSettingsAck, WireDataset, WireSourceText,
    WireTextChunk,
};

/// In-memory backend for tests and local demos.
#[derive(Default)]
pub struct InMemoryBackend {
    source_texts: RwLock<HashMap<String, WireSourceText>>,
    datasets: RwLock<HashMap<String, WireDataset>>,
    settings: RwLock<Option<AppSettings>>,

    fail_saves: AtomicBool,
    fail_settings: AtomicBool,
    fail_processing: AtomicBool,
    process_delay: RwLock<Option<Duration>>,

    save_calls: AtomicUsize,
    process_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent entity saves fail.
    pub fn fail_saves(&self, on: bool) {
        self.fail_saves.store(on, Ordering::SeqCst);
    }

    /// Make subsequent settings saves report failure.
    pub fn fail_settings(&self, on: bool) {
        self.fail_settings.store(on, Ordering::SeqCst);
    }

    /// Make subsequent processing/generation runs report failure.
    pub fn fail_processing(&self, on: bool) {
        self.fail_processing.store(on, Ordering::SeqCst);
    }

    /// Delay processing/generation responses, to exercise in-flight
    /// interleavings under `tokio::time::pause`.
    pub fn set_process_delay(&self, delay: Option<Duration>) {
        *self.process_delay.write().unwrap() = delay;
    }

    /// Number of entity save calls received (source texts + datasets).
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }

    pub fn source_text_count(&self) -> usize {
        self.source_texts.read().unwrap().len()
    }

    pub fn dataset_count(&self) -> usize {
        self.datasets.read().unwrap().len()
    }

    /// Seed an entity directly, as if another client had pushed it.
    pub fn seed_source_text(&self, text: WireSourceText) {
        self.source_texts
            .write()
            .unwrap()
            .insert(text.id.clone(), text);
    }

    pub fn seed_dataset(&self, dataset: WireDataset) {
        self.datasets
            .write()
            .unwrap()
            .insert(dataset.id.clone(), dataset);
    }

    async fn maybe_delay(&self) {
        let delay = *self.process_delay.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn list_source_texts(&self) -> Result<Vec<WireSourceText>> {
        Ok(self.source_texts.read().unwrap().values().cloned().collect())
    }

    async fn list_datasets(&self) -> Result<Vec<WireDataset>> {
        Ok(self.datasets.read().unwrap().values().cloned().collect())
    }

    async fn save_source_text(&self, text: &WireSourceText) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("backend unavailable");
        }
        self.source_texts
            .write()
            .unwrap()
            .insert(text.id.clone(), text.clone());
        Ok(())
    }

    async fn save_dataset(&self, dataset: &WireDataset) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("backend unavailable");
        }
        self.datasets
            .write()
            .unwrap()
            .insert(dataset.id.clone(), dataset.clone());
        Ok(())
    }

    async fn get_settings(&self) -> Result<Option<AppSettings>> {
        Ok(self.settings.read().unwrap().clone())
    }

    async fn save_settings(&self, settings: &AppSettings) -> Result<SaveSettingsAck> {
        if self.fail_settings.load(Ordering::SeqCst) {
            return Ok(SaveSettingsAck {
                success: false,
                error: Some("settings store rejected the write".to_string()),
            });
        }
        *self.settings.write().unwrap() = Some(settings.clone());
        Ok(SaveSettingsAck {
            success: true,
            error: None,
        })
    }

    async fn process_source_text(
        &self,
        id: &str,
        _strategy: Option<ChunkingStrategy>,
    ) -> Result<ProcessOutcome> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        if self.fail_processing.load(Ordering::SeqCst) {
            return Ok(ProcessOutcome {
                success: false,
                error: Some(format!("processing failed for {}", id)),
                word_count: 0,
                char_count: 0,
            });
        }
        // Fabricate counts from the stored title so results are
        // deterministic without real document content.
        let title = self
            .source_texts
            .read()
            .unwrap()
            .get(id)
            .map(|t| t.title.clone())
            .unwrap_or_default();
        Ok(ProcessOutcome {
            success: true,
            error: None,
            word_count: title.split_whitespace().count() as u64,
            char_count: title.chars().count() as u64,
        })
    }

    async fn generate_dataset(&self, id: &str, _export: &ExportConfig) -> Result<GenerateOutcome> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        if self.fail_processing.load(Ordering::SeqCst) {
            return Ok(GenerateOutcome {
                success: false,
                error: Some(format!("generation failed for {}", id)),
                chunks: Vec::new(),
            });
        }
        let (source_ids, titles) = {
            let datasets = self.datasets.read().unwrap();
            let texts = self.source_texts.read().unwrap();
            let source_ids = datasets
                .get(id)
                .map(|d| d.source_ids.clone())
                .unwrap_or_default();
            let titles: Vec<String> = source_ids
                .iter()
                .map(|sid| {
                    texts
                        .get(sid)
                        .map(|t| t.title.clone())
                        .unwrap_or_else(|| sid.clone())
                })
                .collect();
            (source_ids, titles)
        };
        let chunks = source_ids
            .iter()
            .zip(titles)
            .enumerate()
            .map(|(i, (sid, title))| {
                WireTextChunk::from(&TextChunk::from_content(sid, i as u64, title))
            })
            .collect();
        Ok(GenerateOutcome {
            success: true,
            error: None,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSourceText, SourceText};
    use chrono::Utc;

    fn wire_text(title: &str) -> WireSourceText {
        let st = SourceText::from_new(
            NewSourceText {
                title: title.to_string(),
                ..Default::default()
            },
            Utc::now(),
        );
        WireSourceText::from(&st)
    }

    #[tokio::test]
    async fn test_save_is_idempotent_upsert() {
        let backend = InMemoryBackend::new();
        let text = wire_text("A");
        backend.save_source_text(&text).await.unwrap();
        backend.save_source_text(&text).await.unwrap();
        assert_eq!(backend.source_text_count(), 1);
        assert_eq!(backend.save_calls(), 2);
    }

    #[tokio::test]
    async fn test_fail_saves_counts_attempts() {
        let backend = InMemoryBackend::new();
        backend.fail_saves(true);
        let err = backend.save_source_text(&wire_text("A")).await;
        assert!(err.is_err());
        assert_eq!(backend.save_calls(), 1);
        assert_eq!(backend.source_text_count(), 0);
    }

    #[tokio::test]
    async fn test_process_reports_failure_without_erroring() {
        let backend = InMemoryBackend::new();
        backend.fail_processing(true);
        let outcome = backend.process_source_text("x", None).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }
}
