//! Backend contract: the trait the host application implements to connect
//! the state engine to its processing backend, plus the wire-format types
//! and the pure conversions between wire and in-memory shapes.
//!
//! The wire format differs from the in-memory shape in two ways only:
//! field naming (snake_case on the wire, camelCase in the state file) and
//! status representation (an internally-tagged union on the wire, a flat
//! enum plus a detail field in memory). Conversion is total and invertible
//! in both directions.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`list_source_texts`](Backend::list_source_texts) | Authoritative source text listing |
//! | [`list_datasets`](Backend::list_datasets) | Authoritative dataset listing |
//! | [`save_source_text`](Backend::save_source_text) | Idempotent upsert of one source text |
//! | [`save_dataset`](Backend::save_dataset) | Idempotent upsert of one dataset |
//! | [`get_settings`](Backend::get_settings) | Remote settings copy, if any |
//! | [`save_settings`](Backend::save_settings) | Persist settings; gates the local commit |
//! | [`process_source_text`](Backend::process_source_text) | Long-running document processing |
//! | [`generate_dataset`](Backend::generate_dataset) | Long-running dataset generation |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    ChunkMetadata, ChunkRelation, ChunkingStrategy, Dataset, DatasetMetadata, DatasetStatus,
    ExportConfig, ProcessingStatus, SourceKind, SourceLocation, SourceText, SourceTextMetadata,
    TextChunk,
};
use crate::settings::AppSettings;

/// Wire representation of a source text's processing status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WireProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed {
        #[serde(default)]
        error: Option<String>,
    },
}

/// Wire representation of a dataset's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WireDatasetStatus {
    Draft,
    Processing,
    Ready,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSourceText {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    pub language: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub location: Option<SourceLocation>,
    #[serde(default)]
    pub metadata: SourceTextMetadata,
    pub status: WireProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTextChunk {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub relations: Vec<ChunkRelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDataset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub chunks: Vec<WireTextChunk>,
    #[serde(default)]
    pub metadata: DatasetMetadata,
    pub status: WireDatasetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of persisting settings on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSettingsAck {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of a document processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub char_count: u64,
}

/// Result of a dataset generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub chunks: Vec<WireTextChunk>,
}

/// The external authoritative backend.
///
/// Implementations must be `Send + Sync`; the sync service shares one
/// instance behind an `Arc`. Every method is a single logical request
/// with no client-side timeout or cancellation.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_source_texts(&self) -> Result<Vec<WireSourceText>>;

    async fn list_datasets(&self) -> Result<Vec<WireDataset>>;

    /// Idempotent upsert keyed on the wire id.
    async fn save_source_text(&self, text: &WireSourceText) -> Result<()>;

    /// Idempotent upsert keyed on the wire id.
    async fn save_dataset(&self, dataset: &WireDataset) -> Result<()>;

    /// `None` means the backend has no settings stored; use defaults.
    async fn get_settings(&self) -> Result<Option<AppSettings>>;

    async fn save_settings(&self, settings: &AppSettings) -> Result<SaveSettingsAck>;

    async fn process_source_text(
        &self,
        id: &str,
        strategy: Option<ChunkingStrategy>,
    ) -> Result<ProcessOutcome>;

    async fn generate_dataset(&self, id: &str, export: &ExportConfig) -> Result<GenerateOutcome>;
}

// ── Conversions ─────────────────────────────────────────────────────────

impl From<&SourceText> for WireSourceText {
    fn from(st: &SourceText) -> Self {
        let status = match st.status {
            ProcessingStatus::Pending => WireProcessingStatus::Pending,
            ProcessingStatus::Processing => WireProcessingStatus::Processing,
            ProcessingStatus::Completed => WireProcessingStatus::Completed,
            ProcessingStatus::Failed => WireProcessingStatus::Failed {
                error: st.processing_error.clone(),
            },
        };
        Self {
            id: st.id.clone(),
            title: st.title.clone(),
            author: st.author.clone(),
            language: st.language.clone(),
            kind: st.kind,
            location: st.location.clone(),
            metadata: st.metadata.clone(),
            status,
            created_at: st.created_at,
            updated_at: st.updated_at,
        }
    }
}

impl From<WireSourceText> for SourceText {
    fn from(wire: WireSourceText) -> Self {
        let (status, processing_error) = match wire.status {
            WireProcessingStatus::Pending => (ProcessingStatus::Pending, None),
            WireProcessingStatus::Processing => (ProcessingStatus::Processing, None),
            WireProcessingStatus::Completed => (ProcessingStatus::Completed, None),
            WireProcessingStatus::Failed { error } => (ProcessingStatus::Failed, error),
        };
        Self {
            id: wire.id,
            title: wire.title,
            author: wire.author,
            language: wire.language,
            kind: wire.kind,
            location: wire.location,
            metadata: wire.metadata,
            status,
            processing_error,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        }
    }
}

impl From<&TextChunk> for WireTextChunk {
    fn from(chunk: &TextChunk) -> Self {
        Self {
            id: chunk.id.clone(),
            content: chunk.content.clone(),
            metadata: chunk.metadata.clone(),
            weight: chunk.weight,
            relations: chunk.relations.clone(),
        }
    }
}

impl From<WireTextChunk> for TextChunk {
    fn from(wire: WireTextChunk) -> Self {
        Self {
            id: wire.id,
            content: wire.content,
            metadata: wire.metadata,
            weight: wire.weight,
            relations: wire.relations,
        }
    }
}

impl From<&Dataset> for WireDataset {
    fn from(ds: &Dataset) -> Self {
        let status = match ds.status {
            DatasetStatus::Draft => WireDatasetStatus::Draft,
            DatasetStatus::Processing => WireDatasetStatus::Processing,
            DatasetStatus::Ready => WireDatasetStatus::Ready,
            DatasetStatus::Archived => WireDatasetStatus::Archived,
        };
        Self {
            id: ds.id.clone(),
            name: ds.name.clone(),
            description: ds.description.clone(),
            source_ids: ds.source_ids.clone(),
            chunks: ds.chunks.iter().map(WireTextChunk::from).collect(),
            metadata: ds.metadata.clone(),
            status,
            created_at: ds.created_at,
            updated_at: ds.updated_at,
        }
    }
}

impl From<WireDataset> for Dataset {
    fn from(wire: WireDataset) -> Self {
        let status = match wire.status {
            WireDatasetStatus::Draft => DatasetStatus::Draft,
            WireDatasetStatus::Processing => DatasetStatus::Processing,
            WireDatasetStatus::Ready => DatasetStatus::Ready,
            WireDatasetStatus::Archived => DatasetStatus::Archived,
        };
        Self {
            id: wire.id,
            name: wire.name,
            description: wire.description,
            source_ids: wire.source_ids,
            chunks: wire.chunks.into_iter().map(TextChunk::from).collect(),
            metadata: wire.metadata,
            status,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        }
    }
}
