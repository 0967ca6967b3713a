//! Core data models used throughout Corpus Studio.
//!
//! These types represent the source texts, datasets, and chunks that flow
//! through the preparation pipeline, plus the small metadata records hanging
//! off each of them. All of them serialize to camelCase JSON, which is the
//! shape used by the state file and the export format (the backend wire
//! format lives in [`crate::backend`] and is converted at that boundary).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of where a source text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Book,
    Article,
    Manuscript,
    Scripture,
    #[default]
    Other,
}

/// Processing lifecycle of a source text.
///
/// Transitions to `Processing`/`Completed`/`Failed` are driven by the sync
/// service and do not participate in undo history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Where the raw text of a source lives, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceLocation {
    Path(String),
    Url(String),
}

/// Counts, tags, and free-form fields attached to a source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceTextMetadata {
    pub word_count: Option<u64>,
    pub char_count: Option<u64>,
    pub page_count: Option<u64>,
    pub tags: Vec<String>,
    pub custom: BTreeMap<String, serde_json::Value>,
}

/// A single input document, owned exclusively by the entity store.
///
/// Datasets reference source texts by id and never own them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceText {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    /// BCP-47-ish language code, e.g. "en" or "grc".
    pub language: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub location: Option<SourceLocation>,
    #[serde(default)]
    pub metadata: SourceTextMetadata,
    pub status: ProcessingStatus,
    /// Failure detail from the backend; only present when `status` is
    /// [`ProcessingStatus::Failed`].
    #[serde(default)]
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for creating a source text.
///
/// Id, timestamps, and initial status are generated by the store.
#[derive(Debug, Clone, Default)]
pub struct NewSourceText {
    pub title: String,
    pub author: Option<String>,
    pub language: Option<String>,
    pub kind: SourceKind,
    pub location: Option<SourceLocation>,
    pub metadata: SourceTextMetadata,
}

/// Partial update to a source text. `None` fields are left untouched.
///
/// Optional-valued fields use a double `Option`: the outer layer is
/// "present in the patch", the inner is the new value.
#[derive(Debug, Clone, Default)]
pub struct SourceTextPatch {
    pub title: Option<String>,
    pub author: Option<Option<String>>,
    pub language: Option<String>,
    pub kind: Option<SourceKind>,
    pub location: Option<Option<SourceLocation>>,
    pub metadata: Option<SourceTextMetadata>,
}

/// Dataset lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatasetStatus {
    #[default]
    Draft,
    Processing,
    Ready,
    Archived,
}

/// How a source text gets segmented into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ChunkingStrategy {
    #[default]
    Paragraph,
    Sentence,
    FixedSize {
        max_words: u32,
    },
    Semantic,
}

/// Output format carried on datasets and in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Jsonl,
    Json,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub include_metadata: bool,
    pub include_relations: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Jsonl,
            include_metadata: true,
            include_relations: false,
        }
    }
}

/// Aggregate metadata recomputed whenever a dataset's chunks change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetMetadata {
    pub total_chunks: u64,
    pub total_words: u64,
    pub languages: Vec<String>,
    pub chunking: ChunkingStrategy,
    pub export: ExportConfig,
}

/// A derived corpus aggregating an ordered set of source texts.
///
/// Invariant: every id in `source_ids` references an existing source text;
/// the store's referential-integrity pass maintains this on deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub chunks: Vec<TextChunk>,
    #[serde(default)]
    pub metadata: DatasetMetadata,
    pub status: DatasetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for creating a dataset.
#[derive(Debug, Clone, Default)]
pub struct NewDataset {
    pub name: String,
    pub description: Option<String>,
    pub source_ids: Vec<String>,
    pub metadata: DatasetMetadata,
}

/// Partial update to a dataset. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct DatasetPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub metadata: Option<DatasetMetadata>,
    pub status: Option<DatasetStatus>,
}

/// Semantic role of a chunk within its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    #[default]
    Body,
    Heading,
    Quote,
    Footnote,
    Verse,
}

/// Typed link from one chunk to another, with a strength in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRelation {
    pub target_chunk_id: String,
    pub kind: RelationKind,
    pub strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Continuation,
    Reference,
    Commentary,
    Translation,
}

/// Position of a chunk within its originating source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkPosition {
    pub index: u64,
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkMetadata {
    pub word_count: u64,
    pub char_count: u64,
    pub semantic_type: SemanticType,
    pub source_text_id: String,
    pub position: ChunkPosition,
    pub tags: Vec<String>,
}

/// A fragment of a source text after segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChunk {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub relations: Vec<ChunkRelation>,
}

/// Generate a fresh entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl SourceText {
    /// Build a full record from caller-supplied fields, stamping id,
    /// timestamps, and the initial `Pending` status.
    pub fn from_new(new: NewSourceText, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            title: new.title,
            author: new.author,
            language: new.language.unwrap_or_else(|| "en".to_string()),
            kind: new.kind,
            location: new.location,
            metadata: new.metadata,
            status: ProcessingStatus::Pending,
            processing_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: SourceTextPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(author) = patch.author {
            self.author = author;
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        self.updated_at = now;
    }
}

impl Dataset {
    pub fn from_new(new: NewDataset, now: DateTime<Utc>) -> Self {
        let mut source_ids = Vec::new();
        for id in new.source_ids {
            if !source_ids.contains(&id) {
                source_ids.push(id);
            }
        }
        Self {
            id: new_id(),
            name: new.name,
            description: new.description,
            source_ids,
            chunks: Vec::new(),
            metadata: new.metadata,
            status: DatasetStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: DatasetPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
    }

    /// Recompute the chunk/word aggregates from the current chunk list.
    pub fn recompute_aggregates(&mut self) {
        self.metadata.total_chunks = self.chunks.len() as u64;
        self.metadata.total_words = self.chunks.iter().map(|c| c.metadata.word_count).sum();
    }
}

impl TextChunk {
    /// Build a chunk from raw content, deriving word/char counts.
    pub fn from_content(source_text_id: &str, index: u64, content: String) -> Self {
        let word_count = content.split_whitespace().count() as u64;
        let char_count = content.chars().count() as u64;
        Self {
            id: new_id(),
            content,
            metadata: ChunkMetadata {
                word_count,
                char_count,
                semantic_type: SemanticType::Body,
                source_text_id: source_text_id.to_string(),
                position: ChunkPosition {
                    index,
                    section: None,
                },
                tags: Vec::new(),
            },
            weight: None,
            relations: Vec::new(),
        }
    }
}
