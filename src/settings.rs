//! Application settings and their pre-commit validation.
//!
//! Exactly one [`AppSettings`] instance lives in the entity store. It is
//! never mutated field-by-field from outside; callers hand the store a
//! [`SettingsPatch`], the validator merges and checks it, and the merged
//! candidate is committed only after the backend has acknowledged it
//! (see `EntityStore::update_settings`).

use globset::Glob;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::{ChunkingStrategy, ExportConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackupFrequency {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

/// Cloud synchronization configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudSyncConfig {
    pub provider: Option<String>,
    /// Minutes between cloud sync passes. Must be >= 1.
    pub interval_minutes: u64,
    pub encrypt: bool,
    pub compress: bool,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

impl Default for CloudSyncConfig {
    fn default() -> Self {
        Self {
            provider: None,
            interval_minutes: 15,
            encrypt: true,
            compress: false,
            include_globs: vec!["**/*".to_string()],
            exclude_globs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPrefs {
    pub on_processing_complete: bool,
    pub on_sync_error: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            on_processing_complete: true,
            on_sync_error: true,
        }
    }
}

/// Singleton configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub theme: Theme,
    pub language: String,
    pub autosave: bool,
    pub backup_frequency: BackupFrequency,
    pub default_chunking: ChunkingStrategy,
    pub default_export: ExportConfig,
    pub cloud_sync: CloudSyncConfig,
    pub notifications: NotificationPrefs,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            language: "en".to_string(),
            autosave: true,
            backup_frequency: BackupFrequency::None,
            default_chunking: ChunkingStrategy::Paragraph,
            default_export: ExportConfig::default(),
            cloud_sync: CloudSyncConfig::default(),
            notifications: NotificationPrefs::default(),
        }
    }
}

/// Partial settings update. `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub language: Option<String>,
    pub autosave: Option<bool>,
    pub backup_frequency: Option<BackupFrequency>,
    pub default_chunking: Option<ChunkingStrategy>,
    pub default_export: Option<ExportConfig>,
    pub cloud_sync: Option<CloudSyncConfig>,
    pub notifications: Option<NotificationPrefs>,
}

impl SettingsPatch {
    /// Parse string-typed theme/backup values as they arrive from loosely
    /// typed callers (IPC payloads, the CLI). Unknown values are rejected
    /// here rather than silently coerced.
    pub fn theme_from_str(mut self, theme: &str) -> Result<Self, ValidationError> {
        self.theme = Some(match theme {
            "light" => Theme::Light,
            "dark" => Theme::Dark,
            "system" => Theme::System,
            other => return Err(ValidationError::UnknownTheme(other.to_string())),
        });
        Ok(self)
    }

    pub fn backup_frequency_from_str(mut self, freq: &str) -> Result<Self, ValidationError> {
        self.backup_frequency = Some(match freq {
            "none" => BackupFrequency::None,
            "daily" => BackupFrequency::Daily,
            "weekly" => BackupFrequency::Weekly,
            "monthly" => BackupFrequency::Monthly,
            other => return Err(ValidationError::UnknownBackupFrequency(other.to_string())),
        });
        Ok(self)
    }
}

/// Merge `patch` over `current` and validate the candidate.
///
/// Pure and synchronous: no state is touched. Returns the merged candidate
/// on success so the caller can forward it to the backend before committing.
pub fn validate_settings(
    current: &AppSettings,
    patch: SettingsPatch,
) -> Result<AppSettings, ValidationError> {
    let mut candidate = current.clone();
    if let Some(theme) = patch.theme {
        candidate.theme = theme;
    }
    if let Some(language) = patch.language {
        candidate.language = language;
    }
    if let Some(autosave) = patch.autosave {
        candidate.autosave = autosave;
    }
    if let Some(freq) = patch.backup_frequency {
        candidate.backup_frequency = freq;
    }
    if let Some(chunking) = patch.default_chunking {
        candidate.default_chunking = chunking;
    }
    if let Some(export) = patch.default_export {
        candidate.default_export = export;
    }
    if let Some(cloud) = patch.cloud_sync {
        candidate.cloud_sync = cloud;
    }
    if let Some(notifications) = patch.notifications {
        candidate.notifications = notifications;
    }

    check_settings(&candidate)?;
    Ok(candidate)
}

/// Validate a fully-formed settings record, e.g. one arriving inside an
/// import document rather than as a patch.
pub fn check_settings(settings: &AppSettings) -> Result<(), ValidationError> {
    if settings.cloud_sync.interval_minutes < 1 {
        return Err(ValidationError::SyncIntervalTooSmall(
            settings.cloud_sync.interval_minutes,
        ));
    }
    check_globs("include", &settings.cloud_sync.include_globs)?;
    check_globs("exclude", &settings.cloud_sync.exclude_globs)?;
    Ok(())
}

fn check_globs(list: &'static str, patterns: &[String]) -> Result<(), ValidationError> {
    for pattern in patterns {
        if let Err(e) = Glob::new(pattern) {
            return Err(ValidationError::InvalidGlobPattern {
                list,
                pattern: pattern.clone(),
                message: e.to_string(),
            });
        }
    }
    Ok(())
}
