//! Error taxonomy for the state engine.
//!
//! Settings validation failures are typed so callers can retry with
//! corrected input. Backend and persistence failures stay `anyhow::Error`
//! at the orchestration boundary and are handled per the policy in
//! [`crate::sync`] and [`crate::persist`].

use thiserror::Error;

/// Rejection raised by the settings validator before any commit.
///
/// No partial state change has occurred when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cloud sync interval must be at least 1 minute (got {0})")]
    SyncIntervalTooSmall(u64),

    #[error("unknown theme '{0}' (expected light, dark, or system)")]
    UnknownTheme(String),

    #[error("unknown backup frequency '{0}' (expected none, daily, weekly, or monthly)")]
    UnknownBackupFrequency(String),

    #[error("invalid {list} glob pattern '{pattern}': {message}")]
    InvalidGlobPattern {
        list: &'static str,
        pattern: String,
        message: String,
    },
}

/// Failure of the all-or-nothing settings update path.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The merged candidate failed validation; nothing was sent anywhere.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend rejected or failed to persist the candidate; the local
    /// copy was left untouched.
    #[error("backend rejected settings update: {0}")]
    Backend(String),
}
