//! Error types for the kinship engine

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, KinshipError>;

/// Kinship engine errors
///
/// Only structural failures are surfaced as errors. Per-item problems
/// (a malformed declaration, a clamped depth, a lost insert race) are
/// reported through [`crate::graph::Diagnostics`] or
/// [`crate::duplicates::InsertOutcome`] instead.
#[derive(Error, Debug)]
pub enum KinshipError {
    #[error("Person not found: {id}")]
    NotFound { id: String },

    #[error("Scoring skipped for pair ({profile_a}, {profile_b}): {reason}")]
    ScoringSkipped {
        profile_a: String,
        profile_b: String,
        reason: String,
    },

    #[error("Unknown relation code: {0}")]
    InvalidCode(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl KinshipError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn scoring_skipped(
        profile_a: impl Into<String>,
        profile_b: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ScoringSkipped {
            profile_a: profile_a.into(),
            profile_b: profile_b.into(),
            reason: reason.into(),
        }
    }
}
