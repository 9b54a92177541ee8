use std::path::PathBuf;

use crate::models::Family;

/// Errors surfaced by the classification core.
#[derive(Debug, thiserror::Error)]
pub enum GestureError {
    /// Label is not part of the configured label set.
    #[error("Invalid label {label:?}. Allowed: {allowed}")]
    InvalidLabel { label: String, allowed: String },
    /// Landmark input is missing points or coordinates.
    #[error("Invalid landmarks: {0}")]
    InvalidLandmarks(String),
    /// Sample payload could not be decoded.
    #[error("Invalid sample payload: {0}")]
    InvalidPayload(String),
    /// A vector or model from one family was handed to the other.
    #[error("Feature family mismatch: expected {expected}, got {found}")]
    FamilyMismatch { expected: Family, found: Family },
    /// Reading or writing sample/model storage failed.
    #[error("Storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A classifier could not be fitted to the given data.
    #[error("Training failed: {0}")]
    Training(String),
    /// A model artifact is unusable.
    #[error("Model artifact error: {0}")]
    Artifact(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GestureError {
    /// Whether the error stems from bad caller input rather than the host.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GestureError::InvalidLabel { .. }
                | GestureError::InvalidLandmarks(_)
                | GestureError::InvalidPayload(_)
                | GestureError::FamilyMismatch { .. }
        )
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GestureError::Storage {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GestureError>;
