//! Error types for layout engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Invalid container size: {0}")]
    InvalidContainer(String),

    #[error("Pagination made no progress on page {page} at offset {start}")]
    NoProgress { page: usize, start: usize },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to parse settings: {0}")]
    SettingsFormat(#[from] serde_json::Error),

    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pagination task failed: {0}")]
    TaskFailed(String),

    #[error("Document model error: {0}")]
    DocModel(#[from] doc_model::DocModelError),
}

/// Failure of the host text measurement primitive.
///
/// Pagination never aborts on these; the affected text is treated as having
/// zero height.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasureError {
    #[error("Invalid layout width: {0}")]
    InvalidWidth(f32),

    #[error("Cannot measure text: {0}")]
    Unmeasurable(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
