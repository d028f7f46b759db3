//! Error types for document model operations

use crate::{FootnoteId, RevisionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocModelError {
    #[error("Footnote not found: {0}")]
    FootnoteNotFound(FootnoteId),

    #[error("Revision not found: {0}")]
    RevisionNotFound(RevisionId),

    #[error("Invalid offset {offset} for document of length {len}")]
    InvalidOffset { offset: usize, len: usize },

    #[error("Invalid footnote transition: footnote {id} is already {state}")]
    InvalidTransition { id: FootnoteId, state: &'static str },

    #[error("Duplicate footnote: {0}")]
    DuplicateFootnote(FootnoteId),

    #[error("Footnote store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, DocModelError>;
