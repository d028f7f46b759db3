//! Immutable document snapshots
//!
//! A [`Document`] is the text of one document revision together with the
//! inline attachment markers anchored in it. All offsets are character
//! offsets (Unicode scalar values), which stay stable for the lifetime of the
//! snapshot. Snapshots are cheap to clone and safe to hand to a worker thread.

use crate::{DocModelError, FootnoteId, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;

/// Character used in plain text sources to request a page break
pub const PAGE_BREAK_CHAR: char = '\u{000C}';

/// Kind of an inline attachment marker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentKind {
    /// Reference marker of a footnote
    FootnoteReference(FootnoteId),
    /// Forced page break; the page ends right after the marker character
    PageBreak,
    /// Any other inline object (image, field, ...)
    Object(String),
}

/// An inline marker anchored to a character offset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attachment {
    /// Character offset the marker is anchored to
    pub offset: usize,
    /// What kind of marker this is
    pub kind: AttachmentKind,
}

impl Attachment {
    /// Create a new attachment
    pub fn new(offset: usize, kind: AttachmentKind) -> Self {
        Self { offset, kind }
    }

    /// Create a forced page break marker
    pub fn page_break(offset: usize) -> Self {
        Self::new(offset, AttachmentKind::PageBreak)
    }

    /// Check if this is a forced page break
    pub fn is_page_break(&self) -> bool {
        matches!(self.kind, AttachmentKind::PageBreak)
    }
}

#[derive(Debug)]
struct DocumentInner {
    text: String,
    /// Byte offset of every character plus one trailing entry for `text.len()`
    char_starts: Vec<usize>,
    /// Character offsets of every `\n`
    newlines: Vec<usize>,
    /// Sorted by offset
    attachments: Vec<Attachment>,
    /// Sorted character offsets of page break markers
    page_breaks: Vec<usize>,
    content_hash: u64,
}

/// Immutable snapshot of a document's text and attachments
#[derive(Debug, Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    /// Create a snapshot from text and attachment markers.
    ///
    /// Every attachment offset must lie inside the text.
    pub fn new(text: impl Into<String>, attachments: Vec<Attachment>) -> Result<Self> {
        let text = text.into();
        let len = text.chars().count();

        if let Some(bad) = attachments.iter().find(|a| a.offset >= len) {
            return Err(DocModelError::InvalidOffset {
                offset: bad.offset,
                len,
            });
        }

        Ok(Self::build(text, attachments))
    }

    /// Create a snapshot from plain text.
    ///
    /// Every form feed character becomes a forced page break marker.
    pub fn from_plain_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let attachments = text
            .chars()
            .enumerate()
            .filter(|(_, c)| *c == PAGE_BREAK_CHAR)
            .map(|(i, _)| Attachment::page_break(i))
            .collect();

        Self::build(text, attachments)
    }

    fn build(text: String, mut attachments: Vec<Attachment>) -> Self {
        let mut char_starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        char_starts.push(text.len());

        attachments.sort_by_key(|a| a.offset);
        let page_breaks = attachments
            .iter()
            .filter(|a| a.is_page_break())
            .map(|a| a.offset)
            .collect();

        let newlines = text
            .chars()
            .enumerate()
            .filter(|(_, c)| *c == '\n')
            .map(|(i, _)| i)
            .collect();

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        attachments.hash(&mut hasher);
        let content_hash = hasher.finish();

        Self {
            inner: Arc::new(DocumentInner {
                text,
                char_starts,
                newlines,
                attachments,
                page_breaks,
                content_hash,
            }),
        }
    }

    /// The full text of the snapshot
    pub fn content(&self) -> &str {
        &self.inner.text
    }

    /// All attachment markers, sorted by offset
    pub fn attachments(&self) -> &[Attachment] {
        &self.inner.attachments
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.inner.char_starts.len() - 1
    }

    /// Check if the document has no text
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hash of the text and attachments
    pub fn content_hash(&self) -> u64 {
        self.inner.content_hash
    }

    /// Text of a character range. The range is clamped to the document.
    pub fn slice(&self, range: Range<usize>) -> &str {
        let len = self.len();
        let start = range.start.min(len);
        let end = range.end.clamp(start, len);
        let starts = &self.inner.char_starts;
        &self.inner.text[starts[start]..starts[end]]
    }

    /// Offset just past the end of the paragraph containing `offset`.
    ///
    /// The terminating `\n` belongs to the paragraph. The last paragraph of
    /// a document may be unterminated, in which case this is `len()`.
    pub fn paragraph_end(&self, offset: usize) -> usize {
        let newlines = &self.inner.newlines;
        let idx = newlines.partition_point(|&n| n < offset);
        newlines.get(idx).map(|n| n + 1).unwrap_or_else(|| self.len())
    }

    /// First page break marker at or after `offset`
    pub fn next_page_break(&self, offset: usize) -> Option<usize> {
        let breaks = &self.inner.page_breaks;
        let idx = breaks.partition_point(|&b| b < offset);
        breaks.get(idx).copied()
    }

    /// Check whether two snapshots share the same storage
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.inner.text == other.inner.text
                && self.inner.attachments == other.inner.attachments)
    }
}

impl Eq for Document {}
