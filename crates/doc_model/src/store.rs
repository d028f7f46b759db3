//! Footnote storage
//!
//! The [`FootnoteStore`] trait is the boundary to whatever persists footnotes
//! (a database, a document package, ...). [`InMemoryFootnoteStore`] is the
//! bundled implementation used by tests and the command line tool.

use crate::{DocModelError, Footnote, FootnoteId, Result, RevisionId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Persistence boundary for footnotes, scoped by revision
pub trait FootnoteStore: Send {
    /// All footnotes of a revision, active and trashed, in insertion order.
    /// An unknown revision has no footnotes.
    fn footnotes_for_revision(&self, revision: RevisionId) -> Result<Vec<Footnote>>;

    /// Persist new numbers for footnotes of a revision.
    ///
    /// Called right after a mutation has been stored. A failure here leaves
    /// that mutation in place with outdated numbers, so implementations
    /// should only fail when the store itself is unusable.
    fn update_numbers(&mut self, revision: RevisionId, numbers: &[(FootnoteId, u32)]) -> Result<()>;

    /// Add a footnote to its revision
    fn insert(&mut self, footnote: Footnote) -> Result<()>;

    /// Set or clear the trashed state of a footnote
    fn set_deleted(
        &mut self,
        revision: RevisionId,
        id: FootnoteId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Move a footnote's reference marker
    fn set_position(&mut self, revision: RevisionId, id: FootnoteId, position: usize) -> Result<()>;
}

/// Footnote store kept in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryFootnoteStore {
    revisions: HashMap<RevisionId, Vec<Footnote>>,
}

impl InMemoryFootnoteStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of footnotes (active and trashed) in a revision
    pub fn footnote_count(&self, revision: RevisionId) -> usize {
        self.revisions.get(&revision).map(Vec::len).unwrap_or(0)
    }

    fn footnote_mut(&mut self, revision: RevisionId, id: FootnoteId) -> Result<&mut Footnote> {
        self.revisions
            .get_mut(&revision)
            .ok_or(DocModelError::RevisionNotFound(revision))?
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(DocModelError::FootnoteNotFound(id))
    }
}

impl FootnoteStore for InMemoryFootnoteStore {
    fn footnotes_for_revision(&self, revision: RevisionId) -> Result<Vec<Footnote>> {
        Ok(self.revisions.get(&revision).cloned().unwrap_or_default())
    }

    fn update_numbers(&mut self, revision: RevisionId, numbers: &[(FootnoteId, u32)]) -> Result<()> {
        for &(id, number) in numbers {
            self.footnote_mut(revision, id)?.number = number;
        }
        Ok(())
    }

    fn insert(&mut self, footnote: Footnote) -> Result<()> {
        let notes = self.revisions.entry(footnote.revision_id).or_default();
        if notes.iter().any(|f| f.id == footnote.id) {
            return Err(DocModelError::DuplicateFootnote(footnote.id));
        }
        notes.push(footnote);
        Ok(())
    }

    fn set_deleted(
        &mut self,
        revision: RevisionId,
        id: FootnoteId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let note = self.footnote_mut(revision, id)?;
        note.is_deleted = deleted_at.is_some();
        note.deleted_at = deleted_at;
        Ok(())
    }

    fn set_position(&mut self, revision: RevisionId, id: FootnoteId, position: usize) -> Result<()> {
        self.footnote_mut(revision, id)?.character_position = position;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_fetch() {
        let mut store = InMemoryFootnoteStore::new();
        let rev = RevisionId::new();
        let note = Footnote::new(rev, 10, "a");
        let id = note.id;

        store.insert(note).unwrap();
        assert_eq!(store.footnote_count(rev), 1);
        assert_eq!(store.footnotes_for_revision(rev).unwrap()[0].id, id);
        assert!(store.footnotes_for_revision(RevisionId::new()).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let mut store = InMemoryFootnoteStore::new();
        let note = Footnote::new(RevisionId::new(), 0, "a");
        store.insert(note.clone()).unwrap();
        assert!(matches!(
            store.insert(note),
            Err(DocModelError::DuplicateFootnote(_))
        ));
    }

    #[test]
    fn test_revisions_are_isolated() {
        let mut store = InMemoryFootnoteStore::new();
        let rev_a = RevisionId::new();
        let rev_b = RevisionId::new();
        let note = Footnote::new(rev_a, 0, "a");
        let id = note.id;
        store.insert(note).unwrap();
        store.insert(Footnote::new(rev_b, 0, "b")).unwrap();

        assert!(matches!(
            store.update_numbers(rev_b, &[(id, 7)]),
            Err(DocModelError::FootnoteNotFound(_))
        ));
        store.update_numbers(rev_a, &[(id, 7)]).unwrap();
        assert_eq!(store.footnotes_for_revision(rev_a).unwrap()[0].number, 7);
    }

    #[test]
    fn test_set_deleted_and_position() {
        let mut store = InMemoryFootnoteStore::new();
        let rev = RevisionId::new();
        let note = Footnote::new(rev, 5, "a");
        let id = note.id;
        store.insert(note).unwrap();

        let now = Utc::now();
        store.set_deleted(rev, id, Some(now)).unwrap();
        store.set_position(rev, id, 42).unwrap();
        let stored = &store.footnotes_for_revision(rev).unwrap()[0];
        assert!(stored.is_deleted);
        assert_eq!(stored.deleted_at, Some(now));
        assert_eq!(stored.character_position, 42);

        store.set_deleted(rev, id, None).unwrap();
        assert!(store.footnotes_for_revision(rev).unwrap()[0].is_active());

        assert!(matches!(
            store.set_position(RevisionId::new(), id, 1),
            Err(DocModelError::RevisionNotFound(_))
        ));
    }
}
