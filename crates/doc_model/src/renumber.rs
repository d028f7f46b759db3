//! Footnote renumbering
//!
//! Footnote numbers are derived state: among the active footnotes of a
//! revision, the number is the 1-based rank of the footnote's character
//! position. Every structural change (insert, trash, restore, move) goes
//! through [`RenumberingNotifier`], which recomputes the numbers, writes the
//! changed ones back to the store, and tells the subscribers of that revision
//! which marks need to be redrawn.
//!
//! Subscriptions are scoped by revision. A change in one revision never
//! reaches subscribers of another, and a recomputation that changes nothing
//! notifies nobody.

use crate::{DocModelError, Footnote, FootnoteId, FootnoteStore, Result, RevisionId};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A footnote whose number changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberChange {
    pub footnote_id: FootnoteId,
    pub old_number: u32,
    pub new_number: u32,
}

/// Notification sent to the subscribers of a revision after renumbering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenumberEvent {
    /// Revision whose footnotes were renumbered
    pub revision_id: RevisionId,
    /// Footnotes whose number changed, in document order
    pub changes: Vec<NumberChange>,
}

/// Callback invoked with each renumber event
pub type RenumberCallback = Arc<dyn Fn(&RenumberEvent) + Send + Sync>;

/// Handle returned by [`RenumberingNotifier::on_renumber`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    callback: RenumberCallback,
}

/// Compute the numbers of the active footnotes of one revision.
///
/// Returns `(id, number)` pairs in document order. Footnotes sharing a
/// position keep their relative input order.
pub fn compute_numbers(footnotes: &[Footnote]) -> Vec<(FootnoteId, u32)> {
    let mut active: Vec<&Footnote> = footnotes.iter().filter(|f| f.is_active()).collect();
    active.sort_by_key(|f| f.character_position);
    active
        .iter()
        .zip(1u32..)
        .map(|(f, number)| (f.id, number))
        .collect()
}

/// Serializes footnote mutations and keeps numbering consistent
pub struct RenumberingNotifier<S: FootnoteStore> {
    store: Mutex<S>,
    subscribers: Mutex<HashMap<RevisionId, Vec<Subscriber>>>,
    next_subscription: AtomicU64,
}

impl<S: FootnoteStore> RenumberingNotifier<S> {
    /// Create a notifier that owns the given store
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    /// Subscribe to renumber events of one revision
    pub fn on_renumber<F>(&self, revision: RevisionId, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&RenumberEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.lock_subscribers()?
            .entry(revision)
            .or_default()
            .push(Subscriber {
                id,
                callback: Arc::new(callback),
            });
        Ok(id)
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        let mut subscribers = self.lock_subscribers()?;
        let mut removed = false;
        subscribers.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            removed |= subs.len() != before;
            !subs.is_empty()
        });
        Ok(removed)
    }

    /// Number of subscriptions for a revision
    pub fn subscriber_count(&self, revision: RevisionId) -> Result<usize> {
        Ok(self
            .lock_subscribers()?
            .get(&revision)
            .map(Vec::len)
            .unwrap_or(0))
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// All footnotes of a revision, active and trashed
    pub fn footnotes(&self, revision: RevisionId) -> Result<Vec<Footnote>> {
        self.lock_store()?.footnotes_for_revision(revision)
    }

    /// Active footnotes of a revision in document order
    pub fn active_footnotes(&self, revision: RevisionId) -> Result<Vec<Footnote>> {
        let mut notes: Vec<Footnote> = self
            .footnotes(revision)?
            .into_iter()
            .filter(Footnote::is_active)
            .collect();
        notes.sort_by_key(|f| f.character_position);
        Ok(notes)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Insert a new active footnote and renumber the revision
    pub fn insert_footnote(
        &self,
        revision: RevisionId,
        position: usize,
        content: impl Into<String>,
    ) -> Result<FootnoteId> {
        let footnote = Footnote::new(revision, position, content);
        let id = footnote.id;
        self.mutate(revision, |store| store.insert(footnote))?;
        tracing::debug!(%revision, footnote = %id, position, "Inserted footnote");
        Ok(id)
    }

    /// Move a footnote to the trash and renumber the revision
    pub fn trash(&self, revision: RevisionId, id: FootnoteId) -> Result<()> {
        self.mutate(revision, |store| {
            let mut note = find(store, revision, id)?;
            note.trash(Utc::now())?;
            store.set_deleted(revision, id, note.deleted_at)
        })
    }

    /// Restore a trashed footnote and renumber the revision
    pub fn restore(&self, revision: RevisionId, id: FootnoteId) -> Result<()> {
        self.mutate(revision, |store| {
            let mut note = find(store, revision, id)?;
            note.restore()?;
            store.set_deleted(revision, id, None)
        })
    }

    /// Move a footnote's reference marker and renumber the revision
    pub fn move_footnote(&self, revision: RevisionId, id: FootnoteId, position: usize) -> Result<()> {
        self.mutate(revision, |store| {
            find(store, revision, id)?;
            store.set_position(revision, id, position)
        })
    }

    /// Recompute numbers without any other change.
    ///
    /// Returns the event that was sent, or `None` when nothing changed.
    pub fn renumber(&self, revision: RevisionId) -> Result<Option<RenumberEvent>> {
        let event = {
            let mut store = self.lock_store()?;
            renumber_locked(&mut *store, revision)?
        };
        if let Some(event) = &event {
            self.notify(event)?;
        }
        Ok(event)
    }

    /// Apply `op` and renumber. A failed renumber does not undo `op`; the
    /// stale numbers are repaired by the next mutation or [`Self::renumber`].
    fn mutate<T>(&self, revision: RevisionId, op: impl FnOnce(&mut S) -> Result<T>) -> Result<T> {
        let (value, event) = {
            let mut store = self.lock_store()?;
            let value = op(&mut *store)?;
            let event = renumber_locked(&mut *store, revision).map_err(|err| {
                tracing::warn!(%revision, error = %err, "Footnote changed but renumbering failed");
                err
            })?;
            (value, event)
        };
        // Callbacks run after the store lock is released so they may query it
        if let Some(event) = &event {
            self.notify(event)?;
        }
        Ok(value)
    }

    fn notify(&self, event: &RenumberEvent) -> Result<()> {
        let callbacks: Vec<RenumberCallback> = self
            .lock_subscribers()?
            .get(&event.revision_id)
            .map(|subs| subs.iter().map(|s| Arc::clone(&s.callback)).collect())
            .unwrap_or_default();

        for callback in callbacks {
            callback(event);
        }
        Ok(())
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, S>> {
        self.store.lock().map_err(|_| DocModelError::LockPoisoned)
    }

    fn lock_subscribers(&self) -> Result<MutexGuard<'_, HashMap<RevisionId, Vec<Subscriber>>>> {
        self.subscribers.lock().map_err(|_| DocModelError::LockPoisoned)
    }
}

fn find<S: FootnoteStore + ?Sized>(store: &S, revision: RevisionId, id: FootnoteId) -> Result<Footnote> {
    store
        .footnotes_for_revision(revision)?
        .into_iter()
        .find(|f| f.id == id)
        .ok_or(DocModelError::FootnoteNotFound(id))
}

fn renumber_locked<S: FootnoteStore + ?Sized>(
    store: &mut S,
    revision: RevisionId,
) -> Result<Option<RenumberEvent>> {
    let footnotes = store.footnotes_for_revision(revision)?;
    let current: HashMap<FootnoteId, u32> = footnotes.iter().map(|f| (f.id, f.number)).collect();

    let changes: Vec<NumberChange> = compute_numbers(&footnotes)
        .into_iter()
        .filter_map(|(id, new_number)| {
            let old_number = current.get(&id).copied().unwrap_or(0);
            (old_number != new_number).then_some(NumberChange {
                footnote_id: id,
                old_number,
                new_number,
            })
        })
        .collect();

    if changes.is_empty() {
        return Ok(None);
    }

    let updates: Vec<(FootnoteId, u32)> = changes
        .iter()
        .map(|c| (c.footnote_id, c.new_number))
        .collect();
    store.update_numbers(revision, &updates)?;
    tracing::debug!(%revision, changed = changes.len(), "Renumbered footnotes");

    Ok(Some(RenumberEvent {
        revision_id: revision,
        changes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryFootnoteStore;
    use proptest::prelude::*;

    fn notifier() -> RenumberingNotifier<InMemoryFootnoteStore> {
        RenumberingNotifier::new(InMemoryFootnoteStore::new())
    }

    fn recorder(
        notifier: &RenumberingNotifier<InMemoryFootnoteStore>,
        revision: RevisionId,
    ) -> Arc<Mutex<Vec<RenumberEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        notifier
            .on_renumber(revision, move |event| sink.lock().unwrap().push(event.clone()))
            .unwrap();
        events
    }

    fn number_of(notes: &[Footnote], id: FootnoteId) -> u32 {
        notes.iter().find(|f| f.id == id).unwrap().number
    }

    fn assert_contiguous(notes: &[Footnote]) {
        let mut active: Vec<&Footnote> = notes.iter().filter(|f| f.is_active()).collect();
        active.sort_by_key(|f| (f.character_position, f.number));
        let numbers: Vec<u32> = active.iter().map(|f| f.number).collect();
        let expected: Vec<u32> = (1..=active.len() as u32).collect();
        assert_eq!(numbers, expected);
    }

    #[test]
    fn test_compute_numbers_skips_deleted() {
        let rev = RevisionId::new();
        let a = Footnote::new(rev, 50, "a");
        let mut b = Footnote::new(rev, 10, "b");
        let c = Footnote::new(rev, 30, "c");
        b.trash(Utc::now()).unwrap();

        let numbers = compute_numbers(&[a.clone(), b, c.clone()]);
        assert_eq!(numbers, vec![(c.id, 1), (a.id, 2)]);
    }

    #[test]
    fn test_insert_before_existing_renumbers() {
        let notifier = notifier();
        let rev = RevisionId::new();
        let later = notifier.insert_footnote(rev, 500, "later").unwrap();
        assert_eq!(number_of(&notifier.footnotes(rev).unwrap(), later), 1);

        let events = recorder(&notifier, rev);
        let earlier = notifier.insert_footnote(rev, 100, "earlier").unwrap();

        let notes = notifier.footnotes(rev).unwrap();
        assert_eq!(number_of(&notes, earlier), 1);
        assert_eq!(number_of(&notes, later), 2);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].revision_id, rev);
        assert_eq!(events[0].changes.len(), 2);
    }

    #[test]
    fn test_no_notification_when_numbers_unchanged() {
        let notifier = notifier();
        let rev = RevisionId::new();
        notifier.insert_footnote(rev, 10, "first").unwrap();

        let events = recorder(&notifier, rev);
        // Appending after the last footnote only numbers the new one
        notifier.insert_footnote(rev, 20, "second").unwrap();
        assert_eq!(events.lock().unwrap().len(), 1);
        assert_eq!(events.lock().unwrap()[0].changes.len(), 1);

        assert!(notifier.renumber(rev).unwrap().is_none());
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_trash_and_restore_renumber() {
        let notifier = notifier();
        let rev = RevisionId::new();
        let a = notifier.insert_footnote(rev, 10, "a").unwrap();
        let b = notifier.insert_footnote(rev, 20, "b").unwrap();
        let c = notifier.insert_footnote(rev, 30, "c").unwrap();

        notifier.trash(rev, a).unwrap();
        let notes = notifier.footnotes(rev).unwrap();
        assert_eq!(number_of(&notes, b), 1);
        assert_eq!(number_of(&notes, c), 2);
        assert_contiguous(&notes);

        notifier.restore(rev, a).unwrap();
        let notes = notifier.footnotes(rev).unwrap();
        assert_eq!(number_of(&notes, a), 1);
        assert_eq!(number_of(&notes, b), 2);
        assert_eq!(number_of(&notes, c), 3);
    }

    #[test]
    fn test_trashing_last_footnote_is_silent() {
        let notifier = notifier();
        let rev = RevisionId::new();
        notifier.insert_footnote(rev, 10, "a").unwrap();
        let last = notifier.insert_footnote(rev, 20, "b").unwrap();

        let events = recorder(&notifier, rev);
        notifier.trash(rev, last).unwrap();
        assert!(events.lock().unwrap().is_empty());
        assert_eq!(notifier.active_footnotes(rev).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_transition_leaves_store_untouched() {
        let notifier = notifier();
        let rev = RevisionId::new();
        let id = notifier.insert_footnote(rev, 0, "a").unwrap();

        assert!(matches!(
            notifier.restore(rev, id),
            Err(DocModelError::InvalidTransition { .. })
        ));
        assert!(matches!(
            notifier.trash(rev, FootnoteId::new()),
            Err(DocModelError::FootnoteNotFound(_))
        ));
        assert!(notifier.footnotes(rev).unwrap()[0].is_active());
    }

    #[test]
    fn test_move_footnote_reorders() {
        let notifier = notifier();
        let rev = RevisionId::new();
        let a = notifier.insert_footnote(rev, 10, "a").unwrap();
        let b = notifier.insert_footnote(rev, 20, "b").unwrap();

        notifier.move_footnote(rev, a, 30).unwrap();
        let notes = notifier.footnotes(rev).unwrap();
        assert_eq!(number_of(&notes, b), 1);
        assert_eq!(number_of(&notes, a), 2);
    }

    #[test]
    fn test_notifications_are_scoped_by_revision() {
        let notifier = notifier();
        let rev_a = RevisionId::new();
        let rev_b = RevisionId::new();
        let events_a = recorder(&notifier, rev_a);
        let events_b = recorder(&notifier, rev_b);

        notifier.insert_footnote(rev_a, 0, "a").unwrap();
        assert_eq!(events_a.lock().unwrap().len(), 1);
        assert!(events_b.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let notifier = notifier();
        let rev = RevisionId::new();
        let id = notifier.on_renumber(rev, |_| {}).unwrap();
        assert_eq!(notifier.subscriber_count(rev).unwrap(), 1);

        assert!(notifier.unsubscribe(id).unwrap());
        assert!(!notifier.unsubscribe(id).unwrap());
        assert_eq!(notifier.subscriber_count(rev).unwrap(), 0);
    }

    #[test]
    fn test_callback_can_query_notifier() {
        let notifier = Arc::new(notifier());
        let rev = RevisionId::new();
        let seen = Arc::new(Mutex::new(0usize));

        let inner = Arc::clone(&notifier);
        let sink = Arc::clone(&seen);
        notifier
            .on_renumber(rev, move |event| {
                let active = inner.active_footnotes(event.revision_id).unwrap();
                *sink.lock().unwrap() = active.len();
            })
            .unwrap();

        notifier.insert_footnote(rev, 3, "a").unwrap();
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    /// In-memory store whose number updates fail while `failing` is set
    struct FlakyNumberStore {
        inner: InMemoryFootnoteStore,
        failing: Arc<std::sync::atomic::AtomicBool>,
    }

    impl FootnoteStore for FlakyNumberStore {
        fn footnotes_for_revision(&self, revision: RevisionId) -> Result<Vec<Footnote>> {
            self.inner.footnotes_for_revision(revision)
        }

        fn update_numbers(&mut self, revision: RevisionId, numbers: &[(FootnoteId, u32)]) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DocModelError::LockPoisoned);
            }
            self.inner.update_numbers(revision, numbers)
        }

        fn insert(&mut self, footnote: Footnote) -> Result<()> {
            self.inner.insert(footnote)
        }

        fn set_deleted(
            &mut self,
            revision: RevisionId,
            id: FootnoteId,
            deleted_at: Option<chrono::DateTime<Utc>>,
        ) -> Result<()> {
            self.inner.set_deleted(revision, id, deleted_at)
        }

        fn set_position(&mut self, revision: RevisionId, id: FootnoteId, position: usize) -> Result<()> {
            self.inner.set_position(revision, id, position)
        }
    }

    #[test]
    fn test_failed_renumber_is_repaired_later() {
        let failing = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let notifier = RenumberingNotifier::new(FlakyNumberStore {
            inner: InMemoryFootnoteStore::new(),
            failing: Arc::clone(&failing),
        });
        let rev = RevisionId::new();
        let first = notifier.insert_footnote(rev, 10, "a").unwrap();
        let second = notifier.insert_footnote(rev, 20, "b").unwrap();

        failing.store(true, Ordering::SeqCst);
        assert!(notifier.trash(rev, first).is_err());

        // The trash stuck, but the survivor still carries its old number
        let active = notifier.active_footnotes(rev).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!((active[0].id, active[0].number), (second, 2));

        failing.store(false, Ordering::SeqCst);
        let event = notifier.renumber(rev).unwrap().unwrap();
        assert_eq!(event.changes.len(), 1);
        assert_eq!(event.changes[0].new_number, 1);
        assert_contiguous(&notifier.footnotes(rev).unwrap());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(usize),
        Trash(usize),
        Restore(usize),
        Move(usize, usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..1000).prop_map(Op::Insert),
            (0usize..32).prop_map(Op::Trash),
            (0usize..32).prop_map(Op::Restore),
            (0usize..32, 0usize..1000).prop_map(|(i, p)| Op::Move(i, p)),
        ]
    }

    proptest! {
        #[test]
        fn prop_numbers_stay_contiguous(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let notifier = notifier();
            let rev = RevisionId::new();
            let mut ids: Vec<FootnoteId> = Vec::new();

            for op in ops {
                // Invalid transitions are rejected and must not disturb numbering
                let _ = match op {
                    Op::Insert(pos) => notifier.insert_footnote(rev, pos, "n").map(|id| ids.push(id)),
                    Op::Trash(i) if !ids.is_empty() => notifier.trash(rev, ids[i % ids.len()]),
                    Op::Restore(i) if !ids.is_empty() => notifier.restore(rev, ids[i % ids.len()]),
                    Op::Move(i, pos) if !ids.is_empty() => notifier.move_footnote(rev, ids[i % ids.len()], pos),
                    _ => Ok(()),
                };

                let notes = notifier.footnotes(rev).unwrap();
                let mut active: Vec<&Footnote> = notes.iter().filter(|f| f.is_active()).collect();
                active.sort_by_key(|f| f.number);
                let numbers: Vec<u32> = active.iter().map(|f| f.number).collect();
                let expected: Vec<u32> = (1..=active.len() as u32).collect();
                prop_assert_eq!(numbers, expected);
                for pair in active.windows(2) {
                    prop_assert!(pair[0].character_position <= pair[1].character_position);
                }
            }
        }
    }
}
