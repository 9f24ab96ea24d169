//! Transitions - batches of deferred updates.
//!
//! A [`Transition`] tags every deferred update made through it. The root
//! keeps the set of transitions with queued work ([`TransitionTracker`]) and
//! runs one deferred pass per transition, oldest first.
//!
//! Components reconciled during a pass keep a memoized snapshot tagged with
//! the pass's transition. The tracker remembers who holds a snapshot so that
//! retiring a transition can drop them all.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::component::ComponentMeta;
use crate::types::UpdateType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(u64);

/// Transition id carried by sync passes and sync updates.
pub const SYNC_TRANSITION: TransitionId = TransitionId(0);

thread_local! {
    /// Counter for transition ids. Zero is reserved for sync work.
    static NEXT_TRANSITION_ID: Cell<u64> = const { Cell::new(1) };
}

/// Handle for scheduling deferred updates as one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transition {
    id: TransitionId,
}

impl Transition {
    pub fn id(&self) -> TransitionId {
        self.id
    }
}

/// Start a new transition.
pub fn start_transition() -> Transition {
    let id = NEXT_TRANSITION_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });
    Transition {
        id: TransitionId(id),
    }
}

// =============================================================================
// Tracker
// =============================================================================

#[derive(Default)]
pub struct TransitionTracker {
    pending: Vec<TransitionId>,
    memo_holders: HashMap<TransitionId, Vec<Weak<ComponentMeta>>>,
}

impl TransitionTracker {
    /// Add `id` to the pending set (no-op if present).
    pub fn track(&mut self, id: TransitionId) {
        if id != SYNC_TRANSITION && !self.pending.contains(&id) {
            self.pending.push(id);
        }
    }

    pub fn is_pending(&self, id: TransitionId) -> bool {
        self.pending.contains(&id)
    }

    /// Oldest pending transition.
    pub fn next_pending(&self) -> Option<TransitionId> {
        self.pending.first().copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn register_memo(&mut self, id: TransitionId, holder: &Rc<ComponentMeta>) {
        let holders = self.memo_holders.entry(id).or_default();
        if !holders
            .iter()
            .any(|h| std::ptr::eq(h.as_ptr(), Rc::as_ptr(holder)))
        {
            holders.push(Rc::downgrade(holder));
        }
    }

    /// Drop `id` from the pending set and clear every snapshot tagged with it.
    pub fn retire(&mut self, id: TransitionId) {
        self.pending.retain(|p| *p != id);
        if let Some(holders) = self.memo_holders.remove(&id) {
            for holder in holders.iter().filter_map(Weak::upgrade) {
                holder.clear_memo_for(id);
            }
        }
    }
}

// =============================================================================
// Shared Scheduler State
// =============================================================================

/// Scheduling state shared between a root and the updaters of its
/// components.
#[derive(Default)]
pub struct SchedulerShared {
    sync_requested: Cell<bool>,
    transitions: RefCell<TransitionTracker>,
    /// Components that were dirtied or got updates since they last
    /// committed.
    with_work: RefCell<Vec<Weak<ComponentMeta>>>,
}

impl SchedulerShared {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn request_sync(&self) {
        self.sync_requested.set(true);
    }

    pub fn sync_requested(&self) -> bool {
        self.sync_requested.get()
    }

    pub fn take_sync_request(&self) -> bool {
        self.sync_requested.replace(false)
    }

    pub fn request_deferred(&self, transition: TransitionId) {
        self.transitions.borrow_mut().track(transition);
    }

    pub fn next_pending(&self) -> Option<TransitionId> {
        self.transitions.borrow().next_pending()
    }

    pub fn is_pending(&self, transition: TransitionId) -> bool {
        self.transitions.borrow().is_pending(transition)
    }

    pub fn register_memo(&self, transition: TransitionId, holder: &Rc<ComponentMeta>) {
        self.transitions
            .borrow_mut()
            .register_memo(transition, holder);
    }

    pub fn retire(&self, transition: TransitionId) {
        self.transitions.borrow_mut().retire(transition);
    }

    pub fn has_work(&self) -> bool {
        self.sync_requested() || self.transitions.borrow().pending_count() > 0
    }

    pub fn note_work(&self, meta: &Rc<ComponentMeta>) {
        let mut with_work = self.with_work.borrow_mut();
        if !with_work
            .iter()
            .any(|m| std::ptr::eq(m.as_ptr(), Rc::as_ptr(meta)))
        {
            with_work.push(Rc::downgrade(meta));
        }
    }

    /// Components a pass of `update_type` under `transition` must render.
    /// Entries without any work left are dropped.
    pub fn components_with_work(&self, update_type: UpdateType, transition: TransitionId) -> Vec<Rc<ComponentMeta>> {
        let mut with_work = self.with_work.borrow_mut();
        with_work.retain(|m| m.upgrade().is_some_and(|m| m.has_any_work()));
        with_work
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|m| m.has_work_for(update_type, transition))
            .collect()
    }
}

/// Cloneable handle for triggering work on a root from outside a render.
#[derive(Clone)]
pub struct RootHandle {
    pub(crate) shared: Rc<SchedulerShared>,
}

impl RootHandle {
    /// Start a transition for deferred updates on this root.
    pub fn start_transition(&self) -> Transition {
        start_transition()
    }

    /// True while updates tagged with `transition` are waiting to commit.
    pub fn is_pending(&self, transition: Transition) -> bool {
        self.shared.is_pending(transition.id())
    }

    /// Ask for a sync pass on the next tick.
    pub fn request_sync(&self) {
        self.shared.request_sync();
    }

    pub fn has_work(&self) -> bool {
        self.shared.has_work()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_ids_are_unique() {
        let a = start_transition();
        let b = start_transition();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), SYNC_TRANSITION, "sync id is never handed out");
    }

    #[test]
    fn test_tracker_orders_pending_oldest_first() {
        let mut tracker = TransitionTracker::default();
        let a = start_transition().id();
        let b = start_transition().id();
        tracker.track(a);
        tracker.track(b);
        tracker.track(a);
        tracker.track(SYNC_TRANSITION);

        assert_eq!(tracker.pending_count(), 2, "duplicates and sync are ignored");
        assert_eq!(tracker.next_pending(), Some(a));
        tracker.retire(a);
        assert_eq!(tracker.next_pending(), Some(b));
        assert!(!tracker.is_pending(a));
    }

    #[test]
    fn test_components_with_work_filters_by_pass() {
        let shared = SchedulerShared::new();
        let meta = Rc::new(ComponentMeta::new("Test", Rc::downgrade(&shared)));
        let transition = start_transition().id();
        meta.mark_dirty_in(transition);

        let found = shared.components_with_work(UpdateType::Deferred, transition);
        assert_eq!(found.len(), 1);
        assert!(Rc::ptr_eq(&found[0], &meta));

        meta.is_dirty.set(false);
        assert!(
            shared.components_with_work(UpdateType::Sync, SYNC_TRANSITION).is_empty(),
            "clean components are dropped"
        );
    }

    #[test]
    fn test_sync_request_is_taken_once() {
        let shared = SchedulerShared::new();
        assert!(!shared.has_work());
        shared.request_sync();
        assert!(shared.take_sync_request());
        assert!(!shared.take_sync_request(), "request is consumed");
    }
}
