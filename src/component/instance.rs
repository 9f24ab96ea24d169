//! Component instances and their persistent metadata.
//!
//! An instance lives as long as its position in the tree, across any number
//! of passes. The user-facing part (the [`Component`] value or the functional
//! render fn with its hook store) sits in [`ComponentInstance`]; everything
//! the engine tracks about it sits in [`ComponentMeta`], which is shared with
//! [`Updater`] handles so updates can be queued from anywhere.
//!
//! # Values
//!
//! - committed: what the last commit made visible
//! - memoized: what the last pass computed for one transition
//! - instance `props`/`state`: what the current render sees

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::{Component, ComponentKind, ComponentType, HookStore, RenderFn, Updater};
use crate::fiber::FiberId;
use crate::node::NodeRef;
use crate::scheduler::{SYNC_TRANSITION, SchedulerShared, TransitionId};
use crate::types::{Props, Record, State, UpdateType, Value};

pub type InstanceRef = Rc<RefCell<ComponentInstance>>;

/// Callback run with the resulting state once an update has been applied.
pub type UpdateCallback = Rc<dyn Fn(&State)>;

// =============================================================================
// Updates
// =============================================================================

#[derive(Clone)]
pub enum StateUpdate {
    /// Shallow-merge these keys into the state.
    Merge(Record),
    /// Compute the keys to merge from the accumulated state and the props.
    Reduce(Rc<dyn Fn(&State, &Props) -> Record>),
}

impl From<Record> for StateUpdate {
    fn from(record: Record) -> Self {
        StateUpdate::Merge(record)
    }
}

impl StateUpdate {
    pub fn reduce(f: impl Fn(&State, &Props) -> Record + 'static) -> Self {
        StateUpdate::Reduce(Rc::new(f))
    }

    pub fn apply(&self, state: &State, props: &Props) -> State {
        match self {
            StateUpdate::Merge(record) => state.merge(record),
            StateUpdate::Reduce(f) => state.merge(&f(state, props)),
        }
    }
}

#[derive(Clone)]
pub struct PendingUpdate {
    pub update: StateUpdate,
    pub callback: Option<UpdateCallback>,
    pub transition: TransitionId,
}

/// Fold `updates` onto `state` in order.
pub fn reduce_updates(state: &State, props: &Props, updates: &[PendingUpdate]) -> State {
    updates
        .iter()
        .fold(state.clone(), |acc, u| u.update.apply(&acc, props))
}

// =============================================================================
// Meta
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct CommittedValues {
    /// `None` until the first commit.
    pub props: Option<Props>,
    pub state: State,
}

#[derive(Debug, Clone)]
pub struct MemoizedValues {
    pub props: Props,
    pub state: State,
    pub transition: TransitionId,
    /// Updates of `transition` already folded into `state`.
    pub applied: usize,
}

pub struct ComponentMeta {
    pub name: &'static str,
    pub committed: RefCell<CommittedValues>,
    pub memoized: RefCell<Option<MemoizedValues>>,
    sync_updates: RefCell<Vec<PendingUpdate>>,
    deferred_updates: RefCell<Vec<PendingUpdate>>,
    /// Child node produced by the last render.
    pub nodes: RefCell<Option<NodeRef>>,
    pub is_dirty: Cell<bool>,
    pub force_update: Cell<bool>,
    pub render_count: Cell<u32>,
    pub mounted: Cell<bool>,
    pub fiber: Cell<Option<FiberId>>,
    /// Context consumers to notify when this provider's value changes.
    pub subscribers: RefCell<Vec<Weak<ComponentMeta>>>,
    scheduler: Weak<SchedulerShared>,
}

impl ComponentMeta {
    pub fn new(name: &'static str, scheduler: Weak<SchedulerShared>) -> Self {
        Self {
            name,
            committed: RefCell::new(CommittedValues::default()),
            memoized: RefCell::new(None),
            sync_updates: RefCell::new(Vec::new()),
            deferred_updates: RefCell::new(Vec::new()),
            nodes: RefCell::new(None),
            is_dirty: Cell::new(false),
            force_update: Cell::new(false),
            render_count: Cell::new(0),
            mounted: Cell::new(false),
            fiber: Cell::new(None),
            subscribers: RefCell::new(Vec::new()),
            scheduler,
        }
    }

    pub fn enqueue(self: &Rc<Self>, update: PendingUpdate) {
        let transition = update.transition;
        if transition == SYNC_TRANSITION {
            self.sync_updates.borrow_mut().push(update);
            self.request_sync();
        } else {
            self.deferred_updates.borrow_mut().push(update);
            if let Some(scheduler) = self.scheduler.upgrade() {
                scheduler.request_deferred(transition);
            }
        }
        self.note_work();
    }

    /// Mark dirty and ask the root for a sync pass.
    pub fn mark_dirty(self: &Rc<Self>) {
        self.mark_dirty_in(SYNC_TRANSITION);
    }

    /// Mark dirty and ask the root for a pass of `transition`.
    pub fn mark_dirty_in(self: &Rc<Self>, transition: TransitionId) {
        self.is_dirty.set(true);
        if transition == SYNC_TRANSITION {
            self.request_sync();
        } else if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.request_deferred(transition);
        }
        self.note_work();
    }

    /// Let the scheduler know this component has work, so passes descend
    /// to it.
    fn note_work(self: &Rc<Self>) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.note_work(self);
        }
    }

    /// Dirty, or holding updates of any priority.
    pub fn has_any_work(&self) -> bool {
        self.is_dirty.get() || self.pending_update_count() > 0
    }

    /// Dirty, or holding updates a pass of `update_type` under `transition`
    /// applies.
    pub fn has_work_for(&self, update_type: UpdateType, transition: TransitionId) -> bool {
        self.is_dirty.get() || self.has_updates_for(update_type, transition)
    }

    fn request_sync(&self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.request_sync();
        }
    }

    /// Updates a pass of `update_type` under `transition` should apply.
    pub fn updates_for(&self, update_type: UpdateType, transition: TransitionId) -> Vec<PendingUpdate> {
        match update_type {
            UpdateType::Sync => self.sync_updates.borrow().clone(),
            UpdateType::Deferred => self
                .deferred_updates
                .borrow()
                .iter()
                .filter(|u| u.transition == transition)
                .cloned()
                .collect(),
        }
    }

    pub fn has_updates_for(&self, update_type: UpdateType, transition: TransitionId) -> bool {
        match update_type {
            UpdateType::Sync => !self.sync_updates.borrow().is_empty(),
            UpdateType::Deferred => self
                .deferred_updates
                .borrow()
                .iter()
                .any(|u| u.transition == transition),
        }
    }

    /// Drop the first `count` updates a committed pass applied.
    pub fn clear_updates(&self, update_type: UpdateType, transition: TransitionId, count: usize) {
        match update_type {
            UpdateType::Sync => {
                let mut queue = self.sync_updates.borrow_mut();
                let count = count.min(queue.len());
                queue.drain(..count);
            }
            UpdateType::Deferred => {
                let mut seen = 0;
                self.deferred_updates.borrow_mut().retain(|u| {
                    if u.transition == transition && seen < count {
                        seen += 1;
                        false
                    } else {
                        true
                    }
                });
            }
        }
    }

    pub fn pending_update_count(&self) -> usize {
        self.sync_updates.borrow().len() + self.deferred_updates.borrow().len()
    }

    pub fn memo_for(&self, transition: TransitionId) -> Option<MemoizedValues> {
        self.memoized
            .borrow()
            .as_ref()
            .filter(|m| m.transition == transition)
            .cloned()
    }

    pub fn store_memo(self: &Rc<Self>, memo: MemoizedValues) {
        let transition = memo.transition;
        *self.memoized.borrow_mut() = Some(memo);
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.register_memo(transition, self);
        }
    }

    pub fn clear_memo(&self) {
        self.memoized.borrow_mut().take();
    }

    pub fn clear_memo_for(&self, transition: TransitionId) {
        let mut memo = self.memoized.borrow_mut();
        if memo.as_ref().is_some_and(|m| m.transition == transition) {
            *memo = None;
        }
    }

    /// Props as seen by the pass running `transition`.
    pub fn props_for(&self, transition: TransitionId, current: &Props) -> Props {
        self.memo_for(transition)
            .map(|m| m.props)
            .unwrap_or_else(|| current.clone())
    }

    pub fn subscribe(&self, consumer: &Rc<ComponentMeta>) {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|s| s.strong_count() > 0);
        if !subscribers
            .iter()
            .any(|s| std::ptr::eq(s.as_ptr(), Rc::as_ptr(consumer)))
        {
            subscribers.push(Rc::downgrade(consumer));
        }
    }

    /// Mark every live subscriber dirty. A context change re-renders
    /// consumers even when their props and state are unchanged.
    pub fn notify_subscribers(&self) {
        let subscribers: Vec<_> = self
            .subscribers
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for subscriber in subscribers {
            subscriber.is_dirty.set(true);
            subscriber.force_update.set(true);
            subscriber.note_work();
        }
    }
}

// =============================================================================
// Instance
// =============================================================================

pub enum InstanceKind {
    Class(Box<dyn Component>),
    Functional {
        render: RenderFn,
        hooks: Box<dyn HookStore>,
    },
}

pub struct ComponentInstance {
    pub kind: InstanceKind,
    pub props: Props,
    pub state: State,
    /// Resolved value of the class's `context_type`.
    pub context_value: Option<Value>,
    pub meta: Rc<ComponentMeta>,
    pub updater: Updater,
}

impl ComponentInstance {
    pub fn create(
        component: &ComponentType,
        props: &Props,
        scheduler: Weak<SchedulerShared>,
    ) -> InstanceRef {
        let meta = Rc::new(ComponentMeta::new(component.name(), scheduler));
        let updater = Updater::new(meta.clone());
        let (kind, state) = match component.kind() {
            ComponentKind::Class(construct) => {
                let instance = construct(props);
                let state = instance.initial_state(props);
                (InstanceKind::Class(instance), state)
            }
            ComponentKind::Functional { render, hooks } => (
                InstanceKind::Functional {
                    render,
                    hooks: hooks(),
                },
                State::new(),
            ),
        };
        meta.committed.borrow_mut().state = state.clone();
        Rc::new(RefCell::new(ComponentInstance {
            kind,
            props: props.clone(),
            state,
            context_value: None,
            meta,
            updater,
        }))
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, InstanceKind::Class(_))
    }

    pub fn class(&self) -> Option<&dyn Component> {
        match &self.kind {
            InstanceKind::Class(c) => Some(c.as_ref()),
            InstanceKind::Functional { .. } => None,
        }
    }

    /// Reset visible values to the committed ones.
    pub fn reset_to_committed(&mut self) {
        let committed = self.meta.committed.borrow();
        if let Some(props) = &committed.props {
            self.props = props.clone();
        }
        self.state = committed.state.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::start_transition;

    fn meta() -> (Rc<SchedulerShared>, Rc<ComponentMeta>) {
        let shared = SchedulerShared::new();
        let meta = Rc::new(ComponentMeta::new("Test", Rc::downgrade(&shared)));
        (shared, meta)
    }

    fn merge(key: &str, value: i64) -> PendingUpdate {
        PendingUpdate {
            update: Record::new().with(key, value).into(),
            callback: None,
            transition: SYNC_TRANSITION,
        }
    }

    #[test]
    fn test_reduce_updates_in_order() {
        let increment = PendingUpdate {
            update: StateUpdate::reduce(|state, _| {
                Record::new().with("count", state.int("count").unwrap_or(0) + 1)
            }),
            callback: None,
            transition: SYNC_TRANSITION,
        };
        let updates = vec![merge("count", 10), increment.clone(), increment];
        let state = reduce_updates(&Record::new().with("count", 0), &Record::new(), &updates);
        assert_eq!(state.int("count"), Some(12), "reducers see the accumulated state");
    }

    #[test]
    fn test_sync_enqueue_requests_sync_pass() {
        let (shared, meta) = meta();
        meta.enqueue(merge("a", 1));
        assert!(shared.sync_requested());
        assert!(meta.has_updates_for(UpdateType::Sync, SYNC_TRANSITION));
        assert!(!meta.has_updates_for(UpdateType::Deferred, SYNC_TRANSITION));
    }

    #[test]
    fn test_deferred_updates_filtered_by_transition() {
        let (shared, meta) = meta();
        let t1 = start_transition().id();
        let t2 = start_transition().id();
        for (t, v) in [(t1, 1), (t2, 2), (t1, 3)] {
            meta.enqueue(PendingUpdate {
                update: Record::new().with("v", v).into(),
                callback: None,
                transition: t,
            });
        }

        assert!(!shared.sync_requested(), "deferred updates don't request sync work");
        assert!(shared.is_pending(t1) && shared.is_pending(t2));
        assert_eq!(meta.updates_for(UpdateType::Deferred, t1).len(), 2);

        meta.clear_updates(UpdateType::Deferred, t1, 1);
        let left = meta.updates_for(UpdateType::Deferred, t1);
        assert_eq!(left.len(), 1, "only the applied update is dropped");
        assert_eq!(meta.updates_for(UpdateType::Deferred, t2).len(), 1);
    }

    #[test]
    fn test_retire_clears_memo() {
        let (shared, meta) = meta();
        let t = start_transition().id();
        meta.store_memo(MemoizedValues {
            props: Record::new(),
            state: Record::new().with("x", 1),
            transition: t,
            applied: 0,
        });
        assert!(meta.memo_for(t).is_some());
        assert!(meta.memo_for(SYNC_TRANSITION).is_none(), "memo is tagged");

        shared.retire(t);
        assert!(meta.memo_for(t).is_none(), "retiring drops every tagged memo");
    }
}
