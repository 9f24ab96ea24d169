//! Suspense - rendering a fallback while values are pending.
//!
//! Render code that needs a value that isn't ready returns
//! `Err(Interrupt::Pending(value))`, usually through [`Resource::read`]. The
//! work loop hands the pending value to the nearest [`Suspense`] ancestor and
//! restarts the pass from there; the boundary now renders its fallback.
//!
//! # States
//!
//! ```text
//! IDLE ──suspend──▶ SUSPENDED ──all values settled──▶ RETRY ──render──▶ IDLE
//!                        ▲                                 │
//!                        └──────────suspend again──────────┘
//! ```
//!
//! A suspension belongs to the pass that hit it. Other passes don't see it
//! until that pass commits, and an abandoned pass takes it with it.
//!
//! Settlement is observed with spark-signals: every pending value carries a
//! `Signal<bool>` and the boundary runs one effect per value it waits on.
//! When the last committed one settles the boundary is marked dirty and a
//! pass of the suspended transition is requested, so exactly one retry
//! render happens.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use spark_signals::{Signal, effect_scope, effect_sync, signal};

use crate::component::{Cleanup, Component, ComponentCx, ComponentMeta, RenderResult};
use crate::error::{ComponentError, Interrupt};
use crate::node::{Node, NodeRef, class};
use crate::scheduler::TransitionId;
use crate::types::{Props, Record, Value};

thread_local! {
    /// Counter for pending value ids.
    static NEXT_PENDING_ID: Cell<u64> = const { Cell::new(0) };
}

// =============================================================================
// Pending Values
// =============================================================================

/// Something a render is waiting for.
#[derive(Clone)]
pub struct PendingValue {
    id: u64,
    settled: Signal<bool>,
}

impl PendingValue {
    pub fn new() -> Self {
        let id = NEXT_PENDING_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        Self {
            id,
            settled: signal(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark the value as available (or failed). Boundaries waiting on it
    /// are notified synchronously.
    pub fn settle(&self) {
        if !self.settled.get() {
            self.settled.set(true);
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled.get()
    }
}

impl Default for PendingValue {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PendingValue {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for PendingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingValue")
            .field("id", &self.id)
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Result of an async operation, as seen by render code.
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncState<T> {
    Pending,
    Resolved(T),
    Rejected(ComponentError),
}

/// Async value readable from render code.
///
/// ```ignore
/// let user = Resource::new();
/// // in render:
/// let name = user.read()?;
/// // later, outside render:
/// user.resolve("ada".to_string());
/// ```
#[derive(Clone)]
pub struct Resource<T> {
    pending: PendingValue,
    state: Rc<RefCell<AsyncState<T>>>,
}

impl<T: Clone> Resource<T> {
    pub fn new() -> Self {
        Self {
            pending: PendingValue::new(),
            state: Rc::new(RefCell::new(AsyncState::Pending)),
        }
    }

    /// The value, or the interrupt that suspends or fails the render.
    pub fn read(&self) -> Result<T, Interrupt> {
        match &*self.state.borrow() {
            AsyncState::Pending => Err(Interrupt::Pending(self.pending.clone())),
            AsyncState::Resolved(value) => Ok(value.clone()),
            AsyncState::Rejected(error) => Err(Interrupt::Error(error.clone())),
        }
    }

    pub fn resolve(&self, value: T) {
        *self.state.borrow_mut() = AsyncState::Resolved(value);
        self.pending.settle();
    }

    pub fn reject(&self, error: impl Into<ComponentError>) {
        *self.state.borrow_mut() = AsyncState::Rejected(error.into());
        self.pending.settle();
    }

    pub fn state(&self) -> AsyncState<T> {
        self.state.borrow().clone()
    }

    pub fn pending_value(&self) -> &PendingValue {
        &self.pending
    }
}

impl<T: Clone> Default for Resource<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Boundary State
// =============================================================================

/// Committed state of a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspenseStatus {
    Idle,
    Suspended,
    Retry,
}

struct Watch {
    pending: PendingValue,
    /// Pass that suspended on the value.
    transition: TransitionId,
    /// False while the pass that registered the watch hasn't committed.
    committed: bool,
    settled: bool,
    stop: Option<Cleanup>,
}

impl Watch {
    fn stop(self) {
        if let Some(stop) = self.stop {
            stop();
        }
    }
}

struct SuspenseInner {
    status: SuspenseStatus,
    watches: Vec<Watch>,
    /// Decision of the render in progress.
    fallback: bool,
}

/// Suspense state shared by every pass that renders one boundary.
///
/// A suspension recorded during a pass stays private to that pass's
/// transition until the pass commits; an abandoned pass drops it.
#[derive(Clone)]
pub struct SuspenseBoundary {
    inner: Rc<RefCell<SuspenseInner>>,
}

impl Default for SuspenseBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl SuspenseBoundary {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SuspenseInner {
                status: SuspenseStatus::Idle,
                watches: Vec::new(),
                fallback: false,
            })),
        }
    }

    pub fn status(&self) -> SuspenseStatus {
        self.inner.borrow().status
    }

    /// Pending values not settled yet, committed or not.
    pub fn waiting_count(&self) -> usize {
        self.inner.borrow().watches.iter().filter(|w| !w.settled).count()
    }

    /// True when the committed tree shows the fallback.
    pub fn is_showing_fallback(&self) -> bool {
        self.status() == SuspenseStatus::Suspended
    }

    /// Fallback decision of the last [`begin_render`](Self::begin_render).
    pub fn renders_fallback(&self) -> bool {
        self.inner.borrow().fallback
    }

    /// Start waiting on `pending` for the pass running `transition`, on
    /// behalf of the boundary whose metadata is `owner`.
    pub(crate) fn suspend(&self, pending: PendingValue, transition: TransitionId, owner: &Rc<ComponentMeta>) {
        if pending.is_settled() {
            return;
        }
        {
            let mut inner = self.inner.borrow_mut();
            if inner.watches.iter().any(|w| w.pending == pending) {
                return;
            }
            inner.watches.push(Watch {
                pending: pending.clone(),
                transition,
                committed: false,
                settled: false,
                stop: None,
            });
        }

        tracing::debug!(component = owner.name, pending = pending.id(), "boundary suspended");

        let state = Rc::downgrade(&self.inner);
        let owner = Rc::downgrade(owner);
        let id = pending.id();
        let settled = pending.settled.clone();
        let scope = effect_scope(true);
        scope.run(move || {
            let _effect_cleanup = effect_sync(move || {
                if settled.get() {
                    on_settled(&state, &owner, id);
                }
            });
        });
        let stop: Cleanup = Box::new(move || scope.stop());

        let mut inner = self.inner.borrow_mut();
        match inner.watches.iter_mut().find(|w| w.pending.id() == id) {
            Some(watch) => watch.stop = Some(stop),
            None => stop(),
        }
    }

    /// Called before the boundary renders in a pass of `transition`. The
    /// fallback is shown while a committed value or one this pass suspended
    /// on is unsettled.
    pub(crate) fn begin_render(&self, transition: TransitionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let fallback = inner
            .watches
            .iter()
            .any(|w| !w.settled && (w.committed || w.transition == transition));
        inner.fallback = fallback;
        fallback
    }

    /// The pass of `transition` that rendered this boundary committed.
    /// Returns true when a retry was requested right away.
    pub(crate) fn commit(&self, transition: TransitionId, showed_fallback: bool, owner: &Rc<ComponentMeta>) -> bool {
        let (finished, retry) = {
            let mut inner = self.inner.borrow_mut();
            for watch in inner.watches.iter_mut().filter(|w| w.transition == transition) {
                watch.committed = true;
            }
            if showed_fallback {
                let retry = inner.watches.iter().filter(|w| w.committed).all(|w| w.settled);
                inner.status = if retry {
                    SuspenseStatus::Retry
                } else {
                    SuspenseStatus::Suspended
                };
                (Vec::new(), retry.then(|| retry_transitions(&inner.watches)))
            } else {
                let (done, waiting): (Vec<_>, Vec<_>) = inner.watches.drain(..).partition(|w| w.committed);
                inner.watches = waiting;
                inner.status = SuspenseStatus::Idle;
                (done, None)
            }
        };
        for watch in finished {
            watch.stop();
        }
        // Everything settled before the commit landed.
        let Some(transitions) = retry else {
            return false;
        };
        for transition in transitions {
            owner.mark_dirty_in(transition);
        }
        true
    }

    /// Forget what an abandoned pass of `transition` suspended on.
    pub(crate) fn discard(&self, transition: TransitionId) {
        let dropped = {
            let mut inner = self.inner.borrow_mut();
            let (dropped, kept): (Vec<_>, Vec<_>) = inner
                .watches
                .drain(..)
                .partition(|w| !w.committed && w.transition == transition);
            inner.watches = kept;
            dropped
        };
        for watch in dropped {
            watch.stop();
        }
    }

    /// Stop watching everything; the boundary is gone.
    pub(crate) fn tear_down(&self) {
        let watches = std::mem::take(&mut self.inner.borrow_mut().watches);
        for watch in watches {
            watch.stop();
        }
        self.inner.borrow_mut().status = SuspenseStatus::Idle;
    }
}

/// Transitions to retry once every committed watch settled, sync first.
fn retry_transitions(watches: &[Watch]) -> Vec<TransitionId> {
    let mut transitions: Vec<TransitionId> = watches.iter().filter(|w| w.committed).map(|w| w.transition).collect();
    transitions.sort();
    transitions.dedup();
    transitions
}

fn on_settled(state: &Weak<RefCell<SuspenseInner>>, owner: &Weak<ComponentMeta>, id: u64) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let retry = {
        let mut inner = state.borrow_mut();
        if let Some(watch) = inner.watches.iter_mut().find(|w| w.pending.id() == id) {
            watch.settled = true;
        }
        let ready = inner.status == SuspenseStatus::Suspended
            && inner.watches.iter().filter(|w| w.committed).all(|w| w.settled);
        if ready {
            inner.status = SuspenseStatus::Retry;
        }
        ready.then(|| retry_transitions(&inner.watches))
    };
    let (Some(transitions), Some(owner)) = (retry, owner.upgrade()) else {
        return;
    };
    tracing::debug!(component = owner.name, "suspense boundary ready to retry");
    for transition in transitions {
        owner.mark_dirty_in(transition);
    }
}

// =============================================================================
// Suspense Component
// =============================================================================

/// Renders `children`, or `fallback` while a descendant is suspended.
pub struct Suspense {
    boundary: SuspenseBoundary,
}

impl Component for Suspense {
    fn new(_props: &Props) -> Self {
        Suspense {
            boundary: SuspenseBoundary::new(),
        }
    }

    fn render(&self, cx: &ComponentCx<'_>) -> RenderResult {
        let key = if self.boundary.renders_fallback() {
            "fallback"
        } else {
            "children"
        };
        Ok(cx.props().node(key))
    }

    fn on_unmount(&mut self, _cx: &ComponentCx<'_>) {
        self.boundary.tear_down();
    }

    fn as_suspense(&self) -> Option<&SuspenseBoundary> {
        Some(&self.boundary)
    }
}

/// Suspense boundary node.
pub fn suspense(fallback: impl Into<NodeRef>, children: impl Into<NodeRef>) -> Node {
    class::<Suspense>(
        Record::new()
            .with("fallback", Value::Node(fallback.into()))
            .with("children", Value::Node(children.into())),
    )
}
