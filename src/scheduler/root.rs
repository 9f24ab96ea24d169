//! Root - one mounted tree and the passes that update it.
//!
//! # Passes
//!
//! ```text
//! sync requested ──▶ Sync pass ──▶ commit
//!                       ▲
//!       preempts        │
//!                       │
//! transition pending ─▶ Deferred pass ─yield─▶ (next tick resumes)
//!                              │
//!                              └──▶ commit
//! ```
//!
//! A sync pass runs to completion inside one [`Root::tick`]. A deferred pass
//! checks the [`Deadline`] before every fiber and hands control back when it
//! is exhausted; the next tick resumes where it stopped. A sync request
//! arriving while a deferred pass is in progress throws the deferred work
//! away; the transition stays pending and is redone later.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, instrument};

use super::{Deadline, FrameDeadline, RootHandle, SYNC_TRANSITION, SchedulerShared, TransitionId, Unbounded};
use crate::config::RootOptions;
use crate::error::FiberError;
use crate::fiber::{Fiber, FiberArena, FiberFlags, FiberId, NodePart, Part};
use crate::boundary::SuspenseBoundary;
use crate::component::ContextMap;
use crate::host::{OutputHost, OutputId};
use crate::node::NodeRef;
use crate::template::TemplateCompiler;
use crate::template::TemplateCache;
use crate::types::UpdateType;

/// Outcome of one [`Root::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// Nothing to do.
    Idle,
    /// A deferred pass ran out of time and will resume on the next tick.
    Yielded,
    /// A pass of this type finished and was committed.
    Committed(UpdateType),
}

/// Fiber tree under construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkInProgress {
    pub(crate) top: FiberId,
    /// Next fiber to process; `None` once the walk is done.
    pub(crate) next: Option<FiberId>,
}

/// Insertion cursors for list regions, keyed by the region's parent and
/// start marker.
pub(crate) type ArrayCursors = HashMap<(OutputId, Option<OutputId>), Option<OutputId>>;

pub struct Root<H: OutputHost> {
    pub(crate) fibers: FiberArena,
    pub(crate) host: H,
    pub(crate) templates: TemplateCache,
    pub(crate) shared: Rc<SchedulerShared>,
    pub(crate) options: RootOptions,
    pub(crate) container: OutputId,
    /// Root fiber of the committed tree.
    pub(crate) current: FiberId,
    pub(crate) wip: Option<WorkInProgress>,
    /// Node rendered at the top of the tree.
    pub(crate) element: Option<NodeRef>,
    pub(crate) update_type: UpdateType,
    pub(crate) current_transition: TransitionId,
    pub(crate) generation: u64,
    /// Component fibers whose post-commit work is pending, in effect order.
    pub(crate) post_commit_effects: Vec<FiberId>,
    pub(crate) last_effect_fiber: Option<FiberId>,
    /// Committed fibers dropped by the pass being committed.
    pub(crate) tear_down_fibers: Vec<FiberId>,
    /// Boundary the work loop must continue from.
    pub(crate) retry_fiber: Option<FiberId>,
    /// Suspense boundaries that caught a suspension in this pass.
    pub(crate) suspended_boundaries: Vec<SuspenseBoundary>,
    pub(crate) array_cursors: ArrayCursors,
    pub(crate) after_render: Vec<Box<dyn FnOnce()>>,
}

impl<H: OutputHost> Root<H> {
    /// Mount an empty tree into `container`.
    pub fn new(host: H, container: OutputId) -> Self {
        Self::with_options(host, container, RootOptions::default())
    }

    pub fn with_options(host: H, container: OutputId, options: RootOptions) -> Self {
        let mut fibers = FiberArena::new();
        let mut root = Fiber::new(None, Part::Node(NodePart::new(container)), ContextMap::new(), 0);
        root.flags.insert(FiberFlags::ROOT);
        let current = fibers.insert(root);
        Self {
            fibers,
            host,
            templates: TemplateCache::new(None),
            shared: SchedulerShared::new(),
            options,
            container,
            current,
            wip: None,
            element: None,
            update_type: UpdateType::Sync,
            current_transition: SYNC_TRANSITION,
            generation: 0,
            post_commit_effects: Vec::new(),
            last_effect_fiber: None,
            tear_down_fibers: Vec::new(),
            retry_fiber: None,
            suspended_boundaries: Vec::new(),
            array_cursors: ArrayCursors::new(),
            after_render: Vec::new(),
        }
    }

    pub fn handle(&self) -> RootHandle {
        RootHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn container(&self) -> OutputId {
        self.container
    }

    pub fn options(&self) -> &RootOptions {
        &self.options
    }

    pub fn set_template_compiler(&mut self, compiler: impl TemplateCompiler + 'static) {
        self.templates.set_compiler(Box::new(compiler));
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Render `node` at the top of the tree and flush all work.
    pub fn render(&mut self, node: impl Into<NodeRef>) -> Result<(), FiberError> {
        self.schedule_render(node);
        self.flush()
    }

    /// Like [`render`](Self::render); `callback` runs once the result is
    /// committed.
    pub fn render_with(
        &mut self,
        node: impl Into<NodeRef>,
        callback: impl FnOnce() + 'static,
    ) -> Result<(), FiberError> {
        self.after_render.push(Box::new(callback));
        self.render(node)
    }

    /// Replace the top node and request a sync pass without running it.
    pub fn schedule_render(&mut self, node: impl Into<NodeRef>) {
        self.element = Some(node.into());
        self.shared.request_sync();
    }

    /// Remove everything rendered so far.
    pub fn unmount(&mut self) -> Result<(), FiberError> {
        self.element = None;
        self.shared.request_sync();
        self.flush()
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Do one unit of scheduling: start or resume a pass and run it until it
    /// commits or `deadline` asks it to yield.
    #[instrument(level = "debug", skip_all, fields(generation = self.generation))]
    pub fn tick(&mut self, deadline: &mut dyn Deadline) -> Result<WorkStatus, FiberError> {
        loop {
            if self.shared.sync_requested() {
                if self.wip.is_some() && self.update_type == UpdateType::Deferred {
                    debug!(transition = ?self.current_transition, "sync work preempts deferred pass");
                    self.abandon_pass();
                }
                if self.wip.is_none() {
                    self.begin_pass(UpdateType::Sync, SYNC_TRANSITION);
                }
            } else if self.wip.is_none() {
                match self.shared.next_pending() {
                    Some(transition) => self.begin_pass(UpdateType::Deferred, transition),
                    None => return Ok(WorkStatus::Idle),
                }
            }

            match self.work_loop(deadline) {
                Ok(LoopOutcome::Completed) => {
                    let update_type = self.update_type;
                    self.commit();
                    return Ok(WorkStatus::Committed(update_type));
                }
                Ok(LoopOutcome::Yielded) => return Ok(WorkStatus::Yielded),
                Ok(LoopOutcome::Preempted) => continue,
                Err(error) => {
                    self.abandon_pass();
                    return Err(error);
                }
            }
        }
    }

    /// Run every pass until nothing is left.
    pub fn flush(&mut self) -> Result<(), FiberError> {
        let mut deadline = Unbounded;
        let mut sync_commits = 0;
        loop {
            match self.tick(&mut deadline)? {
                WorkStatus::Idle => return Ok(()),
                WorkStatus::Committed(UpdateType::Sync) => {
                    sync_commits += 1;
                    if sync_commits > self.options.max_nested_updates {
                        self.shared.take_sync_request();
                        return Err(FiberError::UpdateDepthExceeded(sync_commits));
                    }
                }
                WorkStatus::Committed(UpdateType::Deferred) | WorkStatus::Yielded => {}
            }
        }
    }

    /// Tick with a [`FrameDeadline`] of the configured time slice until the
    /// root is idle or the frame is used up.
    pub fn flush_frame(&mut self) -> Result<WorkStatus, FiberError> {
        let mut deadline = FrameDeadline::new(self.options.time_slice);
        let mut status = WorkStatus::Idle;
        loop {
            match self.tick(&mut deadline)? {
                WorkStatus::Idle => return Ok(status),
                WorkStatus::Yielded => return Ok(WorkStatus::Yielded),
                committed => status = committed,
            }
            if deadline.should_yield() {
                return Ok(status);
            }
        }
    }

    /// True when a pass is in progress or updates are queued.
    pub fn has_work(&self) -> bool {
        self.wip.is_some() || self.shared.has_work()
    }

    /// True while a pass is in progress.
    pub fn is_rendering(&self) -> bool {
        self.wip.is_some()
    }

    /// Fibers currently alive, committed and in progress.
    pub fn fiber_count(&self) -> usize {
        self.fibers.len()
    }

    // =========================================================================
    // Pass Bookkeeping
    // =========================================================================

    pub(crate) fn begin_pass(&mut self, update_type: UpdateType, transition: TransitionId) {
        if update_type == UpdateType::Sync {
            self.shared.take_sync_request();
        }
        self.update_type = update_type;
        self.current_transition = transition;
        self.generation += 1;

        let current = &self.fibers[self.current];
        let top = Fiber::from_alternate(self.current, current, None, current.part, self.generation);
        let top = self.fibers.insert(top);
        self.wip = Some(WorkInProgress {
            top,
            next: Some(top),
        });
        debug!(?update_type, ?transition, generation = self.generation, "begin pass");
    }

    /// Throw away the tree in progress. The committed tree is untouched.
    pub(crate) fn abandon_pass(&mut self) {
        if let Some(wip) = self.wip.take() {
            self.discard_subtree(wip.top);
        }
        self.reset_pass_state();
    }

    pub(crate) fn reset_pass_state(&mut self) {
        // Suspensions that didn't make it into a commit go with the pass.
        for boundary in self.suspended_boundaries.drain(..) {
            boundary.discard(self.current_transition);
        }
        self.post_commit_effects.clear();
        self.last_effect_fiber = None;
        self.tear_down_fibers.clear();
        self.retry_fiber = None;
        self.array_cursors.clear();
    }
}

/// How a call to the work loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopOutcome {
    Completed,
    Yielded,
    /// A sync request arrived during a deferred pass.
    Preempted,
}
