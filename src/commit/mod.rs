//! Commit - making a finished pass visible.
//!
//! 1. tear down committed fibers the new tree doesn't reuse
//! 2. walk the new tree in pre-order: create and place output, patch text
//!    and attributes, capture snapshots, clear applied updates
//! 3. run component lifecycles and effects, children before parents
//! 4. retire the transition, free the old generation, run after-render
//!    callbacks
//!
//! # Placement
//!
//! Content of a list region is laid out with a cursor per region: every
//! item's output must directly follow the previous item's. An item still at
//! its old index stays where it is, as does output already right after the
//! cursor; anything else is moved or inserted right after the cursor. Output
//! outside lists is only ever inserted once, before its part's
//! `next_sibling`.

mod teardown;

use std::collections::HashSet;

use tracing::{debug, instrument, trace};

use crate::component::{CommittedValues, ComponentCx, ComponentInstance, ComponentMeta, InstanceKind};
use crate::fiber::{FiberFlags, FiberId, FiberInstance, NodePart, Part};
use crate::host::{OutputHost, OutputId};
use crate::node::{ElementRef, NodeKind};
use crate::scheduler::{Root, TransitionId};
use crate::types::{Props, Record, State, UpdateType};

/// How a fiber's output relates to the committed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    New,
    /// List item at the same index as before; it doesn't move.
    SameIndex,
    Existing,
}

impl<H: OutputHost> Root<H> {
    #[instrument(level = "debug", skip_all, fields(generation = self.generation))]
    pub(crate) fn commit(&mut self) {
        let Some(wip) = self.wip.take() else {
            return;
        };
        let transition = self.current_transition;
        let new_fibers = self.fibers.preorder(wip.top);
        let old_fibers = self.fibers.preorder(self.current);

        let reused: HashSet<FiberId> = new_fibers
            .iter()
            .filter_map(|id| self.fibers[*id].alternate)
            .collect();
        self.tear_down_fibers = old_fibers
            .iter()
            .copied()
            .filter(|id| {
                !reused.contains(id)
                    && self.fibers[*id]
                        .parent
                        .is_none_or(|parent| reused.contains(&parent))
            })
            .collect();
        for id in std::mem::take(&mut self.tear_down_fibers) {
            self.tear_down(id);
        }

        self.array_cursors.clear();
        let mut still_pending = false;
        for id in &new_fibers {
            still_pending |= self.commit_fiber(*id);
        }

        let effects = std::mem::take(&mut self.post_commit_effects);
        for id in effects.into_iter().rev() {
            self.post_commit(id);
        }

        self.shared.retire(transition);
        if still_pending {
            // Updates queued for this transition after its components
            // rendered get their own pass.
            self.shared.request_deferred(transition);
        }

        for id in &old_fibers {
            self.fibers.remove(*id);
        }
        for id in &new_fibers {
            let fiber = &mut self.fibers[*id];
            fiber.alternate = None;
            fiber.flags &= FiberFlags::ROOT;
            fiber.child_error = None;
            fiber.snapshot = None;
        }
        debug!(
            fibers = new_fibers.len(),
            removed = old_fibers.len(),
            last_effect = ?self.last_effect_fiber,
            "commit"
        );
        self.current = wip.top;
        self.reset_pass_state();

        for callback in std::mem::take(&mut self.after_render) {
            callback();
        }
    }

    /// Returns true when a component still has updates for the deferred
    /// transition being committed.
    fn commit_fiber(&mut self, id: FiberId) -> bool {
        let Some(node) = self.fibers[id].node.clone() else {
            return false;
        };
        match &node.kind {
            NodeKind::Component(_) => return self.commit_component(id),
            NodeKind::Element(element) => {
                self.commit_tag(id);
                self.commit_element_ref(id, element.element_ref.as_ref());
            }
            NodeKind::Template(_) => self.commit_tag(id),
            NodeKind::Text(text) => self.commit_text(id, text),
            NodeKind::List(_) => {
                if let Part::Node(part) = self.fibers[id].part {
                    if part.array_index.is_none() {
                        self.array_cursors
                            .insert((part.parent, part.previous_sibling), part.previous_sibling);
                    }
                }
            }
            NodeKind::Attribute(attributes) => self.commit_attributes(id, attributes),
        }
        false
    }

    fn commit_element_ref(&mut self, id: FiberId, element_ref: Option<&ElementRef>) {
        if let Some(old) = self.old_element_ref(id) {
            if !element_ref.is_some_and(|r| r.ptr_eq(&old)) {
                old.set(None);
            }
        }
        if let Some(element_ref) = element_ref {
            let output = self.fibers[id].instance.tag().and_then(|t| t.nodes.first().copied());
            element_ref.set(output);
        }
    }

    fn old_element_ref(&self, id: FiberId) -> Option<ElementRef> {
        let alternate = self.fibers.alternate(id)?;
        match &self.fibers[alternate].node.as_ref()?.kind {
            NodeKind::Element(old) => old.element_ref.clone(),
            _ => None,
        }
    }

    // =========================================================================
    // Output
    // =========================================================================

    fn commit_tag(&mut self, id: FiberId) {
        let fiber = &self.fibers[id];
        let Some(tag) = fiber.instance.tag().cloned() else {
            return;
        };
        let Part::Node(part) = fiber.part else {
            return;
        };
        let placement = self.placement(id);
        self.place(part, &tag.nodes, placement);
    }

    fn commit_text(&mut self, id: FiberId, text: &str) {
        let Part::Node(part) = self.fibers[id].part else {
            return;
        };
        let has_effect = self.fibers[id].has_effect();
        let existing = match self.fibers[id].instance {
            FiberInstance::Text(node) => node,
            _ => None,
        };
        match existing {
            Some(node) => {
                if has_effect {
                    self.host.set_text(node, text);
                }
                let placement = self.placement(id);
                self.place(part, &[node], placement);
            }
            None => {
                let node = self.host.create_text(text);
                self.fibers[id].instance = FiberInstance::Text(Some(node));
                self.place(part, &[node], Placement::New);
            }
        }
    }

    fn commit_attributes(&mut self, id: FiberId, attributes: &Record) {
        let fiber = &self.fibers[id];
        if !fiber.has_effect() {
            return;
        }
        let Part::Attribute {
            element,
            is_foreign_namespace,
        } = fiber.part
        else {
            return;
        };
        let old = self
            .fibers
            .alternate(id)
            .and_then(|alt| self.fibers[alt].node.clone())
            .and_then(|node| match &node.kind {
                NodeKind::Attribute(old) => Some(old.clone()),
                _ => None,
            });
        self.host
            .patch_attributes(element, attributes, old.as_ref(), is_foreign_namespace);
    }

    fn placement(&self, id: FiberId) -> Placement {
        let Some(alternate) = self.fibers[id].alternate else {
            return Placement::New;
        };
        let old_index = self.fibers.get(alternate).and_then(|alt| alt.part.array_index());
        if old_index.is_some() && old_index == self.fibers[id].part.array_index() {
            Placement::SameIndex
        } else {
            Placement::Existing
        }
    }

    /// Put `nodes` where `part` says they belong.
    fn place(&mut self, part: NodePart, nodes: &[OutputId], placement: Placement) {
        let (Some(first), Some(last)) = (nodes.first().copied(), nodes.last().copied()) else {
            return;
        };

        if part.array_index.is_none() {
            if placement == Placement::New {
                self.host.insert_or_move(part.parent, part.next_sibling, nodes);
            }
            return;
        }

        let region = (part.parent, part.previous_sibling);
        let cursor = self
            .array_cursors
            .get(&region)
            .copied()
            .unwrap_or(part.previous_sibling);
        let in_place = match placement {
            Placement::New => false,
            Placement::SameIndex => true,
            Placement::Existing => {
                self.host.parent(first) == Some(part.parent) && self.host.previous_sibling(first) == cursor
            }
        };

        if !in_place {
            let is_new = placement == Placement::New;
            let mut before = match cursor {
                Some(cursor) => self.host.next_sibling(cursor),
                None => self.host.first_child(part.parent),
            };
            while let Some(node) = before.filter(|b| nodes.contains(b)) {
                before = self.host.next_sibling(node);
            }
            trace!(is_new, count = nodes.len(), "place list output");
            self.host.insert_or_move(part.parent, before, nodes);
        }
        self.array_cursors.insert(region, Some(last));
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Snapshot and bookkeeping before any lifecycle runs. Returns true when
    /// the committed transition has work left for another pass.
    fn commit_component(&mut self, id: FiberId) -> bool {
        let Some(instance) = self.fibers[id].instance.component().cloned() else {
            return false;
        };
        let meta = instance.borrow().meta.clone();
        meta.fiber.set(Some(id));
        let flags = self.fibers[id].flags;
        let has_effect = flags.contains(FiberFlags::HAS_UNCOMMITTED_EFFECT);
        if !has_effect && !flags.contains(FiberFlags::RESOLVED) {
            return false;
        }

        let transition = self.current_transition;
        let memo = meta.memo_for(transition);
        let rendered = flags.contains(FiberFlags::RENDERED);

        let mut snapshot = None;
        if has_effect && meta.mounted.get() && rendered {
            let committed = meta.committed.borrow().clone();
            let mut guard = instance.borrow_mut();
            let ComponentInstance {
                kind,
                props,
                state,
                context_value,
                updater,
                ..
            } = &mut *guard;
            if let InstanceKind::Class(component) = kind {
                let (next_props, next_state) = match &memo {
                    Some(memo) => (memo.props.clone(), memo.state.clone()),
                    None => (props.clone(), state.clone()),
                };
                let cx = ComponentCx {
                    props: &next_props,
                    state: &next_state,
                    context_value: context_value.as_ref(),
                    updater: &*updater,
                };
                let prev_props = committed.props.unwrap_or_else(|| next_props.clone());
                snapshot = component.capture_snapshot_before_update(&cx, &prev_props, &committed.state);
            }
        }
        self.fibers[id].snapshot = snapshot;

        let applied = memo.map_or(0, |memo| memo.applied);
        meta.clear_updates(self.update_type, transition, applied);
        meta.is_dirty.set(false);
        meta.force_update.set(false);

        let mut retry = false;
        if rendered {
            if let Some(boundary) = instance.borrow().class().and_then(|c| c.as_suspense()) {
                retry = boundary.commit(transition, flags.contains(FiberFlags::SHOWING_FALLBACK), &meta);
            }
        }

        if has_effect {
            self.post_commit_effects.push(id);
        } else {
            // Skipped render: the new values become the committed ones and
            // no lifecycle runs.
            let mut guard = instance.borrow_mut();
            let ComponentInstance { props, state, .. } = &mut *guard;
            commit_values(&meta, props, state, transition);
            meta.clear_memo();
        }

        self.update_type == UpdateType::Deferred
            && (retry || meta.has_updates_for(UpdateType::Deferred, transition))
    }

    fn post_commit(&mut self, id: FiberId) {
        let fiber = &mut self.fibers[id];
        let Some(instance) = fiber.instance.component().cloned() else {
            return;
        };
        let snapshot = fiber.snapshot.take();
        let child_error = fiber.child_error.clone();
        let rendered = fiber.flags.contains(FiberFlags::RENDERED);
        let update_type = self.update_type;
        let transition = self.current_transition;

        let mut guard = instance.borrow_mut();
        let ComponentInstance {
            kind,
            props,
            state,
            context_value,
            meta,
            updater,
        } = &mut *guard;

        let previous = commit_values(meta, props, state, transition);

        match kind {
            InstanceKind::Class(component) => {
                let cx = ComponentCx {
                    props: &*props,
                    state: &*state,
                    context_value: context_value.as_ref(),
                    updater: &*updater,
                };
                if !meta.mounted.get() {
                    component.on_mount(&cx);
                } else if rendered {
                    let prev_props = previous.props.unwrap_or_else(|| props.clone());
                    component.on_update(&cx, &prev_props, &previous.state, snapshot.as_ref());
                }
                if let Some(child_error) = &child_error {
                    component.on_catch_error(&cx, &child_error.error, &child_error.info);
                }
            }
            InstanceKind::Functional { hooks, .. } => {
                hooks.run_effects(update_type);
                if update_type == UpdateType::Deferred {
                    hooks.swap_queues();
                }
            }
        }

        meta.mounted.set(true);
        meta.clear_memo();
    }
}

/// Take the memoized values of `transition` (if any) and make them the
/// committed ones. Returns what was committed before.
fn commit_values(
    meta: &ComponentMeta,
    props: &mut Props,
    state: &mut State,
    transition: TransitionId,
) -> CommittedValues {
    if let Some(memo) = meta.memo_for(transition) {
        *props = memo.props;
        *state = memo.state;
    }
    meta.committed.replace(CommittedValues {
        props: Some(props.clone()),
        state: state.clone(),
    })
}
