//! The work loop - walking the tree in progress one fiber at a time.
//!
//! Fibers are visited in depth-first pre-order. Processing a fiber creates
//! (or reuses) its children, so the walk discovers the new tree as it goes.
//! A fiber that needs no work reuses its committed children; when nothing
//! below it has work either, the whole subtree is cloned in one step and the
//! walk moves past it. A boundary that catches a suspension or an error sets
//! `retry_fiber`; the walk continues from there instead of the next fiber in
//! order.

use std::rc::Rc;

use tracing::trace;

use super::{Deadline, LoopOutcome, Root};
use crate::error::FiberError;
use crate::fiber::{FiberFlags, FiberId, FiberInstance};
use crate::host::OutputHost;
use crate::node::{NodeKind, NodeRef};
use crate::types::UpdateType;

impl<H: OutputHost> Root<H> {
    pub(crate) fn work_loop(&mut self, deadline: &mut dyn Deadline) -> Result<LoopOutcome, FiberError> {
        let Some(wip) = self.wip else {
            return Ok(LoopOutcome::Completed);
        };
        let mut next = wip.next;

        while let Some(id) = next {
            if self.update_type == UpdateType::Deferred {
                if self.shared.sync_requested() {
                    return Ok(LoopOutcome::Preempted);
                }
                if deadline.should_yield() {
                    self.set_next(Some(id));
                    trace!("deferred pass yields");
                    return Ok(LoopOutcome::Yielded);
                }
            }

            let descend = self.process_fiber(id)?;

            next = match self.retry_fiber.take() {
                Some(retry) => Some(retry),
                None if descend => self.fibers.next_fiber(id, wip.top),
                None => self.fibers.next_after_subtree(id, wip.top),
            };
        }

        self.set_next(None);
        Ok(LoopOutcome::Completed)
    }

    fn set_next(&mut self, next: Option<FiberId>) {
        if let Some(wip) = self.wip.as_mut() {
            wip.next = next;
        }
    }

    /// Returns false when the walk must not descend into the fiber's
    /// children.
    fn process_fiber(&mut self, id: FiberId) -> Result<bool, FiberError> {
        if self.fibers[id].flags.contains(FiberFlags::ROOT) {
            return Ok(self.process_root_fiber(id));
        }
        let Some(node) = self.fibers[id].node.clone() else {
            return Ok(true);
        };

        if !self.needs_work(id, &node) {
            return Ok(self.reuse_children(id));
        }

        match &node.kind {
            NodeKind::Component(_) => return self.process_component_fiber(id, &node),
            NodeKind::Element(element) => self.process_element_fiber(id, element),
            NodeKind::Template(template) => self.process_template_fiber(id, template)?,
            NodeKind::List(items) => self.process_list_fiber(id, items),
            NodeKind::Text(text) => self.process_text_fiber(id, text),
            NodeKind::Attribute(attributes) => self.process_attribute_fiber(id, attributes),
        }
        Ok(true)
    }

    /// A fiber needs work when it is new, its node changed, a boundary
    /// retries from it, or (for components) it is dirty or has updates for
    /// this pass.
    fn needs_work(&self, id: FiberId, node: &NodeRef) -> bool {
        if self.fibers[id].flags.contains(FiberFlags::RETRY) {
            return true;
        }
        let Some(alternate) = self.fibers.alternate(id) else {
            return true;
        };
        let unchanged = self.fibers[alternate]
            .node
            .as_ref()
            .is_some_and(|old| Rc::ptr_eq(old, node));
        if !unchanged {
            return true;
        }
        match &self.fibers[id].instance {
            FiberInstance::Component(instance) => instance
                .borrow()
                .meta
                .has_work_for(self.update_type, self.current_transition),
            _ => false,
        }
    }

    /// Give a fiber that needs no work its committed children. Returns
    /// whether the walk has to visit them: when no component below has
    /// work, the subtree is cloned whole instead.
    pub(crate) fn reuse_children(&mut self, id: FiberId) -> bool {
        let descend = self
            .fibers
            .alternate(id)
            .is_some_and(|alternate| self.subtree_has_work(alternate));
        if descend {
            self.clone_children(id);
        } else {
            self.clone_subtree(id);
        }
        descend
    }

    /// True when a component under the committed fiber `top` has work for
    /// this pass.
    fn subtree_has_work(&self, top: FiberId) -> bool {
        self.shared
            .components_with_work(self.update_type, self.current_transition)
            .iter()
            .filter_map(|meta| meta.fiber.get())
            .any(|fiber| self.fibers.ancestors(fiber).any(|ancestor| ancestor == top))
    }

    /// Clone the committed subtree below `id` as it is.
    fn clone_subtree(&mut self, id: FiberId) {
        let mut stack = vec![id];
        while let Some(parent) = stack.pop() {
            self.clone_children(parent);
            stack.extend(self.fibers.children(parent));
        }
    }

    /// Root fibers render the root's element.
    fn process_root_fiber(&mut self, id: FiberId) -> bool {
        let old_child = self.fibers.alternate(id).and_then(|alt| self.fibers[alt].child);
        let old_node = old_child.and_then(|child| self.fibers[child].node.clone());
        let unchanged = match (&self.element, &old_node) {
            (Some(new), Some(old)) => Rc::ptr_eq(new, old),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return self.reuse_children(id);
        }
        self.reset_to_committed_child(id);
        let part = self.fibers[id].part;
        self.create_and_link(id, self.element.clone(), part, old_child, None, 0);
        true
    }

    /// Remove `top` and its subtree from the arena. Output created for new
    /// fibers of this pass is handed back to the host.
    pub(crate) fn discard_subtree(&mut self, top: FiberId) {
        for id in self.fibers.preorder(top) {
            let Some(fiber) = self.fibers.remove(id) else {
                continue;
            };
            let is_new = fiber.alternate.is_none_or(|alt| !self.fibers.contains(alt));
            if !is_new {
                continue;
            }
            match &fiber.instance {
                FiberInstance::Tag(tag) => {
                    for node in &tag.nodes {
                        self.host.remove(*node);
                    }
                }
                FiberInstance::Component(instance) => {
                    let instance = instance.borrow();
                    if let Some(boundary) = instance.class().and_then(|c| c.as_suspense()) {
                        boundary.tear_down();
                    }
                }
                FiberInstance::Text(_) | FiberInstance::None => {}
            }
        }
    }

    /// Drop the children built for `id` earlier in this pass.
    pub(crate) fn reset_to_committed_child(&mut self, id: FiberId) {
        for child in self.fibers.children(id) {
            self.discard_subtree(child);
        }
        self.fibers[id].child = None;
    }
}
