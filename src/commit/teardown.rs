//! Teardown of committed subtrees that the new tree dropped.

use std::collections::HashSet;

use tracing::trace;

use crate::component::{ComponentCx, ComponentInstance, InstanceKind, InstanceRef};
use crate::fiber::{FiberId, FiberInstance};
use crate::host::{OutputHost, OutputId};
use crate::node::NodeKind;
use crate::scheduler::Root;

impl<H: OutputHost> Root<H> {
    /// Unmount every component under `top` (parents first), clear element
    /// refs and remove the output. Output nested in output that is already
    /// gone isn't removed separately.
    pub(crate) fn tear_down(&mut self, top: FiberId) {
        let mut released: HashSet<OutputId> = HashSet::new();
        for id in self.fibers.preorder(top) {
            let fiber = &self.fibers[id];
            let parent_gone = fiber
                .part
                .node()
                .is_some_and(|part| released.contains(&part.parent));
            let outputs = match &fiber.instance {
                FiberInstance::Tag(tag) => tag.nodes.clone(),
                FiberInstance::Text(Some(node)) => vec![*node],
                FiberInstance::Text(None) | FiberInstance::None | FiberInstance::Component(_) => Vec::new(),
            };
            let instance = fiber.instance.component().cloned();
            if let Some(NodeKind::Element(element)) = fiber.node.as_ref().map(|n| &n.kind) {
                if let Some(element_ref) = &element.element_ref {
                    element_ref.set(None);
                }
            }

            if let Some(instance) = instance {
                unmount_component(&instance);
            }
            for node in outputs {
                if !parent_gone {
                    self.host.remove(node);
                }
                released.insert(node);
            }
        }
    }
}

fn unmount_component(instance: &InstanceRef) {
    let mut guard = instance.borrow_mut();
    let ComponentInstance {
        kind,
        props,
        state,
        context_value,
        meta,
        updater,
    } = &mut *guard;
    trace!(component = meta.name, "unmount");

    match kind {
        InstanceKind::Class(component) => {
            if meta.mounted.get() {
                let cx = ComponentCx {
                    props: &*props,
                    state: &*state,
                    context_value: context_value.as_ref(),
                    updater: &*updater,
                };
                component.on_unmount(&cx);
            }
        }
        InstanceKind::Functional { hooks, .. } => hooks.tear_down(),
    }
    meta.mounted.set(false);
    meta.fiber.set(None);
    meta.clear_memo();
}
