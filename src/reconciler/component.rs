//! Component fibers.
//!
//! Processing a component fiber:
//! 1. create the instance on first render
//! 2. extend the context map if the component is a provider
//! 3. resolve props and state: start from the memoized values of this
//!    transition if any, else the committed ones, then apply the updates
//!    this pass hasn't applied yet and the derive hooks
//! 4. decide whether to render (`is_pure`, `should_update`, force)
//! 5. render, and either link the child or route the interrupt to the
//!    nearest boundary

use std::rc::Rc;

use tracing::{debug, error, trace};

use crate::boundary::{ChildError, ErrorInfo, PendingValue, closest_suspense_fiber, component_stack, error_boundary_fiber};
use crate::component::{
    ComponentCx, ComponentInstance, ComponentMeta, ContextMap, HookCx, InstanceKind, InstanceRef, MemoizedValues,
    RenderResult, extend_context, reduce_updates,
};
use crate::error::{ComponentError, FiberError, Interrupt};
use crate::fiber::{FiberFlags, FiberId, FiberInstance};
use crate::host::OutputHost;
use crate::node::NodeRef;
use crate::scheduler::Root;
use crate::types::{Props, UpdateType, shallow_equal};

impl<H: OutputHost> Root<H> {
    /// Returns false when the skipped component's subtree was cloned whole.
    pub(crate) fn process_component_fiber(&mut self, id: FiberId, node: &NodeRef) -> Result<bool, FiberError> {
        let Some(component_node) = node.as_component() else {
            return Ok(true);
        };
        self.reset_to_committed_child(id);
        self.fibers[id]
            .flags
            .remove(FiberFlags::RENDERED | FiberFlags::SHOWING_FALLBACK);
        self.fibers[id].flags.insert(FiberFlags::RESOLVED);

        let update_type = self.update_type;
        let transition = self.current_transition;
        let props = &component_node.props;

        let (instance, first_render) = match self.fibers[id].instance.component() {
            Some(instance) => (instance.clone(), false),
            None => {
                let instance =
                    ComponentInstance::create(&component_node.component, props, Rc::downgrade(&self.shared));
                self.fibers[id].instance = FiberInstance::Component(instance.clone());
                (instance, true)
            }
        };
        let meta = instance.borrow().meta.clone();

        let parent_context = self.fibers[id]
            .parent
            .map(|parent| self.fibers[parent].context.clone())
            .unwrap_or_default();
        let context = extend_context(&parent_context, &component_node.component, &instance);
        self.fibers[id].context = context.clone();

        if !first_render && component_node.component.provides().is_some() {
            notify_if_value_changed(&meta, props);
        }

        // -------------------------------------------------------------------------
        // Props and state
        // -------------------------------------------------------------------------

        let memo = meta.memo_for(transition);
        let used_memo = memo.is_some();
        let (prev_props, prev_state, applied) = match memo {
            Some(memo) => (memo.props, memo.state, memo.applied),
            None => {
                let committed = meta.committed.borrow();
                let prev_props = committed.props.clone().unwrap_or_else(|| props.clone());
                (prev_props, committed.state.clone(), 0)
            }
        };

        let updates = meta.updates_for(update_type, transition);
        let fresh = updates.get(applied..).unwrap_or_default();
        let mut state = reduce_updates(&prev_state, props, fresh);

        let child_error = self.fibers[id].child_error.clone();
        let mut error_handled = false;
        if let Some(component) = instance.borrow().class() {
            if let Some(derived) = component.derive_state_from_props(props, &state) {
                state = state.merge(&derived);
            }
            if let Some(child_error) = &child_error {
                if let Some(derived) = component.derive_state_from_error(&child_error.error) {
                    state = state.merge(&derived);
                    error_handled = true;
                }
            }
        }

        for update in fresh {
            if let Some(callback) = &update.callback {
                callback(&state);
            }
        }

        let mut should_update = true;
        if !first_render && !meta.force_update.get() {
            if let Some(component) = instance.borrow().class() {
                if component.is_pure() {
                    should_update = !shallow_equal(&state, &prev_state) || !shallow_equal(props, &prev_props);
                }
                if should_update {
                    should_update = component.should_update(&prev_props, &prev_state, props, &state);
                }
            }
        }

        let context_type = instance.borrow().class().and_then(|c| c.context_type());
        if let Some(context_type) = context_type {
            let (value, provider) = context_type.resolve(&context, transition);
            if first_render {
                if let Some(provider) = provider.filter(|p| !Rc::ptr_eq(p, &instance)) {
                    provider.borrow().meta.subscribe(&meta);
                }
            }
            instance.borrow_mut().context_value = Some(value);
        }

        meta.store_memo(MemoizedValues {
            props: props.clone(),
            state: state.clone(),
            transition,
            applied: updates.len(),
        });

        if !should_update {
            trace!(component = meta.name, "render skipped");
            // The new props and state still commit, without lifecycles.
            if child_error.is_some() {
                self.mark_pending_effect(id);
            }
            if used_memo {
                self.relink_memoized_child(id, &meta);
                return Ok(true);
            }
            return Ok(self.reuse_children(id));
        }

        // -------------------------------------------------------------------------
        // Render
        // -------------------------------------------------------------------------

        {
            let mut instance = instance.borrow_mut();
            instance.props = props.clone();
            instance.state = state;
        }
        meta.render_count.set(meta.render_count.get() + 1);
        self.fibers[id].flags.insert(FiberFlags::RENDERED);

        // A boundary holding an error it can't derive state from renders
        // nothing.
        if let Some(boundary) = instance.borrow().class().and_then(|c| c.as_suspense()) {
            boundary.begin_render(transition);
        }
        let result = if child_error.is_some() && !error_handled {
            Ok(None)
        } else {
            self.render_instance(&instance, &meta, &context, first_render)
        };

        if update_type == UpdateType::Deferred {
            instance.borrow_mut().reset_to_committed();
        }

        let showing_fallback = instance
            .borrow()
            .class()
            .and_then(|c| c.as_suspense())
            .is_some_and(|boundary| boundary.renders_fallback());
        self.fibers[id]
            .flags
            .set(FiberFlags::SHOWING_FALLBACK, showing_fallback);

        match result {
            Ok(child) => {
                *meta.nodes.borrow_mut() = child.clone();
                let part = self.fibers[id].part;
                let old_child = self.fibers.alternate(id).and_then(|alt| self.fibers[alt].child);
                self.create_and_link(id, child, part, old_child, None, 0);
                self.mark_pending_effect(id);
                Ok(true)
            }
            Err(Interrupt::Pending(pending)) => self.handle_suspension(id, pending).map(|()| true),
            Err(Interrupt::Error(error)) => self.handle_render_error(id, error).map(|()| true),
        }
    }

    fn render_instance(
        &self,
        instance: &InstanceRef,
        meta: &Rc<ComponentMeta>,
        context: &ContextMap,
        first_render: bool,
    ) -> RenderResult {
        let mut guard = instance.borrow_mut();
        let ComponentInstance {
            kind,
            props,
            state,
            context_value,
            updater,
            ..
        } = &mut *guard;
        match kind {
            InstanceKind::Class(component) => {
                let cx = ComponentCx {
                    props: &*props,
                    state: &*state,
                    context_value: context_value.as_ref(),
                    updater: &*updater,
                };
                component.render(&cx)
            }
            InstanceKind::Functional { render, hooks } => {
                hooks.prepare(self.update_type);
                let mut cx = HookCx {
                    hooks: hooks.as_mut(),
                    context,
                    meta,
                    updater: &*updater,
                    transition: self.current_transition,
                    first_render,
                };
                (*render)(&*props, &mut cx)
            }
        }
    }

    /// `should_update` said no, but an earlier attempt of this transition
    /// rendered a child the committed tree doesn't have yet. Keep that one.
    fn relink_memoized_child(&mut self, id: FiberId, meta: &ComponentMeta) {
        let rendered = meta.nodes.borrow().clone();
        let old_child = self.fibers.alternate(id).and_then(|alt| self.fibers[alt].child);
        let old_node = old_child.and_then(|child| self.fibers[child].node.clone());
        let unchanged = match (&rendered, &old_node) {
            (Some(rendered), Some(old)) => Rc::ptr_eq(rendered, old),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            self.clone_children(id);
        } else {
            let part = self.fibers[id].part;
            self.create_and_link(id, rendered, part, old_child, None, 0);
            self.mark_pending_effect(id);
        }
    }

    // =========================================================================
    // Interrupts
    // =========================================================================

    fn handle_suspension(&mut self, id: FiberId, pending: PendingValue) -> Result<(), FiberError> {
        let component = self.fibers[id].component_name().unwrap_or("Anonymous");
        let Some(boundary) = closest_suspense_fiber(&self.fibers, id) else {
            return Err(FiberError::SuspendedOutsideBoundary { component });
        };
        debug!(component, pending = pending.id(), "render suspended");

        if let Some(instance) = self.fibers[boundary].instance.component().cloned() {
            let instance = instance.borrow();
            if let Some(suspense) = instance.class().and_then(|c| c.as_suspense()) {
                suspense.suspend(pending, self.current_transition, &instance.meta);
                self.suspended_boundaries.push(suspense.clone());
            }
        }
        self.retry_from(boundary);
        Ok(())
    }

    fn handle_render_error(&mut self, id: FiberId, error: ComponentError) -> Result<(), FiberError> {
        let component = self.fibers[id].component_name().unwrap_or("Anonymous");
        let component_stack = component_stack(&self.fibers, id);

        let boundary = error_boundary_fiber(&self.fibers, id)
            .filter(|boundary| self.fibers[*boundary].child_error.is_none());
        let Some(boundary) = boundary else {
            return Err(FiberError::Unhandled {
                component,
                error,
                component_stack,
            });
        };

        if self.options.log_handled_errors {
            error!(
                component,
                error = %error,
                "The above error occurred in the <{component}> component:\n{component_stack}"
            );
        }
        self.fibers[boundary].child_error = Some(ChildError {
            error,
            info: ErrorInfo { component_stack },
        });
        self.retry_from(boundary);
        Ok(())
    }

    /// Continue the work loop from `boundary`, which must re-render.
    fn retry_from(&mut self, boundary: FiberId) {
        self.fibers[boundary].flags.insert(FiberFlags::RETRY);
        self.retry_fiber = Some(boundary);
    }
}

/// Mark the consumers of a provider dirty when its `value` prop changed.
fn notify_if_value_changed(meta: &ComponentMeta, props: &Props) {
    let committed = meta
        .committed
        .borrow()
        .props
        .as_ref()
        .and_then(|p| p.get("value").cloned());
    let changed = match (committed, props.get("value")) {
        (Some(old), Some(new)) => !old.is_same(new),
        (None, None) => false,
        _ => true,
    };
    if changed {
        trace!(provider = meta.name, "context value changed");
        meta.notify_subscribers();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::component::{Component, ComponentCx, ComponentMeta, RenderResult, Updater};
    use crate::fiber::FiberFlags;
    use crate::host::MemoryHost;
    use crate::node::{class, element};
    use crate::scheduler::{FiberBudget, Root, SYNC_TRANSITION, Unbounded, WorkStatus, start_transition};
    use crate::types::{Props, Record, UpdateType};

    struct Parent;

    impl Component for Parent {
        fn new(_props: &Props) -> Self {
            Parent
        }

        fn render(&self, cx: &ComponentCx<'_>) -> RenderResult {
            let tick = cx.state().int("tick").unwrap_or(0);
            Ok(Some(
                element("div")
                    .child(class::<Kid>(Record::new().with("label", "fixed")))
                    .text(format!("tick {tick}"))
                    .into(),
            ))
        }
    }

    struct Kid;

    impl Component for Kid {
        fn new(_props: &Props) -> Self {
            Kid
        }

        fn is_pure(&self) -> bool {
            true
        }

        fn render(&self, cx: &ComponentCx<'_>) -> RenderResult {
            let label = cx.props().str("label").unwrap_or_default().to_string();
            Ok(Some(element("p").text(label).into()))
        }
    }

    fn mount_parent() -> Root<MemoryHost> {
        let host = MemoryHost::new();
        let container = host.container();
        let mut root = Root::new(host, container);
        root.render(class::<Parent>(Record::new())).expect("mount");
        root
    }

    /// Components of the tree in progress that carry an effect.
    fn components_with_effects(root: &Root<MemoryHost>) -> Vec<&'static str> {
        let Some(wip) = root.wip else {
            return Vec::new();
        };
        root.fibers
            .preorder(wip.top)
            .into_iter()
            .map(|id| &root.fibers[id])
            .filter(|fiber| fiber.has_effect())
            .filter_map(|fiber| fiber.component_name())
            .collect()
    }

    fn committed_metas(root: &Root<MemoryHost>) -> Vec<Rc<ComponentMeta>> {
        root.fibers
            .preorder(root.current)
            .into_iter()
            .filter_map(|id| root.fibers[id].instance.component().cloned())
            .map(|instance| instance.borrow().meta.clone())
            .collect()
    }

    fn parent_updater(root: &Root<MemoryHost>) -> Updater {
        root.fibers
            .preorder(root.current)
            .into_iter()
            .find(|id| root.fibers[*id].component_name() == Some("Parent"))
            .and_then(|id| root.fibers[id].instance.component().cloned())
            .map(|instance| instance.borrow().updater.clone())
            .expect("Parent is mounted")
    }

    #[test]
    fn test_skipped_child_records_no_effect() {
        let mut root = mount_parent();
        root.schedule_render(class::<Parent>(Record::new()));
        root.begin_pass(UpdateType::Sync, SYNC_TRANSITION);
        root.work_loop(&mut Unbounded).expect("work loop");

        assert_eq!(components_with_effects(&root), ["Parent"], "the pure kid kept its output");
        let kid = root
            .wip
            .map(|wip| root.fibers.preorder(wip.top))
            .unwrap_or_default()
            .into_iter()
            .find(|id| root.fibers[*id].component_name() == Some("Kid"))
            .expect("kid fiber");
        assert!(root.fibers[kid].flags.contains(FiberFlags::RESOLVED));
        assert!(!root.fibers[kid].flags.contains(FiberFlags::RENDERED));
        root.abandon_pass();
    }

    #[test]
    fn test_unchanged_tree_records_no_effect() {
        let mut root = mount_parent();
        root.handle().request_sync();
        root.begin_pass(UpdateType::Sync, SYNC_TRANSITION);
        root.work_loop(&mut Unbounded).expect("work loop");

        assert!(components_with_effects(&root).is_empty());
        root.commit();
        assert!(!root.has_work());
    }

    #[test]
    fn test_deferred_commit_leaves_no_memo() {
        let mut root = mount_parent();
        let transition = start_transition();
        parent_updater(&root).set_state_in(transition, Record::new().with("tick", 1));

        assert_eq!(root.tick(&mut FiberBudget::new(3)).expect("tick"), WorkStatus::Yielded);
        assert!(
            committed_metas(&root)
                .iter()
                .any(|meta| meta.memo_for(transition.id()).is_some()),
            "the pass in progress memoizes what it resolved"
        );

        root.flush().expect("finish the transition");
        assert!(!root.shared.is_pending(transition.id()));
        assert_eq!(root.host().markup(), "<div><p>fixed</p>tick 1</div>");
        for meta in committed_metas(&root) {
            assert!(meta.memo_for(transition.id()).is_none(), "{} kept a memo", meta.name);
        }
    }
}
