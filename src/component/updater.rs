//! Handle for queueing updates on a component.

use std::rc::Rc;

use super::{ComponentMeta, PendingUpdate, StateUpdate};
use crate::scheduler::{SYNC_TRANSITION, Transition};
use crate::types::{Props, State};

/// Cloneable handle to one component instance.
///
/// Updates queued here are applied by the next pass of the matching
/// priority: [`set_state`](Self::set_state) by the next sync pass,
/// [`set_state_in`](Self::set_state_in) by the deferred pass of its
/// transition.
#[derive(Clone)]
pub struct Updater {
    meta: Rc<ComponentMeta>,
}

impl Updater {
    pub(crate) fn new(meta: Rc<ComponentMeta>) -> Self {
        Self { meta }
    }

    pub fn set_state(&self, update: impl Into<StateUpdate>) {
        self.push(update.into(), None, SYNC_TRANSITION);
    }

    /// Like [`set_state`](Self::set_state); `callback` receives the state
    /// once the update has been applied.
    pub fn set_state_with(&self, update: impl Into<StateUpdate>, callback: impl Fn(&State) + 'static) {
        self.push(update.into(), Some(Rc::new(callback)), SYNC_TRANSITION);
    }

    /// Sync update computed from the accumulated state and the props.
    pub fn update(&self, f: impl Fn(&State, &Props) -> crate::types::Record + 'static) {
        self.push(StateUpdate::reduce(f), None, SYNC_TRANSITION);
    }

    /// Deferred update belonging to `transition`.
    pub fn set_state_in(&self, transition: Transition, update: impl Into<StateUpdate>) {
        self.push(update.into(), None, transition.id());
    }

    /// Re-render on the next sync pass, bypassing `should_update`.
    pub fn force_update(&self) {
        self.meta.force_update.set(true);
        self.meta.mark_dirty();
    }

    fn push(
        &self,
        update: StateUpdate,
        callback: Option<super::UpdateCallback>,
        transition: crate::scheduler::TransitionId,
    ) {
        tracing::trace!(component = self.meta.name, ?transition, "queue update");
        self.meta.enqueue(PendingUpdate {
            update,
            callback,
            transition,
        });
    }

    pub fn committed_state(&self) -> State {
        self.meta.committed.borrow().state.clone()
    }

    pub fn committed_props(&self) -> Option<Props> {
        self.meta.committed.borrow().props.clone()
    }

    pub fn render_count(&self) -> u32 {
        self.meta.render_count.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.meta.mounted.get()
    }

    pub fn pending_update_count(&self) -> usize {
        self.meta.pending_update_count()
    }

    pub fn name(&self) -> &'static str {
        self.meta.name
    }

    pub(crate) fn meta(&self) -> &Rc<ComponentMeta> {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{SchedulerShared, start_transition};
    use crate::types::Record;

    #[test]
    fn test_updater_routes_by_priority() {
        let shared = SchedulerShared::new();
        let meta = Rc::new(ComponentMeta::new("Counter", Rc::downgrade(&shared)));
        let updater = Updater::new(meta);

        let transition = start_transition();
        updater.set_state_in(transition, Record::new().with("n", 1));
        assert!(!shared.sync_requested());
        assert!(shared.is_pending(transition.id()));

        updater.force_update();
        assert!(shared.sync_requested(), "force update asks for a sync pass");
        assert_eq!(updater.pending_update_count(), 1);
        assert_eq!(updater.name(), "Counter");
    }
}
