//! Effect queues for functional components.
//!
//! A functional component queues effects while it renders. They run after
//! the commit that made the render visible. Sync and deferred passes queue
//! into separate lists so a deferred render that never commits can't leak
//! its effects into a sync commit; after a deferred commit the lists swap.

use std::rc::Rc;

use super::{ComponentMeta, Context, ContextMap, Updater};
use crate::scheduler::TransitionId;
use crate::types::{UpdateType, Value};

/// Teardown returned by an effect.
pub type Cleanup = Box<dyn FnOnce()>;

/// Effect queued during render.
pub type Effect = Box<dyn FnOnce() -> Option<Cleanup>>;

pub trait HookStore {
    /// Start a render of `update_type`; drops effects left from an earlier
    /// render of the same type.
    fn prepare(&mut self, update_type: UpdateType);

    fn queue_effect(&mut self, effect: Effect);

    /// Run the effects queued for `update_type`, cleaning up the previous
    /// run first.
    fn run_effects(&mut self, update_type: UpdateType);

    fn swap_queues(&mut self);

    /// Run outstanding cleanups; the component is gone.
    fn tear_down(&mut self);
}

#[derive(Default)]
pub struct EffectQueues {
    current: UpdateType,
    sync: Vec<Effect>,
    deferred: Vec<Effect>,
    cleanups: Vec<Cleanup>,
}

impl EffectQueues {
    fn queue(&mut self, update_type: UpdateType) -> &mut Vec<Effect> {
        match update_type {
            UpdateType::Sync => &mut self.sync,
            UpdateType::Deferred => &mut self.deferred,
        }
    }

    fn run_cleanups(&mut self) {
        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
    }
}

impl HookStore for EffectQueues {
    fn prepare(&mut self, update_type: UpdateType) {
        self.current = update_type;
        self.queue(update_type).clear();
    }

    fn queue_effect(&mut self, effect: Effect) {
        let current = self.current;
        self.queue(current).push(effect);
    }

    fn run_effects(&mut self, update_type: UpdateType) {
        let effects = std::mem::take(self.queue(update_type));
        if effects.is_empty() {
            return;
        }
        self.run_cleanups();
        self.cleanups = effects.into_iter().filter_map(|effect| effect()).collect();
    }

    fn swap_queues(&mut self) {
        std::mem::swap(&mut self.sync, &mut self.deferred);
    }

    fn tear_down(&mut self) {
        self.sync.clear();
        self.deferred.clear();
        self.run_cleanups();
    }
}

// =============================================================================
// Hook Context
// =============================================================================

/// What a functional component sees while rendering.
pub struct HookCx<'a> {
    pub(crate) hooks: &'a mut dyn HookStore,
    pub(crate) context: &'a ContextMap,
    pub(crate) meta: &'a Rc<ComponentMeta>,
    pub(crate) updater: &'a Updater,
    pub(crate) transition: TransitionId,
    pub(crate) first_render: bool,
}

impl HookCx<'_> {
    /// Queue `effect` to run after this render commits. The returned cleanup
    /// runs before the next batch of effects or on unmount.
    pub fn use_effect(&mut self, effect: impl FnOnce() -> Option<Cleanup> + 'static) {
        self.hooks.queue_effect(Box::new(effect));
    }

    /// Value of the nearest provider of `context`, subscribing on first use.
    pub fn use_context(&mut self, context: &Context) -> Value {
        let (value, provider) = context.resolve(self.context, self.transition);
        if self.first_render {
            if let Some(provider) = provider {
                provider.borrow().meta.subscribe(self.meta);
            }
        }
        value
    }

    pub fn updater(&self) -> &Updater {
        self.updater
    }

    pub fn render_count(&self) -> u32 {
        self.meta.render_count.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn logger(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> Effect {
        let log = log.clone();
        Box::new(move || {
            log.borrow_mut().push(format!("run {name}"));
            let log = log.clone();
            Some(Box::new(move || log.borrow_mut().push(format!("cleanup {name}"))) as Cleanup)
        })
    }

    #[test]
    fn test_effects_run_after_previous_cleanup() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queues = EffectQueues::default();

        queues.prepare(UpdateType::Sync);
        queues.queue_effect(logger(&log, "a"));
        queues.run_effects(UpdateType::Sync);

        queues.prepare(UpdateType::Sync);
        queues.queue_effect(logger(&log, "b"));
        queues.run_effects(UpdateType::Sync);

        queues.tear_down();
        assert_eq!(
            *log.borrow(),
            vec!["run a", "cleanup a", "run b", "cleanup b"],
            "each batch cleans up the previous one"
        );
    }

    #[test]
    fn test_deferred_effects_stay_out_of_sync_commit() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queues = EffectQueues::default();

        queues.prepare(UpdateType::Deferred);
        queues.queue_effect(logger(&log, "deferred"));

        queues.prepare(UpdateType::Sync);
        queues.queue_effect(logger(&log, "sync"));
        queues.run_effects(UpdateType::Sync);

        assert_eq!(*log.borrow(), vec!["run sync"], "deferred effect waits for its commit");

        queues.run_effects(UpdateType::Deferred);
        assert_eq!(*log.borrow(), vec!["run sync", "cleanup sync", "run deferred"]);
    }
}
