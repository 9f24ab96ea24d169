//! Component authoring contract.
//!
//! Two kinds of components:
//! - [`Component`] - a value with lifecycle hooks; props and state are owned
//!   by the engine and passed in through [`ComponentCx`]
//! - [`FunctionalComponent`] - a render fn with a [`HookStore`] for effects
//!
//! Render code returns a [`RenderResult`]: `Ok(Some(node))` to render,
//! `Ok(None)` to render nothing, `Err(Interrupt::Pending(..))` to suspend, or
//! `Err(Interrupt::Error(..))` to fail.
//!
//! # Example
//!
//! ```ignore
//! struct Counter;
//!
//! impl Component for Counter {
//!     fn new(_props: &Props) -> Self { Counter }
//!
//!     fn initial_state(&self, _props: &Props) -> State {
//!         Record::new().with("count", 0)
//!     }
//!
//!     fn render(&self, cx: &ComponentCx<'_>) -> RenderResult {
//!         let count = cx.state().int("count").unwrap_or(0);
//!         Ok(Some(text(count.to_string()).into()))
//!     }
//! }
//! ```

mod context;
mod hooks;
mod instance;
mod updater;

pub use context::*;
pub use hooks::*;
pub use instance::*;
pub use updater::*;

use std::any::TypeId;
use std::fmt;

use crate::boundary::{ErrorInfo, SuspenseBoundary};
use crate::error::{ComponentError, Interrupt};
use crate::node::NodeRef;
use crate::types::{Props, State, Value};

pub type RenderResult = Result<Option<NodeRef>, Interrupt>;

pub type RenderFn = fn(&Props, &mut HookCx<'_>) -> RenderResult;

/// Last path segment of a type name.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// =============================================================================
// Component Traits
// =============================================================================

pub trait Component: 'static {
    fn new(props: &Props) -> Self
    where
        Self: Sized;

    /// Name shown in component stacks.
    fn name() -> &'static str
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }

    fn initial_state(&self, _props: &Props) -> State {
        State::new()
    }

    fn render(&self, cx: &ComponentCx<'_>) -> RenderResult;

    /// Keys to merge into the state whenever the component reconciles.
    fn derive_state_from_props(&self, _props: &Props, _state: &State) -> Option<State> {
        None
    }

    /// Keys to merge into the state after a descendant failed.
    fn derive_state_from_error(&self, _error: &ComponentError) -> Option<State> {
        None
    }

    /// Whether render errors of descendants stop at this component.
    fn catches_errors(&self) -> bool {
        false
    }

    /// Skip rendering when props and state are shallowly equal.
    fn is_pure(&self) -> bool {
        false
    }

    fn should_update(
        &self,
        _prev_props: &Props,
        _prev_state: &State,
        _next_props: &Props,
        _next_state: &State,
    ) -> bool {
        true
    }

    /// Runs during commit, before any output changes.
    fn capture_snapshot_before_update(
        &mut self,
        _cx: &ComponentCx<'_>,
        _prev_props: &Props,
        _prev_state: &State,
    ) -> Option<Value> {
        None
    }

    fn on_mount(&mut self, _cx: &ComponentCx<'_>) {}

    fn on_update(
        &mut self,
        _cx: &ComponentCx<'_>,
        _prev_props: &Props,
        _prev_state: &State,
        _snapshot: Option<&Value>,
    ) {
    }

    fn on_catch_error(&mut self, _cx: &ComponentCx<'_>, _error: &ComponentError, _info: &ErrorInfo) {}

    fn on_unmount(&mut self, _cx: &ComponentCx<'_>) {}

    /// Context whose nearest provider value is exposed as
    /// [`ComponentCx::context_value`].
    fn context_type(&self) -> Option<Context> {
        None
    }

    fn as_suspense(&self) -> Option<&SuspenseBoundary> {
        None
    }
}

pub trait FunctionalComponent: 'static {
    fn render(props: &Props, cx: &mut HookCx<'_>) -> RenderResult;

    fn name() -> &'static str {
        short_type_name::<Self>()
    }

    fn hook_store() -> Box<dyn HookStore> {
        Box::new(EffectQueues::default())
    }
}

// =============================================================================
// Component Type
// =============================================================================

#[derive(Clone, Copy)]
pub enum ComponentKind {
    Class(fn(&Props) -> Box<dyn Component>),
    Functional {
        render: RenderFn,
        hooks: fn() -> Box<dyn HookStore>,
    },
}

/// Descriptor of a component type. Two descriptors are the same type when
/// they come from the same Rust type (and, for providers, the same context).
#[derive(Clone)]
pub struct ComponentType {
    type_id: TypeId,
    name: &'static str,
    kind: ComponentKind,
    provides: Option<ContextId>,
}

fn construct_class<C: Component>(props: &Props) -> Box<dyn Component> {
    Box::new(C::new(props))
}

impl ComponentType {
    pub fn class<C: Component>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: C::name(),
            kind: ComponentKind::Class(construct_class::<C>),
            provides: None,
        }
    }

    pub fn functional<F: FunctionalComponent>() -> Self {
        Self {
            type_id: TypeId::of::<F>(),
            name: F::name(),
            kind: ComponentKind::Functional {
                render: F::render,
                hooks: F::hook_store,
            },
            provides: None,
        }
    }

    pub(crate) fn provider(context: ContextId) -> Self {
        Self {
            provides: Some(context),
            ..Self::class::<ContextProvider>()
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, ComponentKind::Class(_))
    }

    /// Context this type provides, for context providers.
    pub fn provides(&self) -> Option<ContextId> {
        self.provides
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.provides == other.provides
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.name)
            .field("provides", &self.provides)
            .finish()
    }
}

// =============================================================================
// Component Context
// =============================================================================

/// What a class component sees while rendering or running a lifecycle hook.
pub struct ComponentCx<'a> {
    pub(crate) props: &'a Props,
    pub(crate) state: &'a State,
    pub(crate) context_value: Option<&'a Value>,
    pub(crate) updater: &'a Updater,
}

impl<'a> ComponentCx<'a> {
    pub fn props(&self) -> &'a Props {
        self.props
    }

    pub fn state(&self) -> &'a State {
        self.state
    }

    pub fn context_value(&self) -> Option<&'a Value> {
        self.context_value
    }

    pub fn updater(&self) -> &'a Updater {
        self.updater
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;

    struct Plain;

    impl Component for Plain {
        fn new(_props: &Props) -> Self {
            Plain
        }

        fn render(&self, _cx: &ComponentCx<'_>) -> RenderResult {
            Ok(None)
        }
    }

    struct Other;

    impl FunctionalComponent for Other {
        fn render(_props: &Props, _cx: &mut HookCx<'_>) -> RenderResult {
            Ok(None)
        }
    }

    #[test]
    fn test_component_type_identity() {
        assert_eq!(ComponentType::class::<Plain>(), ComponentType::class::<Plain>());
        assert_ne!(ComponentType::class::<Plain>(), ComponentType::functional::<Other>());
        assert!(ComponentType::class::<Plain>().is_class());
        assert!(!ComponentType::functional::<Other>().is_class());
    }

    #[test]
    fn test_names() {
        assert_eq!(ComponentType::class::<Plain>().name(), "Plain");
        assert_eq!(ComponentType::functional::<Other>().name(), "Other");
    }

    #[test]
    fn test_providers_differ_by_context() {
        let a = create_context(Record::new());
        let b = create_context(Record::new());
        assert_ne!(a.provider_type(), b.provider_type());
        assert_eq!(a.provider_type(), a.provider_type());
    }
}
