//! Context - values provided by an ancestor to any descendant.
//!
//! Each fiber carries a [`ContextMap`] snapshot: context id → provider
//! instance. A provider extends its parent's map with itself; everything
//! else inherits the parent's map as is. The map is persistent (`im`), so
//! extending it shares structure with the parent's snapshot.
//!
//! A consumer reads the provider's current `value` prop and subscribes on
//! its first render. When a provider reconciles with a different value it
//! marks its subscribers dirty.

use std::cell::Cell;

use super::{Component, ComponentCx, ComponentType, InstanceRef, RenderResult};
use crate::node::{NodeRef, component};
use crate::scheduler::TransitionId;
use crate::types::{Props, Record, Value};

pub type ContextMap = im::HashMap<ContextId, InstanceRef>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

thread_local! {
    /// Counter for context ids.
    static NEXT_CONTEXT_ID: Cell<u64> = const { Cell::new(0) };
}

#[derive(Debug, Clone)]
pub struct Context {
    id: ContextId,
    default: Value,
}

/// Create a context with a default value used when no provider is found.
pub fn create_context(default: impl Into<Value>) -> Context {
    let id = NEXT_CONTEXT_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });
    Context {
        id: ContextId(id),
        default: default.into(),
    }
}

impl Context {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn provider_type(&self) -> ComponentType {
        ComponentType::provider(self.id)
    }

    /// Provider node rendering `children` with `value` in scope.
    pub fn provider(&self, value: impl Into<Value>, children: impl Into<NodeRef>) -> crate::node::Node {
        component(
            self.provider_type(),
            Record::new()
                .with("value", value)
                .with("children", Value::Node(children.into())),
        )
    }

    /// Value visible from `map` in a pass running `transition`.
    pub(crate) fn resolve(&self, map: &ContextMap, transition: TransitionId) -> (Value, Option<InstanceRef>) {
        match map.get(&self.id) {
            Some(provider) => (provider_value(provider, transition), Some(provider.clone())),
            None => (self.default.clone(), None),
        }
    }
}

/// `value` prop of a provider instance as seen by `transition`.
pub(crate) fn provider_value(provider: &InstanceRef, transition: TransitionId) -> Value {
    let instance = provider.borrow();
    instance
        .meta
        .props_for(transition, &instance.props)
        .get("value")
        .cloned()
        .unwrap_or_default()
}

/// Context map for a fiber whose parent has `parent`.
pub(crate) fn extend_context(
    parent: &ContextMap,
    component: &ComponentType,
    instance: &InstanceRef,
) -> ContextMap {
    match component.provides() {
        Some(id) => parent.update(id, instance.clone()),
        None => parent.clone(),
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Component behind [`Context::provider`]. Renders its `children` prop.
pub struct ContextProvider;

impl Component for ContextProvider {
    fn new(_props: &Props) -> Self {
        ContextProvider
    }

    fn name() -> &'static str {
        "Provider"
    }

    fn render(&self, cx: &ComponentCx<'_>) -> RenderResult {
        Ok(cx.props().node("children"))
    }
}
