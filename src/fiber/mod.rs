//! Fiber tree - the mutable work records of a render pass.
//!
//! Every pass builds a fresh tree of [`Fiber`]s in the [`FiberArena`]. A
//! fiber that sits at the same position as a committed fiber points at it
//! through `alternate` and shares its instance. After commit the old
//! generation is removed from the arena, so an `alternate` key can only ever
//! resolve one generation back.
//!
//! ```text
//! committed:   root ── App ── div ── [li a, li b]
//!                       ▲      ▲        ▲     ▲
//!               alternate      │        │     │
//! in progress: root ── App ── div ── [li b, li a]
//! ```

mod arena;

pub use arena::*;

use std::rc::Rc;

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::boundary::ChildError;
use crate::component::{ContextMap, InstanceRef};
use crate::host::OutputId;
use crate::node::NodeRef;
use crate::types::{Key, Value};

new_key_type! {
    /// Generational handle to a fiber.
    pub struct FiberId;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FiberFlags: u8 {
        /// Output or lifecycle work waits for the next commit.
        const HAS_UNCOMMITTED_EFFECT = 1 << 0;
        /// Top of a tree; owns the container part.
        const ROOT = 1 << 1;
        /// Suspense boundary rendered its fallback in this pass.
        const SHOWING_FALLBACK = 1 << 2;
        /// Component rendered in this pass (as opposed to only taking new
        /// state with `should_update` returning false).
        const RENDERED = 1 << 3;
        /// Component resolved new props and state in this pass, rendered or
        /// not.
        const RESOLVED = 1 << 4;
        /// Boundary that caught something from below; the walk restarts
        /// here.
        const RETRY = 1 << 5;
    }
}

// =============================================================================
// Parts
// =============================================================================

/// Where a fiber's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Node(NodePart),
    Attribute {
        element: OutputId,
        is_foreign_namespace: bool,
    },
}

/// Region of a parent's children. Content goes after `previous_sibling` and
/// before `next_sibling`; `None` means the start or end of the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePart {
    pub parent: OutputId,
    pub previous_sibling: Option<OutputId>,
    pub next_sibling: Option<OutputId>,
    /// Position inside a list, when the fiber is a list item.
    pub array_index: Option<usize>,
}

impl NodePart {
    pub fn new(parent: OutputId) -> Self {
        Self {
            parent,
            previous_sibling: None,
            next_sibling: None,
            array_index: None,
        }
    }

    pub fn with_array_index(self, index: usize) -> Self {
        Self {
            array_index: Some(index),
            ..self
        }
    }
}

impl Part {
    pub fn node(&self) -> Option<&NodePart> {
        match self {
            Part::Node(p) => Some(p),
            Part::Attribute { .. } => None,
        }
    }

    pub fn array_index(&self) -> Option<usize> {
        self.node().and_then(|p| p.array_index)
    }
}

// =============================================================================
// Instances
// =============================================================================

/// Output nodes owned by a tag or tag-element fiber.
#[derive(Debug)]
pub struct TagInstance {
    /// Top-level output nodes, in order.
    pub nodes: Vec<OutputId>,
    /// One part per dynamic child position.
    pub parts: Vec<Part>,
}

#[derive(Clone, Default)]
pub enum FiberInstance {
    #[default]
    None,
    Component(InstanceRef),
    Tag(Rc<TagInstance>),
    /// Text output node, created by the first commit.
    Text(Option<OutputId>),
}

impl FiberInstance {
    pub fn component(&self) -> Option<&InstanceRef> {
        match self {
            FiberInstance::Component(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&Rc<TagInstance>> {
        match self {
            FiberInstance::Tag(tag) => Some(tag),
            _ => None,
        }
    }
}

// =============================================================================
// Fiber
// =============================================================================

pub struct Fiber {
    /// `None` only for root fibers.
    pub node: Option<NodeRef>,
    pub part: Part,
    pub instance: FiberInstance,
    pub alternate: Option<FiberId>,
    pub parent: Option<FiberId>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub context: ContextMap,
    pub flags: FiberFlags,
    /// Error handed up by a descendant, set on error boundaries.
    pub child_error: Option<ChildError>,
    /// Value captured before an update, passed to `on_update`.
    pub snapshot: Option<Value>,
    /// Position among the parent's children.
    pub index: usize,
    pub generation: u64,
}

impl Fiber {
    pub fn new(node: Option<NodeRef>, part: Part, context: ContextMap, generation: u64) -> Self {
        Self {
            node,
            part,
            instance: FiberInstance::None,
            alternate: None,
            parent: None,
            child: None,
            sibling: None,
            context,
            flags: FiberFlags::empty(),
            child_error: None,
            snapshot: None,
            index: 0,
            generation,
        }
    }

    /// Work record for the next pass at the same position as `current`.
    pub fn from_alternate(
        current_id: FiberId,
        current: &Fiber,
        node: Option<NodeRef>,
        part: Part,
        generation: u64,
    ) -> Self {
        Self {
            node,
            part,
            instance: current.instance.clone(),
            alternate: Some(current_id),
            parent: None,
            child: None,
            sibling: None,
            context: current.context.clone(),
            flags: current.flags & FiberFlags::ROOT,
            child_error: None,
            snapshot: None,
            index: current.index,
            generation,
        }
    }

    pub fn key(&self) -> Key {
        self.node
            .as_ref()
            .and_then(|n| n.key.clone())
            .unwrap_or(Key::Index(self.index))
    }

    pub fn has_effect(&self) -> bool {
        self.flags.contains(FiberFlags::HAS_UNCOMMITTED_EFFECT)
    }

    pub fn component_name(&self) -> Option<&'static str> {
        self.node
            .as_ref()
            .and_then(|n| n.as_component())
            .map(|c| c.component.name())
    }
}
