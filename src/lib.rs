//! # spark-fiber
//!
//! Fiber-based reconciliation engine for declarative UI trees.
//!
//! Render code describes the UI as an immutable tree of [`Node`]s. A
//! [`Root`] diffs each new tree against the committed one, one fiber at a
//! time, and applies the difference to an [`OutputHost`].
//!
//! ## Architecture
//!
//! ```text
//! Node tree → work loop (fibers, interruptible) → commit → OutputHost
//!                 ▲                                  │
//!                 └──── Updater / transitions ◀──────┘ (lifecycles, effects)
//! ```
//!
//! - sync updates run to completion; deferred updates (grouped into
//!   [`Transition`]s) yield to a [`Deadline`] and are preempted by sync work
//! - [`Suspense`] boundaries show a fallback while a [`PendingValue`] is
//!   unsettled; settlement is observed with spark-signals
//! - error boundaries catch render errors of their descendants
//!
//! ## Modules
//!
//! - [`types`] - values, records, keys
//! - [`node`] - node tree and builders
//! - [`component`] - component traits, instances, context, hooks
//! - [`scheduler`] - roots, passes, transitions, deadlines
//! - [`boundary`] - suspense and error boundaries
//! - [`host`] - output host trait and the in-memory host
//! - [`template`] - compiled templates

pub mod boundary;
mod commit;
pub mod component;
pub mod config;
pub mod error;
mod fiber;
pub mod host;
pub mod node;
mod reconciler;
pub mod scheduler;
pub mod template;
pub mod types;

pub use types::*;

pub use boundary::{AsyncState, ErrorInfo, PendingValue, Resource, Suspense, SuspenseBoundary, SuspenseStatus, suspense};

pub use component::{
    Cleanup, Component, ComponentCx, ComponentType, Context, ContextProvider, EffectQueues, FunctionalComponent,
    HookCx, HookStore, RenderResult, StateUpdate, Updater, create_context,
};

pub use config::{MAX_NESTED_UPDATES, RootOptions, TIME_SLICE};

pub use error::{ComponentError, FiberError, Interrupt};

pub use fiber::FiberId;

pub use host::{Hole, HostStats, MemoryHost, OutputHost, OutputId, OutputKind, TemplateFragment};

pub use node::{
    ElementBuilder, ElementRef, Node, NodeKind, NodeRef, NodeType, attributes, class, component, element, functional,
    list, node_from_value, template, text,
};

pub use scheduler::{
    Deadline, FiberBudget, FrameDeadline, Root, RootHandle, SYNC_TRANSITION, Transition, TransitionId, Unbounded,
    WorkStatus, start_transition,
};

pub use template::{PartKind, PartMeta, Template, TemplateCompiler, TemplateItem, TemplateSource};
