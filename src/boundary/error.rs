//! Error boundaries.
//!
//! A render error travels to the nearest class ancestor whose
//! [`catches_errors`](crate::Component::catches_errors) is true. The error is
//! attached to that fiber, the boundary is marked dirty and the pass restarts
//! from it; `derive_state_from_error` then lets it render a fallback.
//!
//! A boundary takes one error per pass. A second error reaching a boundary
//! that already holds one is fatal.

use std::fmt::Write;

use crate::error::ComponentError;
use crate::fiber::{FiberArena, FiberFlags, FiberId};

/// Extra information handed to `on_catch_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// One `    at Name` line per component, innermost first.
    pub component_stack: String,
}

#[derive(Debug, Clone)]
pub struct ChildError {
    pub error: ComponentError,
    pub info: ErrorInfo,
}

/// Component stack from `fiber` up to the root.
pub(crate) fn component_stack(arena: &FiberArena, fiber: FiberId) -> String {
    let mut stack = String::new();
    for id in std::iter::once(fiber).chain(arena.ancestors(fiber)) {
        if let Some(name) = arena.get(id).and_then(|f| f.component_name()) {
            let _ = writeln!(stack, "    at {name} ");
        }
    }
    stack
}

/// Nearest ancestor of `fiber` that catches errors.
pub(crate) fn error_boundary_fiber(arena: &FiberArena, fiber: FiberId) -> Option<FiberId> {
    arena.ancestors(fiber).find(|id| {
        arena[*id]
            .instance
            .component()
            .is_some_and(|instance| {
                instance
                    .borrow()
                    .class()
                    .is_some_and(|component| component.catches_errors())
            })
    })
}

/// Nearest suspense ancestor of `fiber` that isn't already showing its
/// fallback in this pass.
pub(crate) fn closest_suspense_fiber(arena: &FiberArena, fiber: FiberId) -> Option<FiberId> {
    arena.ancestors(fiber).find(|id| {
        let fiber = &arena[*id];
        !fiber.flags.contains(FiberFlags::SHOWING_FALLBACK)
            && fiber.instance.component().is_some_and(|instance| {
                instance
                    .borrow()
                    .class()
                    .is_some_and(|component| component.as_suspense().is_some())
            })
    })
}
