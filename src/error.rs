//! Error types.
//!
//! Two layers:
//! - [`ComponentError`] - raised by application render code, caught by error
//!   boundaries
//! - [`FiberError`] - returned by the root when a pass cannot complete
//!
//! Render code reports either an error or a suspension through [`Interrupt`],
//! the `Err` side of [`RenderResult`](crate::RenderResult).

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::boundary::PendingValue;

/// Application error raised while rendering a component.
///
/// Cheap to clone: the same error is attached to the boundary fiber, handed
/// to `derive_state_from_error` and later to `on_catch_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ComponentError {
    message: Rc<str>,
}

impl ComponentError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string().into(),
        }
    }

    /// Wrap any error, keeping only its rendered message.
    pub fn from_error(error: impl std::error::Error) -> Self {
        Self::new(error)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ComponentError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ComponentError {
    fn from(message: String) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why a render did not produce output.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// A value the render depends on is not available yet.
    Pending(PendingValue),
    /// The render failed.
    Error(ComponentError),
}

impl From<PendingValue> for Interrupt {
    fn from(pending: PendingValue) -> Self {
        Interrupt::Pending(pending)
    }
}

impl From<ComponentError> for Interrupt {
    fn from(error: ComponentError) -> Self {
        Interrupt::Error(error)
    }
}

impl From<&str> for Interrupt {
    fn from(message: &str) -> Self {
        Interrupt::Error(ComponentError::new(message))
    }
}

impl From<String> for Interrupt {
    fn from(message: String) -> Self {
        Interrupt::Error(ComponentError::from(message))
    }
}

/// Errors returned by [`Root`](crate::Root).
///
/// When one of these is returned the work-in-progress tree is discarded and
/// the output still shows the last committed tree.
#[derive(Debug, Clone, Error)]
pub enum FiberError {
    /// A component suspended with no suspense boundary above it.
    #[error(
        "<{component}> suspended while rendering, but no suspense boundary was found above it"
    )]
    SuspendedOutsideBoundary { component: &'static str },

    /// A render error that no error boundary could take.
    #[error("unhandled error in <{component}>: {error}\n{component_stack}")]
    Unhandled {
        component: &'static str,
        error: ComponentError,
        component_stack: String,
    },

    /// A template node was rendered but the root has no compiler.
    #[error("template node rendered without a template compiler configured on the root")]
    MissingTemplateCompiler,

    /// Sync passes kept requesting more sync passes.
    #[error("maximum update depth exceeded after {0} consecutive sync passes")]
    UpdateDepthExceeded(usize),
}

impl FiberError {
    /// The application error carried by an [`FiberError::Unhandled`].
    pub fn component_error(&self) -> Option<&ComponentError> {
        match self {
            FiberError::Unhandled { error, .. } => Some(error),
            _ => None,
        }
    }
}
