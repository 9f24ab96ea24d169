//! Engine configuration.
//!
//! Constants shared by the scheduler plus [`RootOptions`], the per-root
//! settings passed to [`Root::with_options`](crate::Root::with_options).

use std::time::Duration;

/// Frame budget for a deferred pass before it yields back to the caller.
pub const TIME_SLICE: Duration = Duration::from_millis(5);

/// Consecutive sync passes allowed in one flush before the root gives up.
///
/// A component that requests a sync update from every commit would otherwise
/// keep the root busy forever.
pub const MAX_NESTED_UPDATES: usize = 50;

/// Options for a mounted root.
#[derive(Debug, Clone, PartialEq)]
pub struct RootOptions {
    /// Budget used by [`Root::flush_frame`](crate::Root::flush_frame).
    pub time_slice: Duration,
    /// See [`MAX_NESTED_UPDATES`].
    pub max_nested_updates: usize,
    /// Emit an `error!` event with the component stack whenever a boundary
    /// handles a render error.
    pub log_handled_errors: bool,
}

impl Default for RootOptions {
    fn default() -> Self {
        Self {
            time_slice: TIME_SLICE,
            max_nested_updates: MAX_NESTED_UPDATES,
            log_handled_errors: true,
        }
    }
}
