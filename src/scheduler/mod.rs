//! Scheduling - roots, passes, transitions and deadlines.

mod deadline;
mod root;
mod transition;
mod work_loop;

pub use deadline::*;
pub use root::*;
pub use transition::*;
