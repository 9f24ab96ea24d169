//! Reconciliation - turning nodes into fibers.
//!
//! Each `process_*` method handles one fiber kind during the work loop. They
//! only build fibers, create detached output and record effects; nothing
//! visible changes until commit.

mod children;
mod component;
