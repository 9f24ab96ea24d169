//! Deadlines - when a deferred pass should hand control back.

use std::time::{Duration, Instant};

pub trait Deadline {
    /// Checked before each fiber of a deferred pass.
    fn should_yield(&mut self) -> bool;
}

/// Never yields.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn should_yield(&mut self) -> bool {
        false
    }
}

/// Yields once the time slice measured from creation is used up.
#[derive(Debug, Clone, Copy)]
pub struct FrameDeadline {
    start: Instant,
    budget: Duration,
}

impl FrameDeadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }
}

impl Deadline for FrameDeadline {
    fn should_yield(&mut self) -> bool {
        self.start.elapsed() >= self.budget
    }
}

/// Yields after a fixed number of fibers. Deterministic, so tests use it to
/// stop a deferred pass at an exact point.
#[derive(Debug, Clone, Copy)]
pub struct FiberBudget {
    remaining: usize,
}

impl FiberBudget {
    pub fn new(fibers: usize) -> Self {
        Self { remaining: fibers }
    }
}

impl Deadline for FiberBudget {
    fn should_yield(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        self.remaining -= 1;
        false
    }
}
