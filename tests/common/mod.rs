//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use spark_fiber::{MemoryHost, Root, Updater};

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static UPDATERS: RefCell<HashMap<&'static str, Updater>> = RefCell::new(HashMap::new());
}

/// Fresh root over an empty in-memory host.
pub fn mount() -> Root<MemoryHost> {
    let host = MemoryHost::new();
    let container = host.container();
    Root::new(host, container)
}

pub fn log(entry: impl Into<String>) {
    LOG.with(|log| log.borrow_mut().push(entry.into()));
}

pub fn take_log() -> Vec<String> {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

/// Keep `updater` reachable by its component name.
pub fn remember(updater: &Updater) {
    UPDATERS.with(|u| u.borrow_mut().insert(updater.name(), updater.clone()));
}

pub fn updater(name: &str) -> Updater {
    UPDATERS
        .with(|u| u.borrow().get(name).cloned())
        .unwrap_or_else(|| panic!("{name} never mounted"))
}
