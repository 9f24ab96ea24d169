//! Output host - the live tree the engine renders into.
//!
//! The engine never touches the output tree outside of commit, except to
//! create detached nodes (elements, template instances) that the commit will
//! later insert. Detached nodes of a discarded pass are handed back through
//! [`OutputHost::remove`].
//!
//! [`MemoryHost`] is an in-memory implementation that serializes to markup
//! and counts operations.

mod memory;

pub use memory::*;

use slotmap::new_key_type;

use crate::template::Template;
use crate::types::Record;

new_key_type! {
    /// Handle to a node in the output tree.
    pub struct OutputId;
}

/// Dynamic position inside an instantiated template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hole {
    /// Content goes between `start` and `end` (both marker nodes).
    /// `parent` is `None` for holes at the top level of the template; their
    /// content lives in whatever parent the template is inserted into.
    Node {
        parent: Option<OutputId>,
        start: OutputId,
        end: OutputId,
    },
    /// Dynamic attributes of `element`.
    Attribute { element: OutputId },
}

/// Result of instantiating a template: its top-level nodes and its holes in
/// document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFragment {
    pub nodes: Vec<OutputId>,
    pub holes: Vec<Hole>,
}

pub trait OutputHost {
    fn create_text(&mut self, text: &str) -> OutputId;

    fn set_text(&mut self, node: OutputId, text: &str);

    fn create_element(&mut self, tag: &str) -> OutputId;

    /// Build a detached copy of `template`.
    fn instantiate(&mut self, template: &Template) -> TemplateFragment;

    /// Insert `nodes` (in order) into `parent` before `before`, or at the end
    /// when `before` is `None`. Nodes that already have a parent are moved.
    fn insert_or_move(&mut self, parent: OutputId, before: Option<OutputId>, nodes: &[OutputId]);

    /// Detach and release `node` with its subtree. Unknown nodes are ignored.
    fn remove(&mut self, node: OutputId);

    /// Apply the difference between `old` and `new` attributes.
    fn patch_attributes(
        &mut self,
        node: OutputId,
        new: &Record,
        old: Option<&Record>,
        is_foreign_namespace: bool,
    );

    fn parent(&self, node: OutputId) -> Option<OutputId>;

    fn first_child(&self, parent: OutputId) -> Option<OutputId>;

    fn next_sibling(&self, node: OutputId) -> Option<OutputId>;

    fn previous_sibling(&self, node: OutputId) -> Option<OutputId>;
}
