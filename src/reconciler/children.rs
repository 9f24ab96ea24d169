//! Child reconciliation for host nodes: elements, templates, lists, text and
//! attribute sets.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::warn;

use crate::error::FiberError;
use crate::fiber::{Fiber, FiberFlags, FiberId, FiberInstance, NodePart, Part, TagInstance};
use crate::host::{Hole, OutputHost};
use crate::node::{ElementNode, NodeKind, NodeRef, TemplateNode, attributes, list, node_from_value};
use crate::scheduler::Root;
use crate::types::{Key, Record, shallow_equal};

/// Tags whose attributes live in a foreign namespace.
const FOREIGN_TAGS: &[&str] = &["svg", "math"];

impl<H: OutputHost> Root<H> {
    /// Create the fiber for `node` as the child of `parent` after
    /// `previous`, reusing `current` when it held the same kind of node.
    /// Returns `None` when there is nothing to render.
    pub(crate) fn create_and_link(
        &mut self,
        parent: FiberId,
        node: Option<NodeRef>,
        part: Part,
        current: Option<FiberId>,
        previous: Option<FiberId>,
        index: usize,
    ) -> Option<FiberId> {
        let node = node?;
        let context = self.fibers[parent].context.clone();
        let reusable = current.filter(|id| {
            self.fibers
                .get(*id)
                .and_then(|f| f.node.as_ref())
                .is_some_and(|old| old.same_position_type(&node))
        });

        let mut fiber = match reusable {
            Some(current) => Fiber::from_alternate(current, &self.fibers[current], Some(node), part, self.generation),
            None => Fiber::new(Some(node), part, context.clone(), self.generation),
        };
        fiber.context = context;
        fiber.index = index;

        let id = self.fibers.insert(fiber);
        self.fibers.link(parent, previous, id);
        Some(id)
    }

    /// Give `id` copies of its committed children, reused as they are.
    pub(crate) fn clone_children(&mut self, id: FiberId) {
        self.reset_to_committed_child(id);
        let Some(alternate) = self.fibers.alternate(id) else {
            return;
        };
        let parent_part = self.fibers[id].part;
        let passes_part_through = self.fibers[id].instance.component().is_some();

        let mut previous = None;
        for child in self.fibers.children(alternate) {
            let current = &self.fibers[child];
            // Components hand their own part to their child, which may have
            // moved with them.
            let part = if passes_part_through { parent_part } else { current.part };
            let fiber = Fiber::from_alternate(child, current, current.node.clone(), part, self.generation);
            let new_id = self.fibers.insert(fiber);
            self.fibers.link(id, previous, new_id);
            previous = Some(new_id);
        }
    }

    pub(crate) fn mark_pending_effect(&mut self, id: FiberId) {
        self.fibers[id].flags.insert(FiberFlags::HAS_UNCOMMITTED_EFFECT);
        self.last_effect_fiber = Some(id);
    }

    fn old_children(&self, id: FiberId) -> Vec<FiberId> {
        self.fibers
            .alternate(id)
            .map(|alt| self.fibers.children(alt))
            .unwrap_or_default()
    }

    // =========================================================================
    // Elements
    // =========================================================================

    /// An element owns one output node and two children: its attribute set
    /// and the list of its child nodes.
    pub(crate) fn process_element_fiber(&mut self, id: FiberId, element: &ElementNode) {
        self.reset_to_committed_child(id);

        let instance = match self.fibers[id].instance.tag() {
            Some(tag) => tag.clone(),
            None => {
                let node = self.host.create_element(&element.tag);
                let tag = Rc::new(TagInstance {
                    nodes: vec![node],
                    parts: vec![
                        Part::Attribute {
                            element: node,
                            is_foreign_namespace: FOREIGN_TAGS.contains(&&*element.tag),
                        },
                        Part::Node(NodePart::new(node)),
                    ],
                });
                self.fibers[id].instance = FiberInstance::Tag(tag.clone());
                self.mark_pending_effect(id);
                tag
            }
        };

        let old = self.old_children(id);
        let attribute_node = Rc::new(attributes(element.attributes.clone()));
        let children_node = Rc::new(list(element.children.iter().cloned()));

        let attribute_fiber = self.create_and_link(
            id,
            Some(attribute_node),
            instance.parts[0],
            old.first().copied(),
            None,
            0,
        );
        self.create_and_link(
            id,
            Some(children_node),
            instance.parts[1],
            old.get(1).copied(),
            attribute_fiber,
            1,
        );
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// A template owns its instantiated fragment; each hole becomes a child
    /// fiber fed by the value at the same index.
    pub(crate) fn process_template_fiber(&mut self, id: FiberId, node: &TemplateNode) -> Result<(), FiberError> {
        self.reset_to_committed_child(id);
        let Part::Node(own_part) = self.fibers[id].part else {
            return Ok(());
        };

        let instance = match self.fibers[id].instance.tag() {
            Some(tag) => tag.clone(),
            None => {
                let template = self.templates.get(node.source)?;
                let fragment = self.host.instantiate(&template);
                let parts = fragment
                    .holes
                    .iter()
                    .zip(template.parts.iter())
                    .map(|(hole, meta)| match *hole {
                        Hole::Node { parent, start, end } => Part::Node(NodePart {
                            parent: parent.unwrap_or(own_part.parent),
                            previous_sibling: Some(start),
                            next_sibling: Some(end),
                            array_index: None,
                        }),
                        Hole::Attribute { element } => Part::Attribute {
                            element,
                            is_foreign_namespace: meta.is_foreign_namespace,
                        },
                    })
                    .collect();
                let tag = Rc::new(TagInstance {
                    nodes: fragment.nodes,
                    parts,
                });
                self.fibers[id].instance = FiberInstance::Tag(tag.clone());
                self.mark_pending_effect(id);
                tag
            }
        };

        let old: HashMap<usize, FiberId> = self
            .old_children(id)
            .into_iter()
            .map(|child| (self.fibers[child].index, child))
            .collect();

        let mut previous = None;
        for (index, part) in instance.parts.iter().enumerate() {
            let value = node.values.get(index).cloned().unwrap_or_default();
            let child = match part {
                Part::Attribute { .. } => Some(Rc::new(attributes(
                    value.as_record().cloned().unwrap_or_default(),
                ))),
                Part::Node(_) => node_from_value(&value),
            };
            if let Some(child) = self.create_and_link(id, child, *part, old.get(&index).copied(), previous, index) {
                previous = Some(child);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Lists
    // =========================================================================

    /// Items match committed fibers by key (or position when unkeyed).
    pub(crate) fn process_list_fiber(&mut self, id: FiberId, items: &[NodeRef]) {
        self.reset_to_committed_child(id);
        let Part::Node(part) = self.fibers[id].part else {
            return;
        };

        let mut old: HashMap<Key, FiberId> = self
            .old_children(id)
            .into_iter()
            .map(|child| (self.fibers[child].key(), child))
            .collect();
        let mut seen = HashSet::new();

        let mut previous = None;
        for (index, item) in items.iter().enumerate() {
            let key = item.key.clone().unwrap_or(Key::Index(index));
            let current = if seen.insert(key.clone()) {
                old.remove(&key)
            } else {
                warn!(%key, "duplicate key in list; the item is remounted");
                None
            };
            let item_part = Part::Node(part.with_array_index(index));
            if let Some(child) = self.create_and_link(id, Some(item.clone()), item_part, current, previous, index) {
                previous = Some(child);
            }
        }
    }

    // =========================================================================
    // Leaves
    // =========================================================================

    pub(crate) fn process_text_fiber(&mut self, id: FiberId, text: &str) {
        let changed = match self.old_node(id) {
            Some(old) => !matches!(&old.kind, NodeKind::Text(t) if &**t == text),
            None => true,
        };
        if changed {
            self.mark_pending_effect(id);
        }
    }

    pub(crate) fn process_attribute_fiber(&mut self, id: FiberId, attributes: &Record) {
        let changed = match self.old_node(id) {
            Some(old) => match &old.kind {
                NodeKind::Attribute(old) => !shallow_equal(old, attributes),
                _ => true,
            },
            None => !attributes.is_empty(),
        };
        if changed {
            self.mark_pending_effect(id);
        }
    }

    fn old_node(&self, id: FiberId) -> Option<NodeRef> {
        let alternate = self.fibers.alternate(id)?;
        self.fibers[alternate].node.clone()
    }
}
