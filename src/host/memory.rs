//! In-memory output tree.

use std::fmt::Write;

use slotmap::SlotMap;

use super::{Hole, OutputHost, OutputId, TemplateFragment};
use crate::template::{Template, TemplateItem};
use crate::types::{Record, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum OutputKind {
    Container,
    Element { tag: String, attributes: Record },
    Text(String),
    /// Invisible boundary of a template hole.
    Marker,
}

#[derive(Debug, Clone)]
struct OutputNode {
    kind: OutputKind,
    parent: Option<OutputId>,
    children: Vec<OutputId>,
}

/// Operation counters, useful for asserting that a pass did nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub created: usize,
    pub inserted: usize,
    pub moved: usize,
    pub removed: usize,
    pub text_updates: usize,
    pub attribute_patches: usize,
}

impl HostStats {
    /// Operations that changed the attached tree.
    pub fn mutations(&self) -> usize {
        self.inserted + self.moved + self.removed + self.text_updates + self.attribute_patches
    }
}

pub struct MemoryHost {
    nodes: SlotMap<OutputId, OutputNode>,
    container: OutputId,
    stats: HostStats,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let container = nodes.insert(OutputNode {
            kind: OutputKind::Container,
            parent: None,
            children: Vec::new(),
        });
        Self {
            nodes,
            container,
            stats: HostStats::default(),
        }
    }

    /// Root node to mount into.
    pub fn container(&self) -> OutputId {
        self.container
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = HostStats::default();
    }

    pub fn contains(&self, node: OutputId) -> bool {
        self.nodes.contains_key(node)
    }

    /// Number of live output nodes, container included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, node: OutputId) -> Option<&OutputKind> {
        self.nodes.get(node).map(|n| &n.kind)
    }

    pub fn text(&self, node: OutputId) -> Option<&str> {
        match self.kind(node)? {
            OutputKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn attribute(&self, node: OutputId, name: &str) -> Option<&Value> {
        match self.kind(node)? {
            OutputKind::Element { attributes, .. } => attributes.get(name),
            _ => None,
        }
    }

    /// Children of `node`, markers excluded.
    pub fn children(&self, node: OutputId) -> Vec<OutputId> {
        self.nodes
            .get(node)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|c| !matches!(self.kind(*c), Some(OutputKind::Marker)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serialized content of `node` (its children, not the node itself).
    pub fn inner_markup(&self, node: OutputId) -> String {
        let mut out = String::new();
        if let Some(n) = self.nodes.get(node) {
            for child in &n.children {
                self.write_markup(*child, &mut out);
            }
        }
        out
    }

    /// Serialized content of the container.
    pub fn markup(&self) -> String {
        self.inner_markup(self.container)
    }

    fn write_markup(&self, node: OutputId, out: &mut String) {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        match &n.kind {
            OutputKind::Marker => {}
            OutputKind::Text(t) => out.push_str(t),
            OutputKind::Container => {
                for child in &n.children {
                    self.write_markup(*child, out);
                }
            }
            OutputKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes.iter() {
                    let rendered = match value {
                        Value::Bool(true) => Some(String::new()),
                        other => other.to_text(),
                    };
                    match rendered {
                        Some(v) if v.is_empty() => {
                            let _ = write!(out, " {name}");
                        }
                        Some(v) => {
                            let _ = write!(out, " {name}=\"{v}\"");
                        }
                        None => {}
                    }
                }
                out.push('>');
                for child in &n.children {
                    self.write_markup(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn alloc(&mut self, kind: OutputKind) -> OutputId {
        self.stats.created += 1;
        self.nodes.insert(OutputNode {
            kind,
            parent: None,
            children: Vec::new(),
        })
    }

    fn detach(&mut self, node: OutputId) -> bool {
        let Some(parent) = self.nodes.get(node).and_then(|n| n.parent) else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.parent = None;
        }
        true
    }

    fn append_detached(&mut self, parent: OutputId, child: OutputId) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    fn build_item(
        &mut self,
        item: &TemplateItem,
        parent: Option<OutputId>,
        top_level: &mut Vec<OutputId>,
        holes: &mut Vec<Hole>,
    ) {
        let mut place = |host: &mut Self, node: OutputId| match parent {
            Some(p) => host.append_detached(p, node),
            None => top_level.push(node),
        };
        match item {
            TemplateItem::Text(t) => {
                let node = self.alloc(OutputKind::Text(t.clone()));
                place(self, node);
            }
            TemplateItem::Hole => {
                let start = self.alloc(OutputKind::Marker);
                let end = self.alloc(OutputKind::Marker);
                place(self, start);
                place(self, end);
                holes.push(Hole::Node { parent, start, end });
            }
            TemplateItem::Element {
                tag,
                attributes,
                attribute_hole,
                children,
            } => {
                let attributes = attributes
                    .iter()
                    .map(|(k, v)| (k.as_str(), Value::from(v.as_str())))
                    .collect();
                let element = self.alloc(OutputKind::Element {
                    tag: tag.clone(),
                    attributes,
                });
                place(self, element);
                if *attribute_hole {
                    holes.push(Hole::Attribute { element });
                }
                for child in children {
                    self.build_item(child, Some(element), top_level, holes);
                }
            }
        }
    }

    fn free_subtree(&mut self, node: OutputId) {
        if let Some(n) = self.nodes.remove(node) {
            for child in n.children {
                self.free_subtree(child);
            }
        }
    }
}

impl OutputHost for MemoryHost {
    fn create_text(&mut self, text: &str) -> OutputId {
        self.alloc(OutputKind::Text(text.to_string()))
    }

    fn set_text(&mut self, node: OutputId, text: &str) {
        if let Some(OutputNode {
            kind: OutputKind::Text(t),
            ..
        }) = self.nodes.get_mut(node)
        {
            *t = text.to_string();
            self.stats.text_updates += 1;
        }
    }

    fn create_element(&mut self, tag: &str) -> OutputId {
        self.alloc(OutputKind::Element {
            tag: tag.to_string(),
            attributes: Record::new(),
        })
    }

    fn instantiate(&mut self, template: &Template) -> TemplateFragment {
        let mut fragment = TemplateFragment::default();
        for item in &template.fragment {
            self.build_item(item, None, &mut fragment.nodes, &mut fragment.holes);
        }
        fragment
    }

    fn insert_or_move(&mut self, parent: OutputId, before: Option<OutputId>, nodes: &[OutputId]) {
        for node in nodes {
            if !self.nodes.contains_key(*node) {
                continue;
            }
            if self.detach(*node) {
                self.stats.moved += 1;
            } else {
                self.stats.inserted += 1;
            }
            let Some(p) = self.nodes.get_mut(parent) else {
                return;
            };
            let at = before
                .and_then(|b| p.children.iter().position(|c| *c == b))
                .unwrap_or(p.children.len());
            p.children.insert(at, *node);
            if let Some(n) = self.nodes.get_mut(*node) {
                n.parent = Some(parent);
            }
        }
    }

    fn remove(&mut self, node: OutputId) {
        if !self.nodes.contains_key(node) {
            return;
        }
        if self.detach(node) {
            self.stats.removed += 1;
        }
        self.free_subtree(node);
    }

    fn patch_attributes(
        &mut self,
        node: OutputId,
        new: &Record,
        old: Option<&Record>,
        _is_foreign_namespace: bool,
    ) {
        let Some(OutputNode {
            kind: OutputKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(node)
        else {
            return;
        };
        let mut changed = false;
        if let Some(old) = old {
            for name in old.keys() {
                if !new.contains(name) {
                    attributes.remove(name);
                    changed = true;
                }
            }
        }
        for (name, value) in new.iter() {
            let previous = old.and_then(|o| o.get(name));
            if previous.is_some_and(|p| p.is_same(value)) {
                continue;
            }
            attributes.set(name, value.clone());
            changed = true;
        }
        if changed {
            self.stats.attribute_patches += 1;
        }
    }

    fn parent(&self, node: OutputId) -> Option<OutputId> {
        self.nodes.get(node)?.parent
    }

    fn first_child(&self, parent: OutputId) -> Option<OutputId> {
        self.nodes.get(parent)?.children.first().copied()
    }

    fn next_sibling(&self, node: OutputId) -> Option<OutputId> {
        let parent = self.nodes.get(node)?.parent?;
        let siblings = &self.nodes.get(parent)?.children;
        let at = siblings.iter().position(|c| *c == node)?;
        siblings.get(at + 1).copied()
    }

    fn previous_sibling(&self, node: OutputId) -> Option<OutputId> {
        let parent = self.nodes.get(node)?.parent?;
        let siblings = &self.nodes.get(parent)?.children;
        let at = siblings.iter().position(|c| *c == node)?;
        at.checked_sub(1).and_then(|i| siblings.get(i).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_markup() {
        let mut host = MemoryHost::new();
        let root = host.container();
        let div = host.create_element("div");
        let hello = host.create_text("hello");
        host.insert_or_move(div, None, &[hello]);
        host.insert_or_move(root, None, &[div]);
        host.patch_attributes(div, &Record::new().with("id", "a"), None, false);

        assert_eq!(host.markup(), "<div id=\"a\">hello</div>");
        assert_eq!(host.stats().inserted, 2);
        assert_eq!(host.stats().attribute_patches, 1);
    }

    #[test]
    fn test_move_keeps_node_identity() {
        let mut host = MemoryHost::new();
        let root = host.container();
        let a = host.create_text("a");
        let b = host.create_text("b");
        host.insert_or_move(root, None, &[a, b]);
        host.insert_or_move(root, Some(a), &[b]);

        assert_eq!(host.markup(), "ba");
        assert_eq!(host.stats().moved, 1, "an attached node is moved, not reinserted");
        assert_eq!(host.previous_sibling(a), Some(b));
        assert_eq!(host.next_sibling(a), None);
    }

    #[test]
    fn test_patch_attributes_diff() {
        let mut host = MemoryHost::new();
        let el = host.create_element("input");
        let old = Record::new().with("type", "text").with("disabled", true);
        host.patch_attributes(el, &old, None, false);
        host.reset_stats();

        let new = Record::new().with("type", "text").with("value", "x");
        host.patch_attributes(el, &new, Some(&old), false);

        assert_eq!(host.attribute(el, "value"), Some(&Value::from("x")));
        assert_eq!(host.attribute(el, "disabled"), None, "stale attribute removed");
        assert_eq!(host.stats().attribute_patches, 1);

        host.patch_attributes(el, &new, Some(&new), false);
        assert_eq!(host.stats().attribute_patches, 1, "identical records patch nothing");
    }

    #[test]
    fn test_instantiate_reports_holes() {
        let mut host = MemoryHost::new();
        let template = Template::new(vec![
            TemplateItem::Element {
                tag: "p".into(),
                attributes: vec![("class".into(), "lead".into())],
                attribute_hole: true,
                children: vec![TemplateItem::Text("Hi ".into()), TemplateItem::Hole],
            },
            TemplateItem::Hole,
        ]);
        let fragment = host.instantiate(&template);

        assert_eq!(fragment.nodes.len(), 3, "element plus two top-level markers");
        assert_eq!(fragment.holes.len(), 3);
        assert!(matches!(fragment.holes[0], Hole::Attribute { .. }));
        assert!(matches!(fragment.holes[1], Hole::Node { parent: Some(_), .. }));
        assert!(matches!(fragment.holes[2], Hole::Node { parent: None, .. }));

        let root = host.container();
        host.insert_or_move(root, None, &fragment.nodes);
        assert_eq!(host.markup(), "<p class=\"lead\">Hi </p>", "markers are invisible");
    }

    #[test]
    fn test_remove_frees_subtree() {
        let mut host = MemoryHost::new();
        let root = host.container();
        let div = host.create_element("div");
        let text = host.create_text("x");
        host.insert_or_move(div, None, &[text]);
        host.insert_or_move(root, None, &[div]);

        host.remove(div);
        assert!(!host.contains(text), "children are released with their parent");
        assert_eq!(host.markup(), "");
        host.remove(text);
        assert_eq!(host.stats().removed, 1, "removing a released node is a no-op");
    }
}
