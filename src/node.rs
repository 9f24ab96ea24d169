//! Node model.
//!
//! A [`Node`] is the immutable description of what one position should
//! render in a pass. Nodes are shared through [`NodeRef`] and compared by
//! pointer: a fiber whose node is the same `Rc` as last pass has nothing new
//! to say.
//!
//! # Node types
//!
//! | Builder | [`NodeType`] | Rendered by |
//! |---------|--------------|-------------|
//! | [`text`] | `Text` | text output node |
//! | [`element`] | `TagElement` | one element plus attributes and children |
//! | [`template`] | `Tag` | compiled template with dynamic holes |
//! | [`class`] | `ClassComponent` | [`Component`] instance |
//! | [`functional`] | `FunctionalComponent` | [`FunctionalComponent`] render fn |
//! | [`list`] | `List` | keyed children |
//! | [`attributes`] | `Attribute` | attribute patch on an element |

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::component::{Component, ComponentType, FunctionalComponent};
use crate::host::OutputId;
use crate::template::TemplateSource;
use crate::types::{Key, Props, Record, Value};

pub type NodeRef = Rc<Node>;

/// Classification used when deciding whether a fiber can be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Text,
    Tag,
    TagElement,
    ClassComponent,
    FunctionalComponent,
    List,
    Attribute,
}

#[derive(Debug)]
pub struct Node {
    pub key: Option<Key>,
    pub kind: NodeKind,
}

#[derive(Debug)]
pub enum NodeKind {
    Text(Rc<str>),
    Element(ElementNode),
    Template(TemplateNode),
    Component(ComponentNode),
    List(Vec<NodeRef>),
    Attribute(Record),
}

#[derive(Debug)]
pub struct ElementNode {
    pub tag: Rc<str>,
    pub attributes: Record,
    pub children: Vec<NodeRef>,
    pub element_ref: Option<ElementRef>,
}

#[derive(Debug)]
pub struct TemplateNode {
    pub source: TemplateSource,
    pub values: Vec<Value>,
}

#[derive(Debug)]
pub struct ComponentNode {
    pub component: ComponentType,
    pub props: Props,
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match &self.kind {
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Element(_) => NodeType::TagElement,
            NodeKind::Template(_) => NodeType::Tag,
            NodeKind::Component(c) if c.component.is_class() => NodeType::ClassComponent,
            NodeKind::Component(_) => NodeType::FunctionalComponent,
            NodeKind::List(_) => NodeType::List,
            NodeKind::Attribute(_) => NodeType::Attribute,
        }
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn as_component(&self) -> Option<&ComponentNode> {
        match &self.kind {
            NodeKind::Component(c) => Some(c),
            _ => None,
        }
    }

    /// True when a fiber created for `self` can be reused for `other`.
    pub fn same_position_type(&self, other: &Node) -> bool {
        if self.key != other.key {
            return false;
        }
        match (&self.kind, &other.kind) {
            (NodeKind::Text(_), NodeKind::Text(_)) => true,
            (NodeKind::Element(a), NodeKind::Element(b)) => a.tag == b.tag,
            (NodeKind::Template(a), NodeKind::Template(b)) => a.source == b.source,
            (NodeKind::Component(a), NodeKind::Component(b)) => a.component == b.component,
            (NodeKind::List(_), NodeKind::List(_)) => true,
            (NodeKind::Attribute(_), NodeKind::Attribute(_)) => true,
            _ => false,
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        text(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        text(value)
    }
}

/// Convert a dynamic value into a renderable node.
///
/// Null and booleans render nothing, primitives render as text, lists become
/// unkeyed-by-default lists.
pub fn node_from_value(value: &Value) -> Option<NodeRef> {
    match value {
        Value::Node(node) => Some(node.clone()),
        Value::List(items) => Some(Rc::new(list(
            items.iter().filter_map(node_from_value).collect::<Vec<_>>(),
        ))),
        Value::Null | Value::Bool(_) | Value::Record(_) | Value::Callback(_) => None,
        other => other.to_text().map(|t| Rc::new(text(t))),
    }
}

// =============================================================================
// Element Ref
// =============================================================================

/// Handle filled with the output node of an element once it is committed.
#[derive(Clone, Default)]
pub struct ElementRef(Rc<Cell<Option<OutputId>>>);

impl ElementRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<OutputId> {
        self.0.get()
    }

    pub(crate) fn set(&self, id: Option<OutputId>) {
        self.0.set(id);
    }

    pub fn ptr_eq(&self, other: &ElementRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementRef").field(&self.get()).finish()
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn text(content: impl Into<Rc<str>>) -> Node {
    Node {
        key: None,
        kind: NodeKind::Text(content.into()),
    }
}

pub fn element(tag: impl Into<Rc<str>>) -> ElementBuilder {
    ElementBuilder {
        key: None,
        node: ElementNode {
            tag: tag.into(),
            attributes: Record::new(),
            children: Vec::new(),
            element_ref: None,
        },
    }
}

pub fn template(source: TemplateSource, values: Vec<Value>) -> Node {
    Node {
        key: None,
        kind: NodeKind::Template(TemplateNode { source, values }),
    }
}

pub fn class<C: Component>(props: Props) -> Node {
    Node {
        key: None,
        kind: NodeKind::Component(ComponentNode {
            component: ComponentType::class::<C>(),
            props,
        }),
    }
}

pub fn functional<F: FunctionalComponent>(props: Props) -> Node {
    Node {
        key: None,
        kind: NodeKind::Component(ComponentNode {
            component: ComponentType::functional::<F>(),
            props,
        }),
    }
}

/// Node for an explicit component type (context providers and the like).
pub fn component(component: ComponentType, props: Props) -> Node {
    Node {
        key: None,
        kind: NodeKind::Component(ComponentNode { component, props }),
    }
}

pub fn list<N: Into<NodeRef>>(items: impl IntoIterator<Item = N>) -> Node {
    Node {
        key: None,
        kind: NodeKind::List(items.into_iter().map(Into::into).collect()),
    }
}

pub fn attributes(attributes: Record) -> Node {
    Node {
        key: None,
        kind: NodeKind::Attribute(attributes),
    }
}

pub struct ElementBuilder {
    key: Option<Key>,
    node: ElementNode,
}

impl ElementBuilder {
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
        self.node.attributes.set(name, value);
        self
    }

    pub fn child(mut self, child: impl Into<NodeRef>) -> Self {
        self.node.children.push(child.into());
        self
    }

    pub fn children<N: Into<NodeRef>>(mut self, children: impl IntoIterator<Item = N>) -> Self {
        self.node.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn text(self, content: impl Into<Rc<str>>) -> Self {
        self.child(text(content))
    }

    pub fn element_ref(mut self, element_ref: &ElementRef) -> Self {
        self.node.element_ref = Some(element_ref.clone());
        self
    }

    pub fn build(self) -> Node {
        Node {
            key: self.key,
            kind: NodeKind::Element(self.node),
        }
    }
}

impl From<ElementBuilder> for Node {
    fn from(builder: ElementBuilder) -> Self {
        builder.build()
    }
}

impl From<ElementBuilder> for NodeRef {
    fn from(builder: ElementBuilder) -> Self {
        Rc::new(builder.build())
    }
}
