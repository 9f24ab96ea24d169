//! Templates.
//!
//! A template node carries a static source (the literal string segments) and
//! the dynamic values that fill its holes. Turning the source into a
//! [`Template`] is the job of an embedder-supplied [`TemplateCompiler`]; the
//! root keeps one compiled template per source in a [`TemplateCache`].
//!
//! Holes are numbered in document order. An element's attribute hole comes
//! before any hole inside its children, and the host's
//! [`instantiate`](crate::host::OutputHost::instantiate) must report holes in
//! the same order as [`Template::parts`].

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::FiberError;

// =============================================================================
// Source
// =============================================================================

/// Static string segments of a template, identified by address.
///
/// Two sources are the same template only if they are the same static slice,
/// which is what a `static` or `const` item gives you.
#[derive(Clone, Copy)]
pub struct TemplateSource(&'static [&'static str]);

impl TemplateSource {
    pub const fn new(strings: &'static [&'static str]) -> Self {
        Self(strings)
    }

    pub fn strings(&self) -> &'static [&'static str] {
        self.0
    }
}

impl PartialEq for TemplateSource {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for TemplateSource {}

impl Hash for TemplateSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.0.as_ptr() as usize).hash(state);
        self.0.len().hash(state);
    }
}

impl fmt::Debug for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TemplateSource").field(&self.0.first()).finish()
    }
}

// =============================================================================
// Compiled Template
// =============================================================================

/// Static structure of a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateItem {
    Text(String),
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        /// The element takes a dynamic attribute record.
        attribute_hole: bool,
        children: Vec<TemplateItem>,
    },
    /// Dynamic content position.
    Hole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Node,
    Attribute,
}

/// Per-hole metadata, in hole order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartMeta {
    pub kind: PartKind,
    /// Tag of the element owning an attribute hole, or of the parent of a
    /// node hole (`None` at the top level).
    pub tag: Option<String>,
    /// Inside an `svg` or `math` subtree.
    pub is_foreign_namespace: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub fragment: Vec<TemplateItem>,
    pub parts: Vec<PartMeta>,
}

impl Template {
    pub fn new(fragment: Vec<TemplateItem>) -> Self {
        let mut parts = Vec::new();
        collect_parts(&fragment, None, false, &mut parts);
        Self { fragment, parts }
    }

    pub fn hole_count(&self) -> usize {
        self.parts.len()
    }
}

fn collect_parts(
    items: &[TemplateItem],
    parent_tag: Option<&str>,
    foreign: bool,
    parts: &mut Vec<PartMeta>,
) {
    for item in items {
        match item {
            TemplateItem::Text(_) => {}
            TemplateItem::Hole => parts.push(PartMeta {
                kind: PartKind::Node,
                tag: parent_tag.map(str::to_string),
                is_foreign_namespace: foreign,
            }),
            TemplateItem::Element {
                tag,
                attribute_hole,
                children,
                ..
            } => {
                let foreign = foreign || tag == "svg" || tag == "math";
                if *attribute_hole {
                    parts.push(PartMeta {
                        kind: PartKind::Attribute,
                        tag: Some(tag.clone()),
                        is_foreign_namespace: foreign,
                    });
                }
                collect_parts(children, Some(tag), foreign, parts);
            }
        }
    }
}

// =============================================================================
// Compiler + Cache
// =============================================================================

/// Turns template source into a [`Template`].
pub trait TemplateCompiler {
    fn compile(&self, source: TemplateSource) -> Template;
}

impl<F: Fn(TemplateSource) -> Template> TemplateCompiler for F {
    fn compile(&self, source: TemplateSource) -> Template {
        self(source)
    }
}

/// Compiled templates keyed by source identity.
#[derive(Default)]
pub struct TemplateCache {
    compiler: Option<Box<dyn TemplateCompiler>>,
    compiled: HashMap<TemplateSource, Rc<Template>>,
}

impl TemplateCache {
    pub fn new(compiler: Option<Box<dyn TemplateCompiler>>) -> Self {
        Self {
            compiler,
            compiled: HashMap::new(),
        }
    }

    pub fn set_compiler(&mut self, compiler: Box<dyn TemplateCompiler>) {
        self.compiler = Some(compiler);
    }

    pub fn get(&mut self, source: TemplateSource) -> Result<Rc<Template>, FiberError> {
        if let Some(template) = self.compiled.get(&source) {
            return Ok(template.clone());
        }
        let compiler = self
            .compiler
            .as_ref()
            .ok_or(FiberError::MissingTemplateCompiler)?;
        let template = Rc::new(compiler.compile(source));
        tracing::trace!(holes = template.hole_count(), "compiled template");
        self.compiled.insert(source, template.clone());
        Ok(template)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    static CARD: [&str; 3] = ["<div ", "><p>", "</p></div>"];

    fn card_template() -> Template {
        Template::new(vec![TemplateItem::Element {
            tag: "div".into(),
            attributes: vec![],
            attribute_hole: true,
            children: vec![TemplateItem::Element {
                tag: "p".into(),
                attributes: vec![],
                attribute_hole: false,
                children: vec![TemplateItem::Hole],
            }],
        }])
    }

    #[test]
    fn test_parts_in_document_order() {
        let template = card_template();
        assert_eq!(template.hole_count(), 2);
        assert_eq!(template.parts[0].kind, PartKind::Attribute);
        assert_eq!(template.parts[0].tag.as_deref(), Some("div"));
        assert_eq!(template.parts[1].kind, PartKind::Node);
        assert_eq!(template.parts[1].tag.as_deref(), Some("p"));
    }

    #[test]
    fn test_foreign_namespace_is_inherited() {
        let template = Template::new(vec![TemplateItem::Element {
            tag: "svg".into(),
            attributes: vec![],
            attribute_hole: false,
            children: vec![TemplateItem::Element {
                tag: "path".into(),
                attributes: vec![],
                attribute_hole: true,
                children: vec![],
            }],
        }]);
        assert!(template.parts[0].is_foreign_namespace);
    }

    #[test]
    fn test_cache_compiles_once_per_source() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut cache = TemplateCache::new(Some(Box::new(move |_source: TemplateSource| {
            counter.set(counter.get() + 1);
            card_template()
        })));

        let source = TemplateSource::new(&CARD);
        let first = cache.get(source).expect("compiles");
        let second = cache.get(source).expect("cached");

        assert!(Rc::ptr_eq(&first, &second), "same compiled template is shared");
        assert_eq!(calls.get(), 1, "compiler runs once per source");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_without_compiler_fails() {
        let mut cache = TemplateCache::default();
        let result = cache.get(TemplateSource::new(&CARD));
        assert!(matches!(result, Err(FiberError::MissingTemplateCompiler)));
    }
}
