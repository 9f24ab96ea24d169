//! Core value types.
//!
//! Props, state and template slot values are dynamic: a [`Record`] maps names
//! to [`Value`]s. Records are persistent maps (`im::OrdMap`), so merging a
//! state update or cloning props for a memoized snapshot shares structure
//! instead of copying.
//!
//! Two notions of equality exist:
//! - `PartialEq` compares records and lists by content
//! - [`Value::is_same`] is identity: primitives by value, everything else by
//!   pointer. [`shallow_equal`] uses it key by key.

use std::fmt;
use std::rc::Rc;

use crate::node::NodeRef;

// =============================================================================
// Update Type
// =============================================================================

/// Priority of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateType {
    /// Runs to completion without yielding.
    #[default]
    Sync,
    /// Interruptible; belongs to a transition.
    Deferred,
}

// =============================================================================
// Key
// =============================================================================

/// Identity of a node among its list siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
    /// Fallback for unkeyed list items.
    Index(usize),
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value.into())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value as i64)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => write!(f, "{s}"),
            Key::Int(i) => write!(f, "{i}"),
            Key::Index(i) => write!(f, "#{i}"),
        }
    }
}

// =============================================================================
// Callback
// =============================================================================

/// Function-valued prop (event handlers and the like).
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&Value)>);

impl Callback {
    pub fn new(f: impl Fn(&Value) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, value: &Value) {
        (self.0)(value)
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

// =============================================================================
// Value
// =============================================================================

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Record(Record),
    Node(NodeRef),
    Callback(Callback),
}

impl Value {
    /// Identity comparison used by shallow equality.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => a.ptr_eq(b),
            (Value::Node(a), Value::Node(b)) => Rc::ptr_eq(a, b),
            (Value::Callback(a), Value::Callback(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(c) => Some(c),
            _ => None,
        }
    }

    /// Text rendering of primitive values; `None` for structured values.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(x) => Some(x.to_string()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            _ => self.is_same(other),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl From<NodeRef> for Value {
    fn from(value: NodeRef) -> Self {
        Value::Node(value)
    }
}

impl From<crate::node::Node> for Value {
    fn from(value: crate::node::Node) -> Self {
        Value::Node(Rc::new(value))
    }
}

impl From<Callback> for Value {
    fn from(value: Callback) -> Self {
        Value::Callback(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Record
// =============================================================================

/// Persistent name → value map used for props, state and attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(im::OrdMap<Rc<str>, Value>);

pub type Props = Record;
pub type State = Record;

impl Record {
    pub fn new() -> Self {
        Self(im::OrdMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<Rc<str>>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn node(&self, key: &str) -> Option<NodeRef> {
        self.get(key).and_then(Value::as_node).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_ref())
    }

    /// Shallow merge: keys of `other` win.
    pub fn merge(&self, other: &Record) -> Record {
        let mut merged = self.0.clone();
        for (key, value) in other.0.iter() {
            merged.insert(key.clone(), value.clone());
        }
        Record(merged)
    }

    /// True when both records share the same underlying tree.
    pub fn ptr_eq(&self, other: &Record) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl<K: Into<Rc<str>>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Same key set and every value [`Value::is_same`].
pub fn shallow_equal(a: &Record, b: &Record) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .all(|(key, value)| b.get(key).is_some_and(|other| value.is_same(other)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_merge_prefers_update() {
        let base = Record::new().with("count", 1).with("label", "a");
        let update = Record::new().with("count", 2);
        let merged = base.merge(&update);

        assert_eq!(merged.int("count"), Some(2), "update wins");
        assert_eq!(merged.str("label"), Some("a"), "untouched keys survive");
        assert_eq!(base.int("count"), Some(1), "merge never mutates the base");
    }

    #[test]
    fn test_record_merge_wider_base() {
        let base = Record::new()
            .with("count", 0)
            .with("label", "a")
            .with("extra", true)
            .with("more", 4);
        let merged = base.merge(&Record::new().with("count", 1));

        assert_eq!(merged.int("count"), Some(1), "update wins over a larger base");
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.bool("extra"), Some(true));
    }

    #[test]
    fn test_shallow_equal_primitives() {
        let a = Record::new().with("n", 1).with("s", "x");
        let b = Record::new().with("s", "x").with("n", 1);
        assert!(shallow_equal(&a, &b));
        assert!(!shallow_equal(&a, &b.clone().with("n", 2)));
        assert!(!shallow_equal(&a, &b.clone().with("extra", true)));
    }

    #[test]
    fn test_shallow_equal_uses_identity_for_records() {
        let inner = Record::new().with("x", 1);
        let a = Record::new().with("inner", inner.clone());
        let b = Record::new().with("inner", inner);
        let c = Record::new().with("inner", Record::new().with("x", 1));

        assert!(shallow_equal(&a, &b), "same inner record is the same value");
        assert!(!shallow_equal(&a, &c), "equal content in a different record is not");
        assert_eq!(a, c, "content equality still holds");
    }

    #[test]
    fn test_value_text() {
        assert_eq!(Value::from(3).to_text().as_deref(), Some("3"));
        assert_eq!(Value::from("hi").to_text().as_deref(), Some("hi"));
        assert_eq!(Value::Null.to_text(), None);
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
