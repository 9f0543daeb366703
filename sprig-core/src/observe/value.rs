//! Dynamic values held by deep cells and observed objects.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;

use super::array::{ArrayInner, ObservedArray};
use super::object::{ObjectInner, ObservedObject};
use super::path::PropertyAccessible;
use super::Owner;
use crate::error::{ReactiveError, Result};

/// Coarse type of a value, used to decide what a cell may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueKind {
    Undefined,
    Null,
    Bool,
    Number,
    String,
    Object,
    Array,
    /// A value the engine can read but cannot observe.
    Foreign,
}

impl ValueKind {
    /// Whether a deep cell can hold values of this kind.
    pub fn is_observable(&self) -> bool {
        !matches!(self, ValueKind::Foreign)
    }
}

/// A dynamically typed value.
///
/// Equality follows strict equality: primitives compare by value, objects,
/// arrays and foreign values by identity. `NaN` equals `NaN` so that
/// rewriting the same number is never a change.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(ObservedObject),
    Array(ObservedArray),
    Foreign(Rc<dyn PropertyAccessible>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::String,
            Value::Object(_) => ValueKind::Object,
            Value::Array(_) => ValueKind::Array,
            Value::Foreign(_) => ValueKind::Foreign,
        }
    }

    /// Wrap an arbitrary foreign value.
    pub fn foreign(value: impl PropertyAccessible + 'static) -> Self {
        Value::Foreign(Rc::new(value))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObservedObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ObservedArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Build a value from JSON. Objects and arrays become deep observed
    /// wrappers that are not yet owned by any cell.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.into()),
            serde_json::Value::Array(items) => Value::Array(ObservedArray::from_vec(
                items.into_iter().map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(map) => {
                let object = ObservedObject::new();
                for (key, value) in map {
                    object.insert_raw(&key, Value::from_json(value), false);
                }
                Value::Object(object)
            }
        }
    }

    /// Snapshot the value as plain JSON. Reads are not recorded.
    ///
    /// `undefined` and foreign values become `null`, as do non-finite numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Foreign(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::Object(o) => o.to_json(),
            Value::Array(a) => a.to_json(),
        }
    }

    /// A weak handle to the value's identity, for identity-keyed maps.
    /// Primitives have no identity.
    pub fn identity(&self) -> Option<WeakIdentity> {
        match self {
            Value::Object(o) => Some(WeakIdentity(WeakKind::Object(o.downgrade()))),
            Value::Array(a) => Some(WeakIdentity(WeakKind::Array(a.downgrade()))),
            Value::Foreign(f) => Some(WeakIdentity(WeakKind::Foreign(Rc::downgrade(f)))),
            _ => None,
        }
    }

    pub(crate) fn check_attach(&self, owner: &Owner, visited: &mut HashSet<u64>) -> Result<()> {
        match self {
            Value::Object(o) => o.check_attach(owner, visited),
            Value::Array(a) => a.check_attach(owner, visited),
            Value::Foreign(_) => Err(ReactiveError::UnsupportedValueKind {
                cell: owner.cell(),
                kind: ValueKind::Foreign,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn attach(&self, owner: &Owner) {
        match self {
            Value::Object(o) => o.attach(owner),
            Value::Array(a) => a.attach(owner),
            _ => {}
        }
    }

    pub(crate) fn detach(&self) {
        match self {
            Value::Object(o) => o.detach(),
            Value::Array(a) => a.detach(),
            _ => {}
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Foreign(a), Value::Foreign(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(o) => write!(f, "{o:?}"),
            Value::Array(a) => write!(f, "{a:?}"),
            Value::Foreign(_) => f.write_str("<foreign>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<ObservedObject> for Value {
    fn from(o: ObservedObject) -> Self {
        Value::Object(o)
    }
}

impl From<ObservedArray> for Value {
    fn from(a: ObservedArray) -> Self {
        Value::Array(a)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A weak reference to something with identity. Never keeps it alive.
#[derive(Clone)]
pub struct WeakIdentity(WeakKind);

#[derive(Clone)]
enum WeakKind {
    Object(Weak<ObjectInner>),
    Array(Weak<ArrayInner>),
    Foreign(Weak<dyn PropertyAccessible>),
    Any(Weak<dyn Any>),
}

impl WeakIdentity {
    /// Identity of an arbitrary reference-counted value.
    pub fn of<T: Any>(rc: &Rc<T>) -> Self {
        let weak: Weak<dyn Any> = Rc::downgrade(rc) as Weak<dyn Any>;
        WeakIdentity(WeakKind::Any(weak))
    }

    /// Address of the referent. Only meaningful while it is alive.
    pub fn addr(&self) -> usize {
        match &self.0 {
            WeakKind::Object(w) => w.as_ptr() as *const () as usize,
            WeakKind::Array(w) => w.as_ptr() as *const () as usize,
            WeakKind::Foreign(w) => w.as_ptr() as *const () as usize,
            WeakKind::Any(w) => w.as_ptr() as *const () as usize,
        }
    }

    pub fn is_alive(&self) -> bool {
        match &self.0 {
            WeakKind::Object(w) => w.strong_count() > 0,
            WeakKind::Array(w) => w.strong_count() > 0,
            WeakKind::Foreign(w) => w.strong_count() > 0,
            WeakKind::Any(w) => w.strong_count() > 0,
        }
    }
}

impl fmt::Debug for WeakIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakIdentity")
            .field("addr", &self.addr())
            .field("alive", &self.is_alive())
            .finish()
    }
}
