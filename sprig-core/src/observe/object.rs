//! Observed objects.
//!
//! Every property lives in its own slot with its own `CellId`, so a
//! consumer that reads `user.name` is not notified when `user.age`
//! changes. An extra *shape* slot is read when a lookup misses or keys are
//! enumerated; adding or removing a property notifies it.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::path::{PropertyAccessible, PropertyKind};
use super::value::Value;
use super::Owner;
use crate::error::{ReactiveError, Result};
use crate::reactive::CellId;

/// Counter shared by objects and arrays, used for cycle detection.
static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_object_id() -> u64 {
    OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectMode {
    /// Every property is tracked.
    Deep,
    /// Only properties declared traced are tracked.
    Traced,
}

struct Slot {
    cell: CellId,
    value: Value,
    traced: bool,
}

pub(crate) struct ObjectInner {
    id: u64,
    shape: CellId,
    mode: ObjectMode,
    props: RefCell<IndexMap<Rc<str>, Slot>>,
    owner: RefCell<Option<Owner>>,
}

impl ObjectInner {
    fn is_tracked(&self, slot: &Slot) -> bool {
        self.mode == ObjectMode::Deep || slot.traced
    }
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.get_mut().take() {
            owner.tracker().forget_cell(self.shape);
            for slot in self.props.get_mut().values() {
                owner.tracker().forget_cell(slot.cell);
            }
        }
    }
}

/// An object whose property reads are attributable.
///
/// Cloning the handle shares the object.
#[derive(Clone)]
pub struct ObservedObject {
    inner: Rc<ObjectInner>,
}

impl ObservedObject {
    /// A deep observed object: every property is tracked.
    pub fn new() -> Self {
        Self::with_mode(ObjectMode::Deep)
    }

    /// An object where only properties declared with
    /// [`with_traced`](Self::with_traced) or `define(.., true)` are tracked.
    pub fn traced() -> Self {
        Self::with_mode(ObjectMode::Traced)
    }

    fn with_mode(mode: ObjectMode) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                id: next_object_id(),
                shape: CellId::new(),
                mode,
                props: RefCell::new(IndexMap::new()),
                owner: RefCell::new(None),
            }),
        }
    }

    /// Builder: add a property with the object's default tracking.
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.build(key, value.into(), false)
    }

    /// Builder: add a property that is tracked even on a traced object.
    pub fn with_traced(self, key: &str, value: impl Into<Value>) -> Self {
        self.build(key, value.into(), true)
    }

    fn build(self, key: &str, value: Value, traced: bool) -> Self {
        if let Err(err) = self.define(key, value, traced) {
            tracing::warn!(object = self.inner.id, key, %err, "builder property rejected");
        }
        self
    }

    pub(crate) fn insert_raw(&self, key: &str, value: Value, traced: bool) {
        self.inner.props.borrow_mut().insert(
            key.into(),
            Slot {
                cell: CellId::new(),
                value,
                traced,
            },
        );
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_deep(&self) -> bool {
        self.inner.mode == ObjectMode::Deep
    }

    pub fn ptr_eq(&self, other: &ObservedObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectInner> {
        Rc::downgrade(&self.inner)
    }

    fn owner(&self) -> Option<Owner> {
        self.inner.owner.borrow().clone()
    }

    /// The slot that owns this object, if attached.
    pub fn owner_cell(&self) -> Option<CellId> {
        self.inner.owner.borrow().as_ref().map(Owner::cell)
    }

    pub fn is_attached(&self) -> bool {
        self.inner.owner.borrow().is_some()
    }

    /// The slot id of a property.
    pub fn slot_id(&self, key: &str) -> Option<CellId> {
        self.inner.props.borrow().get(key).map(|slot| slot.cell)
    }

    /// Read a property. Tracked properties of an attached object record
    /// their slot; a missing property records the object's shape.
    pub fn get(&self, key: &str) -> Option<Value> {
        let (read, value) = {
            let props = self.inner.props.borrow();
            match props.get(key) {
                Some(slot) if self.inner.is_tracked(slot) => (Some(slot.cell), Some(slot.value.clone())),
                Some(slot) => (None, Some(slot.value.clone())),
                None => (Some(self.inner.shape), None),
            }
        };
        if let (Some(cell), Some(owner)) = (read, self.owner()) {
            owner.tracker().record_read(cell);
        }
        value
    }

    /// Read a property without recording it.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.inner.props.borrow().get(key).map(|slot| slot.value.clone())
    }

    /// Whether the property exists. Recorded like [`get`](Self::get).
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Property names in insertion order. Records the shape.
    pub fn keys(&self) -> Vec<String> {
        self.track_shape();
        self.inner
            .props
            .borrow()
            .keys()
            .map(|k| k.to_string())
            .collect()
    }

    /// Number of properties. Records the shape.
    pub fn len(&self) -> usize {
        self.track_shape();
        self.inner.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn track_shape(&self) {
        if let Some(owner) = self.owner() {
            owner.tracker().record_read(self.inner.shape);
        }
    }

    /// Write a property, adding it with the object's default tracking if
    /// it does not exist. Returns whether anything changed.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        self.define(key, value.into(), false)
    }

    /// Write a property; `traced` forces tracking on a traced object.
    ///
    /// On an attached object the new value is attached to the property's
    /// slot (nested wrappers must not be owned elsewhere, tracked slots
    /// cannot hold foreign values), the old one is detached, and readers of
    /// the slot are notified. Rejected writes leave the object unchanged.
    pub fn define(&self, key: &str, value: impl Into<Value>, traced: bool) -> Result<bool> {
        let value = value.into();
        let owner = self.owner();
        let existing = self
            .inner
            .props
            .borrow()
            .get(key)
            .map(|slot| (slot.cell, slot.value.clone(), slot.traced));

        match existing {
            Some((cell, old, was_traced)) => {
                let traced = was_traced || traced;
                if old == value {
                    if traced != was_traced {
                        if let Some(slot) = self.inner.props.borrow_mut().get_mut(key) {
                            slot.traced = traced;
                        }
                    }
                    return Ok(false);
                }
                let tracked = self.inner.mode == ObjectMode::Deep || traced;
                if let Some(owner) = &owner {
                    check_slot(tracked, &value, &owner.child(cell), &mut HashSet::new())?;
                }
                if let Some(slot) = self.inner.props.borrow_mut().get_mut(key) {
                    slot.value = value.clone();
                    slot.traced = traced;
                }
                old.detach();
                if let Some(owner) = owner {
                    value.attach(&owner.child(cell));
                    owner.tracker().changed(cell);
                }
                Ok(true)
            }
            None => {
                let cell = CellId::new();
                let tracked = self.inner.mode == ObjectMode::Deep || traced;
                if let Some(owner) = &owner {
                    check_slot(tracked, &value, &owner.child(cell), &mut HashSet::new())?;
                }
                self.inner.props.borrow_mut().insert(
                    key.into(),
                    Slot {
                        cell,
                        value: value.clone(),
                        traced,
                    },
                );
                if let Some(owner) = owner {
                    value.attach(&owner.child(cell));
                    owner.tracker().changed(self.inner.shape);
                }
                Ok(true)
            }
        }
    }

    /// Remove a property, notifying its readers and the shape.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let slot = self.inner.props.borrow_mut().shift_remove(key)?;
        slot.value.detach();
        if let Some(owner) = self.owner() {
            owner.tracker().changed(slot.cell);
            owner.tracker().changed(self.inner.shape);
            owner.tracker().forget_cell(slot.cell);
        }
        Some(slot.value)
    }

    /// Plain JSON snapshot. Reads are not recorded.
    pub fn to_json(&self) -> serde_json::Value {
        let props = self.inner.props.borrow();
        let map = props
            .iter()
            .map(|(key, slot)| (key.to_string(), slot.value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    pub(crate) fn check_attach(&self, owner: &Owner, visited: &mut HashSet<u64>) -> Result<()> {
        if !visited.insert(self.inner.id) {
            return Err(ReactiveError::AlreadyOwned {
                object: self.inner.id,
                owner: owner.cell(),
            });
        }
        if let Some(current) = self.inner.owner.borrow().as_ref() {
            if !current.same_as(owner) {
                return Err(ReactiveError::AlreadyOwned {
                    object: self.inner.id,
                    owner: current.cell(),
                });
            }
        }
        let props = self.inner.props.borrow();
        for slot in props.values() {
            check_slot(
                self.inner.is_tracked(slot),
                &slot.value,
                &owner.child(slot.cell),
                visited,
            )?;
        }
        Ok(())
    }

    pub(crate) fn attach(&self, owner: &Owner) {
        *self.inner.owner.borrow_mut() = Some(owner.clone());
        let props = self.inner.props.borrow();
        for slot in props.values() {
            slot.value.attach(&owner.child(slot.cell));
        }
    }

    pub(crate) fn detach(&self) {
        let Some(owner) = self.inner.owner.borrow_mut().take() else {
            return;
        };
        owner.tracker().forget_cell(self.inner.shape);
        let props = self.inner.props.borrow();
        for slot in props.values() {
            owner.tracker().forget_cell(slot.cell);
            slot.value.detach();
        }
    }
}

/// Untracked slots may hold foreign values; everything else must attach.
fn check_slot(tracked: bool, value: &Value, owner: &Owner, visited: &mut HashSet<u64>) -> Result<()> {
    if !tracked && matches!(value, Value::Foreign(_)) {
        return Ok(());
    }
    value.check_attach(owner, visited)
}

impl Default for ObservedObject {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyAccessible for ObservedObject {
    fn get_property(&self, key: &str) -> Option<Value> {
        self.get(key)
    }

    fn has_property(&self, key: &str) -> bool {
        self.has(key)
    }

    fn property_kind(&self, key: &str) -> PropertyKind {
        match self.inner.props.borrow().get(key) {
            None => PropertyKind::Missing,
            Some(slot) if self.inner.is_tracked(slot) => PropertyKind::Tracked,
            Some(_) => PropertyKind::Untracked,
        }
    }
}

impl fmt::Debug for ObservedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let props = self.inner.props.borrow();
        let mut map = f.debug_map();
        for (key, slot) in props.iter() {
            map.entry(key, &slot.value);
        }
        map.finish()
    }
}
