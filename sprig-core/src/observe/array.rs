//! Observed arrays.
//!
//! An array is observed as a whole: one container slot is recorded by every
//! element read, length read or iteration, and every mutation notifies it.
//! Elements are owned through the container slot, so nested objects stay
//! observable at property granularity.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::object::next_object_id;
use super::path::{PropertyAccessible, PropertyKind};
use super::value::Value;
use super::Owner;
use crate::error::{ReactiveError, Result};
use crate::reactive::CellId;

/// Process-wide mutation counter. Stamps only grow, so the largest stamp in
/// an array tree changes whenever anything in the tree is mutated.
static MUTATION_STAMP: AtomicU64 = AtomicU64::new(1);

/// Most `undefined` slots a write past the end may pad.
pub const MAX_PADDING: usize = 1024;

pub(crate) struct ArrayInner {
    id: u64,
    cell: CellId,
    stamp: Cell<u64>,
    items: RefCell<Vec<Value>>,
    owner: RefCell<Option<Owner>>,
}

impl Drop for ArrayInner {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.get_mut().take() {
            owner.tracker().forget_cell(self.cell);
        }
    }
}

/// An array observed through a single container slot.
#[derive(Clone)]
pub struct ObservedArray {
    inner: Rc<ArrayInner>,
}

impl ObservedArray {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                id: next_object_id(),
                cell: CellId::new(),
                stamp: Cell::new(MUTATION_STAMP.fetch_add(1, Ordering::Relaxed)),
                items: RefCell::new(items),
                owner: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The container slot every read records.
    pub fn container_id(&self) -> CellId {
        self.inner.cell
    }

    pub fn ptr_eq(&self, other: &ObservedArray) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<ArrayInner> {
        Rc::downgrade(&self.inner)
    }

    fn owner(&self) -> Option<Owner> {
        self.inner.owner.borrow().clone()
    }

    pub fn owner_cell(&self) -> Option<CellId> {
        self.inner.owner.borrow().as_ref().map(Owner::cell)
    }

    pub fn is_attached(&self) -> bool {
        self.inner.owner.borrow().is_some()
    }

    /// Record the container slot.
    pub fn track(&self) {
        if let Some(owner) = self.owner() {
            owner.tracker().record_read(self.inner.cell);
        }
    }

    /// Record this container and the containers of all nested arrays.
    pub fn track_deep(&self) {
        self.track();
        for item in self.inner.items.borrow().iter() {
            if let Value::Array(nested) = item {
                nested.track_deep();
            }
        }
    }

    /// Stamp of the last mutation of this array.
    pub fn stamp(&self) -> u64 {
        self.inner.stamp.get()
    }

    /// Largest mutation stamp in this array and its nested arrays.
    pub fn deep_stamp(&self) -> u64 {
        self.inner
            .items
            .borrow()
            .iter()
            .filter_map(Value::as_array)
            .map(ObservedArray::deep_stamp)
            .fold(self.stamp(), u64::max)
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.track();
        self.peek(index)
    }

    pub fn peek(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.track();
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.track();
        self.inner.items.borrow().clone()
    }

    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let len = self.inner.items.borrow().len();
        self.splice(len, 0, vec![value.into()]).map(|_| ())
    }

    pub fn pop(&self) -> Option<Value> {
        let len = self.inner.items.borrow().len();
        if len == 0 {
            return None;
        }
        self.splice(len - 1, 1, Vec::new()).ok()?.pop()
    }

    /// Insert at `index`; an index past the end appends.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.splice(index, 0, vec![value.into()]).map(|_| ())
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        if index >= self.inner.items.borrow().len() {
            return None;
        }
        self.splice(index, 1, Vec::new()).ok()?.pop()
    }

    /// Replace the element at `index`. Writing the current value is a no-op;
    /// an index past the end pads with `undefined`, at most [`MAX_PADDING`]
    /// slots. Farther writes return `IndexOutOfRange`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let len = self.inner.items.borrow().len();
        if index < len {
            if self.peek(index).as_ref() == Some(&value) {
                return Ok(false);
            }
            self.splice(index, 1, vec![value])?;
        } else {
            if index - len > MAX_PADDING {
                return Err(ReactiveError::IndexOutOfRange { index, len });
            }
            let mut items = vec![Value::Undefined; index - len];
            items.push(value);
            self.splice(len, 0, items)?;
        }
        Ok(true)
    }

    /// Swap two elements. Returns false if either index is out of range.
    pub fn swap(&self, a: usize, b: usize) -> bool {
        {
            let mut items = self.inner.items.borrow_mut();
            if a >= items.len() || b >= items.len() {
                return false;
            }
            if a == b {
                return true;
            }
            items.swap(a, b);
        }
        self.touched();
        true
    }

    pub fn clear(&self) {
        let len = self.inner.items.borrow().len();
        if len > 0 {
            // Removing never fails.
            let _ = self.splice(0, len, Vec::new());
        }
    }

    /// Replace the whole contents.
    pub fn replace_all(&self, items: Vec<Value>) -> Result<()> {
        let len = self.inner.items.borrow().len();
        self.splice(0, len, items).map(|_| ())
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    ///
    /// On an attached array the inserted values are attached first; if any
    /// of them cannot be, nothing changes.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Result<Vec<Value>> {
        let owner = self.owner();
        if let Some(owner) = &owner {
            let child = owner.child(self.inner.cell);
            let mut visited = HashSet::new();
            for item in &items {
                item.check_attach(&child, &mut visited)?;
            }
        }

        let removed: Vec<Value> = {
            let mut current = self.inner.items.borrow_mut();
            let len = current.len();
            let start = start.min(len);
            let end = start.saturating_add(delete_count).min(len);
            if start == end && items.is_empty() {
                return Ok(Vec::new());
            }
            current.splice(start..end, items.iter().cloned()).collect()
        };

        if let Some(owner) = &owner {
            let child = owner.child(self.inner.cell);
            for item in &items {
                item.attach(&child);
            }
        }
        for item in &removed {
            // The same wrapper may still sit at another index.
            if !self.inner.items.borrow().contains(item) {
                item.detach();
            }
        }
        self.touched();
        Ok(removed)
    }

    fn touched(&self) {
        self.inner
            .stamp
            .set(MUTATION_STAMP.fetch_add(1, Ordering::Relaxed));
        if let Some(owner) = self.owner() {
            owner.tracker().changed(self.inner.cell);
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.inner.items.borrow().iter().map(Value::to_json).collect())
    }

    pub(crate) fn check_attach(&self, owner: &Owner, visited: &mut HashSet<u64>) -> Result<()> {
        if !visited.insert(self.inner.id) {
            return Err(crate::error::ReactiveError::AlreadyOwned {
                object: self.inner.id,
                owner: owner.cell(),
            });
        }
        if let Some(current) = self.inner.owner.borrow().as_ref() {
            if !current.same_as(owner) {
                return Err(crate::error::ReactiveError::AlreadyOwned {
                    object: self.inner.id,
                    owner: current.cell(),
                });
            }
        }
        let child = owner.child(self.inner.cell);
        let mut seen = HashSet::new();
        for item in self.inner.items.borrow().iter() {
            // Repeated wrappers inside one array share the container slot.
            if let Some(identity) = item.identity() {
                if !seen.insert(identity.addr()) {
                    continue;
                }
            }
            item.check_attach(&child, visited)?;
        }
        Ok(())
    }

    pub(crate) fn attach(&self, owner: &Owner) {
        *self.inner.owner.borrow_mut() = Some(owner.clone());
        let child = owner.child(self.inner.cell);
        for item in self.inner.items.borrow().iter() {
            item.attach(&child);
        }
    }

    pub(crate) fn detach(&self) {
        let Some(owner) = self.inner.owner.borrow_mut().take() else {
            return;
        };
        owner.tracker().forget_cell(self.inner.cell);
        for item in self.inner.items.borrow().iter() {
            item.detach();
        }
    }
}

impl Default for ObservedArray {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyAccessible for ObservedArray {
    fn get_property(&self, key: &str) -> Option<Value> {
        if key == "length" {
            return Some(Value::from(self.len()));
        }
        key.parse::<usize>().ok().and_then(|index| self.get(index))
    }

    fn has_property(&self, key: &str) -> bool {
        self.property_kind(key) == PropertyKind::Tracked
    }

    fn property_kind(&self, key: &str) -> PropertyKind {
        let len = self.inner.items.borrow().len();
        match key.parse::<usize>() {
            Ok(index) if index < len => PropertyKind::Tracked,
            Err(_) if key == "length" => PropertyKind::Tracked,
            _ => PropertyKind::Missing,
        }
    }
}

impl fmt::Debug for ObservedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.items.borrow().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::ObservedObject;
    use crate::reactive::{ConsumerId, PathId, Tracker};

    fn attached(array: &ObservedArray, tracker: &Tracker) {
        let owner = Owner::new(CellId::new(), tracker.clone());
        array.check_attach(&owner, &mut HashSet::new()).unwrap();
        array.attach(&owner);
    }

    #[test]
    fn element_reads_record_the_container() {
        let tracker = Tracker::new();
        let list = ObservedArray::from_vec(vec![1.into(), 2.into()]);
        attached(&list, &tracker);
        let reader = ConsumerId::new();

        {
            let _guard = tracker.record(reader, PathId::ROOT);
            list.get(0);
            list.len();
        }

        assert_eq!(tracker.dependency_count(reader), 1);
        assert!(tracker.is_subscribed(reader, list.container_id()));
    }

    #[test]
    fn mutations_bump_stamp() {
        let list = ObservedArray::new();
        let before = list.stamp();
        list.push(1).unwrap();
        assert!(list.stamp() > before);

        let stamp = list.stamp();
        assert!(!list.set(0, 1).unwrap());
        assert_eq!(list.stamp(), stamp);
    }

    #[test]
    fn nested_mutation_changes_deep_stamp() {
        let inner = ObservedArray::from_vec(vec![1.into()]);
        let grid = ObservedArray::from_vec(vec![inner.clone().into()]);
        let before = grid.deep_stamp();

        inner.push(2).unwrap();
        assert!(grid.deep_stamp() > before);
        assert!(grid.stamp() < grid.deep_stamp());
    }

    #[test]
    fn splice_edits_in_place() {
        let list = ObservedArray::from_vec(vec!["a".into(), "b".into(), "c".into()]);
        let removed = list.splice(1, 1, vec!["x".into(), "y".into()]).unwrap();
        assert_eq!(removed, vec![Value::from("b")]);
        assert_eq!(
            list.to_json(),
            serde_json::json!(["a", "x", "y", "c"])
        );
        assert_eq!(list.remove(0), Some(Value::from("a")));
        assert_eq!(list.pop(), Some(Value::from("c")));
        assert!(list.swap(0, 1));
        assert_eq!(list.to_json(), serde_json::json!(["y", "x"]));
    }

    #[test]
    fn set_past_end_pads_with_undefined() {
        let list = ObservedArray::new();
        assert!(list.set(2, "z").unwrap());
        assert_eq!(list.peek(0), Some(Value::Undefined));
        assert_eq!(list.peek(2), Some(Value::from("z")));
    }

    #[test]
    fn set_far_past_end_is_rejected() {
        let list = ObservedArray::new();
        let err = list.set(usize::MAX, "z").unwrap_err();
        assert!(matches!(err, ReactiveError::IndexOutOfRange { len: 0, .. }));
        assert!(list.peek(0).is_none());

        assert!(list.set(MAX_PADDING, "edge").unwrap());
        assert_eq!(list.peek(MAX_PADDING), Some(Value::from("edge")));
    }

    #[test]
    fn removed_objects_are_detached() {
        let tracker = Tracker::new();
        let item = ObservedObject::new().with("x", 1);
        let list = ObservedArray::from_vec(vec![item.clone().into()]);
        attached(&list, &tracker);
        assert!(item.is_attached());

        list.remove(0);
        assert!(!item.is_attached());
    }

    #[test]
    fn length_and_indices_are_accessible() {
        let list = ObservedArray::from_vec(vec![true.into()]);
        assert_eq!(list.get_property("length"), Some(Value::from(1)));
        assert_eq!(list.get_property("0"), Some(Value::Bool(true)));
        assert_eq!(list.property_kind("1"), PropertyKind::Missing);
        assert!(list.has_property("0"));
    }
}
