//! State Cell Implementation
//!
//! A state cell is the fundamental reactive primitive. It holds a value
//! and lets the tracker know who read it.
//!
//! # How Cells Work
//!
//! 1. When a cell is read inside a recording frame, the frame's consumer is
//!    subscribed to the cell.
//!
//! 2. When a cell is written with a value that differs from the current
//!    one, every subscribed consumer is notified exactly once.
//!
//! 3. Writing an equal value does nothing at all.
//!
//! # Deep cells
//!
//! A deep cell attaches the observed wrappers it holds (see
//! [`crate::observe`]) so that reads of individual properties are
//! attributable. Replacing the value detaches the old wrapper and drops
//! every subscription to its slots. A deep cell refuses values it cannot
//! observe.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use super::consumer::CellId;
use super::tracker::Tracker;
use crate::error::{ReactiveError, Result};
use crate::observe::{Owner, Value, ValueKind};

/// A type a cell can hold.
///
/// Equality is `PartialEq`. Types that contain observed wrappers override
/// the attach hooks; plain types keep the no-op defaults.
pub trait CellValue: Clone + PartialEq + 'static {
    fn value_kind(&self) -> ValueKind;

    /// Check that the value can be attached to `owner`. Must not mutate.
    fn check_attach(&self, _owner: &Owner) -> Result<()> {
        Ok(())
    }

    fn attach(&self, _owner: &Owner) {}

    fn detach(&self) {}
}

macro_rules! plain_cell_value {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl CellValue for $ty {
                fn value_kind(&self) -> ValueKind {
                    ValueKind::$kind
                }
            }
        )*
    };
}

plain_cell_value!(
    () => Undefined,
    bool => Bool,
    i8 => Number,
    i16 => Number,
    i32 => Number,
    i64 => Number,
    u8 => Number,
    u16 => Number,
    u32 => Number,
    u64 => Number,
    usize => Number,
    isize => Number,
    f32 => Number,
    f64 => Number,
    char => String,
    String => String,
    &'static str => String,
);

impl<T: CellValue> CellValue for Option<T> {
    fn value_kind(&self) -> ValueKind {
        self.as_ref().map_or(ValueKind::Null, CellValue::value_kind)
    }

    fn check_attach(&self, owner: &Owner) -> Result<()> {
        self.as_ref().map_or(Ok(()), |v| v.check_attach(owner))
    }

    fn attach(&self, owner: &Owner) {
        if let Some(v) = self {
            v.attach(owner);
        }
    }

    fn detach(&self) {
        if let Some(v) = self {
            v.detach();
        }
    }
}

impl<T: CellValue> CellValue for Vec<T> {
    fn value_kind(&self) -> ValueKind {
        ValueKind::Array
    }

    fn check_attach(&self, owner: &Owner) -> Result<()> {
        self.iter().try_for_each(|v| v.check_attach(owner))
    }

    fn attach(&self, owner: &Owner) {
        self.iter().for_each(|v| v.attach(owner));
    }

    fn detach(&self) {
        self.iter().for_each(CellValue::detach);
    }
}

impl CellValue for Value {
    fn value_kind(&self) -> ValueKind {
        self.kind()
    }

    fn check_attach(&self, owner: &Owner) -> Result<()> {
        Value::check_attach(self, owner, &mut Default::default())
    }

    fn attach(&self, owner: &Owner) {
        Value::attach(self, owner);
    }

    fn detach(&self) {
        Value::detach(self);
    }
}

fn check_deep<T: CellValue>(cell: CellId, value: &T, owner: &Owner) -> Result<()> {
    let kind = value.value_kind();
    if !kind.is_observable() {
        return Err(ReactiveError::UnsupportedValueKind { cell, kind });
    }
    value.check_attach(owner)
}

/// How deeply a cell observes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Only replacing the value is observed.
    Shallow,
    /// Object wrappers are attached; property reads are attributable.
    Deep,
}

struct CellInner<T: CellValue> {
    id: CellId,
    tracker: Tracker,
    mode: Observation,
    value: RefCell<T>,
    version: Cell<u64>,
}

impl<T: CellValue> CellInner<T> {
    fn owner(&self) -> Owner {
        Owner::new(self.id, self.tracker.clone())
    }
}

impl<T: CellValue> Drop for CellInner<T> {
    fn drop(&mut self) {
        self.tracker.forget_cell(self.id);
        if self.mode == Observation::Deep {
            self.value.get_mut().detach();
        }
    }
}

/// A reactive cell holding a value of type `T`.
///
/// Cloning the handle shares the cell; the cell goes away with the last
/// handle.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = Tracker::new();
/// let count = StateCell::new(&tracker, 0);
///
/// // Read the value
/// let value = count.read();
///
/// // Update the value (notifies subscribers)
/// count.write(5)?;
/// ```
pub struct StateCell<T: CellValue> {
    inner: Rc<CellInner<T>>,
}

impl<T: CellValue> StateCell<T> {
    /// Create a shallow cell.
    pub fn new(tracker: &Tracker, value: T) -> Self {
        Self::build(CellId::new(), tracker, value, Observation::Shallow)
    }

    /// Create a deep cell, attaching the wrappers in `value`.
    pub fn deep(tracker: &Tracker, value: T) -> Result<Self> {
        let id = CellId::new();
        let owner = Owner::new(id, tracker.clone());
        check_deep(id, &value, &owner)?;
        value.attach(&owner);
        Ok(Self::build(id, tracker, value, Observation::Deep))
    }

    fn build(id: CellId, tracker: &Tracker, value: T, mode: Observation) -> Self {
        Self {
            inner: Rc::new(CellInner {
                id,
                tracker: tracker.clone(),
                mode,
                value: RefCell::new(value),
                version: Cell::new(0),
            }),
        }
    }

    pub fn id(&self) -> CellId {
        self.inner.id
    }

    pub fn mode(&self) -> Observation {
        self.inner.mode
    }

    pub fn tracker(&self) -> &Tracker {
        &self.inner.tracker
    }

    /// Number of effective writes so far.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Get the current value.
    ///
    /// If called within a recording frame, this also subscribes the
    /// frame's consumer.
    pub fn read(&self) -> T {
        self.inner.tracker.record_read(self.inner.id);
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, recording the read.
    ///
    /// `f` must not write this cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.tracker.record_read(self.inner.id);
        f(&self.inner.value.borrow())
    }

    /// Get the current value without recording a dependency.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Alias of [`StateCell::peek`].
    pub fn get_untracked(&self) -> T {
        self.peek()
    }

    /// Replace the value.
    ///
    /// Returns `Ok(false)` without side effects when `value` equals the
    /// current value. A deep cell rejects values it cannot observe, leaving
    /// the current value in place and notifying no one.
    pub fn write(&self, value: T) -> Result<bool> {
        if *self.inner.value.borrow() == value {
            return Ok(false);
        }

        let deep = self.inner.mode == Observation::Deep;
        if deep {
            check_deep(self.inner.id, &value, &self.inner.owner())?;
        }

        let old = self.inner.value.replace(value);
        if deep {
            old.detach();
            self.inner.value.borrow().attach(&self.inner.owner());
        }
        drop(old);

        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);
        tracing::trace!(cell = self.inner.id.raw(), version, "cell written");

        self.inner.tracker.changed(self.inner.id);
        Ok(true)
    }

    /// Write `f(&current)`.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<bool> {
        let next = f(&self.inner.value.borrow());
        self.write(next)
    }

    /// Number of consumers currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.tracker.subscriber_count(self.inner.id)
    }
}

impl<T: CellValue> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: CellValue + Debug> Debug for StateCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCell")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.version())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
