//! Computed Values
//!
//! A computed value is a derived value that recomputes whenever a cell it
//! read changes.
//!
//! # How Computed Values Work
//!
//! 1. On creation the computation runs inside a recording frame and the
//!    result is stored in an inner cell.
//!
//! 2. When a dependency changes, the value recomputes synchronously during
//!    the write's notification. It is never queued.
//!
//! 3. The result is written to the inner cell. If it equals the previous
//!    result nothing downstream is notified, so readers of a computed value
//!    only hear about real changes.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use super::cell::{CellValue, StateCell};
use super::consumer::{Consumer, ConsumerId, ConsumerKind, PathId};
use super::tracker::Tracker;
use crate::error::Result;

type ComputeFn<T> = Box<dyn FnMut() -> T>;

struct ComputedInner<T: CellValue> {
    id: ConsumerId,
    tracker: Tracker,
    compute: RefCell<ComputeFn<T>>,
    value: StateCell<T>,
    recomputes: Cell<usize>,
}

impl<T: CellValue> ComputedInner<T> {
    fn recompute(&self) {
        let Ok(mut compute) = self.compute.try_borrow_mut() else {
            tracing::warn!(consumer = self.id.raw(), "computed value depends on itself");
            return;
        };

        self.tracker.clear(self.id);
        let next = {
            let _frame = self.tracker.record(self.id, PathId::ROOT);
            compute()
        };
        drop(compute);
        self.recomputes.set(self.recomputes.get() + 1);

        // The inner cell is shallow, so the write cannot be refused.
        if let Err(err) = self.value.write(next) {
            tracing::warn!(consumer = self.id.raw(), error = %err, "computed write refused");
        }
    }
}

impl<T: CellValue> Consumer for ComputedInner<T> {
    fn consumer_id(&self) -> ConsumerId {
        self.id
    }

    fn kind(&self) -> ConsumerKind {
        ConsumerKind::Computed
    }

    fn on_notify(&self, _paths: &[PathId]) -> bool {
        self.recompute();
        false
    }

    fn run(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: CellValue> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.tracker.unregister(self.id);
    }
}

/// A derived value kept up to date with the cells it reads.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = Tracker::new();
/// let count = StateCell::new(&tracker, 2);
///
/// let source = count.clone();
/// let doubled = Computed::new(&tracker, move || source.read() * 2)?;
/// assert_eq!(doubled.get(), 4);
///
/// count.write(5)?;
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T: CellValue> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: CellValue> Computed<T> {
    /// Create a computed value. The computation runs once immediately.
    pub fn new(tracker: &Tracker, compute: impl FnMut() -> T + 'static) -> Result<Self> {
        let id = ConsumerId::new();
        let mut compute: ComputeFn<T> = Box::new(compute);
        let initial = {
            let _frame = tracker.record(id, PathId::ROOT);
            compute()
        };

        let inner = Rc::new(ComputedInner {
            id,
            tracker: tracker.clone(),
            compute: RefCell::new(compute),
            value: StateCell::new(tracker, initial),
            recomputes: Cell::new(1),
        });
        let weak = Rc::downgrade(&inner);
        tracker.register(id, ConsumerKind::Computed, weak)?;
        Ok(Self { inner })
    }

    pub fn id(&self) -> ConsumerId {
        self.inner.id
    }

    /// Get the current value, recording a read of it.
    pub fn get(&self) -> T {
        self.inner.value.read()
    }

    /// Get the current value without recording a dependency.
    pub fn peek(&self) -> T {
        self.inner.value.peek()
    }

    /// The cell holding the result, for readers that want its id or version.
    pub fn cell(&self) -> &StateCell<T> {
        &self.inner.value
    }

    /// Number of times the computation has run.
    pub fn recompute_count(&self) -> usize {
        self.inner.recomputes.get()
    }

    /// Number of cells read by the last computation.
    pub fn dependency_count(&self) -> usize {
        self.inner.tracker.dependency_count(self.inner.id)
    }
}

impl<T: CellValue> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: CellValue + Debug> Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("value", &self.peek())
            .field("recompute_count", &self.recompute_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::RenderUnit;

    #[test]
    fn computes_on_creation() {
        let tracker = Tracker::new();
        let count = StateCell::new(&tracker, 2);
        let source = count.clone();
        let doubled = Computed::new(&tracker, move || source.read() * 2).unwrap();

        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.recompute_count(), 1);
        assert_eq!(doubled.dependency_count(), 1);
    }

    #[test]
    fn recomputes_synchronously_on_change() {
        let tracker = Tracker::new();
        let count = StateCell::new(&tracker, 2);
        let source = count.clone();
        let doubled = Computed::new(&tracker, move || source.read() * 2).unwrap();

        count.write(5).unwrap();
        assert_eq!(doubled.peek(), 10);
        assert_eq!(doubled.recompute_count(), 2);
        // Never queued.
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn unchanged_result_does_not_notify_readers() {
        let tracker = Tracker::new();
        let count = StateCell::new(&tracker, 3);
        let source = count.clone();
        let parity = Computed::new(&tracker, move || source.read() % 2).unwrap();

        let reader = parity.clone();
        let unit = RenderUnit::new(&tracker, move || {
            reader.get();
        })
        .unwrap();

        count.write(5).unwrap();
        assert_eq!(parity.recompute_count(), 2);
        assert!(!unit.is_dirty());

        count.write(6).unwrap();
        assert!(unit.is_dirty());
    }

    #[test]
    fn chained_computed_values() {
        let tracker = Tracker::new();
        let base = StateCell::new(&tracker, 1);
        let source = base.clone();
        let plus_one = Computed::new(&tracker, move || source.read() + 1).unwrap();
        let upstream = plus_one.clone();
        let times_ten = Computed::new(&tracker, move || upstream.get() * 10).unwrap();

        base.write(4).unwrap();
        assert_eq!(times_ten.peek(), 50);
    }

    #[test]
    fn dropping_computed_unregisters() {
        let tracker = Tracker::new();
        let base = StateCell::new(&tracker, 1);
        let source = base.clone();
        let derived = Computed::new(&tracker, move || source.read()).unwrap();
        let id = derived.id();

        drop(derived);
        assert!(!tracker.is_registered(id));
        assert_eq!(base.subscriber_count(), 0);
    }
}
