//! Render Unit Implementation
//!
//! A render unit is a side-effecting computation that re-runs whenever the
//! cells it read change.
//!
//! # How Render Units Work
//!
//! 1. When created, the unit renders immediately to establish its initial
//!    dependencies.
//!
//! 2. When any dependency changes, the unit is queued on the tracker's
//!    dirty queue. It does not re-render on the spot.
//!
//! 3. The host drains the queue once per tick (see [`Tracker::flush`]).
//!    Before re-rendering, the unit clears its old dependencies and records
//!    new ones during the render.
//!
//! # Differences from Computed
//!
//! - Computed values recompute synchronously; render units are batched.
//! - Computed values hold a value; render units only run their side effect.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::consumer::{Consumer, ConsumerId, ConsumerKind, PathId};
use super::tracker::Tracker;
use crate::error::{ReactiveError, Result, UserError};

type RenderFn = Box<dyn FnMut() -> std::result::Result<(), UserError>>;

struct RenderInner {
    id: ConsumerId,
    tracker: Tracker,
    render: RefCell<RenderFn>,
    run_count: Cell<usize>,
    disposed: Cell<bool>,
}

impl RenderInner {
    fn execute(&self) -> Result<()> {
        if self.disposed.get() {
            return Ok(());
        }
        // Already rendering further up the stack.
        let Ok(mut render) = self.render.try_borrow_mut() else {
            tracing::warn!(consumer = self.id.raw(), "render unit re-entered itself");
            return Ok(());
        };

        self.tracker.clear(self.id);
        let outcome = {
            let _frame = self.tracker.record(self.id, PathId::ROOT);
            render()
        };
        self.run_count.set(self.run_count.get() + 1);

        outcome.map_err(|source| {
            tracing::debug!(consumer = self.id.raw(), error = %source, "render failed");
            ReactiveError::user(self.id, source)
        })
    }
}

impl Consumer for RenderInner {
    fn consumer_id(&self) -> ConsumerId {
        self.id
    }

    fn kind(&self) -> ConsumerKind {
        ConsumerKind::RenderUnit
    }

    fn on_notify(&self, _paths: &[PathId]) -> bool {
        !self.disposed.get()
    }

    fn run(&self) -> Result<()> {
        self.execute()
    }
}

impl Drop for RenderInner {
    fn drop(&mut self) {
        self.tracker.unregister(self.id);
    }
}

/// A side-effecting computation that re-renders when its dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = Tracker::new();
/// let count = StateCell::new(&tracker, 0);
///
/// let reader = count.clone();
/// let unit = RenderUnit::new(&tracker, move || {
///     println!("Count is: {}", reader.read());
/// })?;
///
/// count.write(5)?;
/// tracker.flush()?;  // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct RenderUnit {
    inner: Rc<RenderInner>,
}

impl RenderUnit {
    /// Create a render unit and render it once.
    pub fn new(tracker: &Tracker, mut render: impl FnMut() + 'static) -> Result<Self> {
        Self::try_new(tracker, move || {
            render();
            Ok(())
        })
    }

    /// Create a render unit from a fallible render function and render it once.
    ///
    /// A failing first render is returned as an error; the unit is dropped.
    pub fn try_new(
        tracker: &Tracker,
        render: impl FnMut() -> std::result::Result<(), UserError> + 'static,
    ) -> Result<Self> {
        let unit = Self::new_lazy(tracker, render)?;
        unit.render()?;
        Ok(unit)
    }

    /// Create a render unit without rendering it.
    pub fn new_lazy(
        tracker: &Tracker,
        render: impl FnMut() -> std::result::Result<(), UserError> + 'static,
    ) -> Result<Self> {
        let inner = Rc::new(RenderInner {
            id: ConsumerId::new(),
            tracker: tracker.clone(),
            render: RefCell::new(Box::new(render)),
            run_count: Cell::new(0),
            disposed: Cell::new(false),
        });
        let weak = Rc::downgrade(&inner);
        tracker.register(inner.id, ConsumerKind::RenderUnit, weak)?;
        Ok(Self { inner })
    }

    pub fn id(&self) -> ConsumerId {
        self.inner.id
    }

    /// Render now, replacing the recorded dependencies.
    pub fn render(&self) -> Result<()> {
        self.inner.execute()
    }

    /// Whether the unit is queued for the next flush.
    pub fn is_dirty(&self) -> bool {
        self.inner.tracker.is_dirty(self.inner.id)
    }

    /// Number of times the unit has rendered.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of cells read by the last render.
    pub fn dependency_count(&self) -> usize {
        self.inner.tracker.dependency_count(self.inner.id)
    }

    /// Stop rendering and drop every subscription.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.tracker.unregister(self.inner.id);
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl std::fmt::Debug for RenderUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderUnit")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
