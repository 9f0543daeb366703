//! Monitors
//!
//! A monitor watches a list of dotted property paths under a deep cell and
//! runs a user function when the value at one of them changes.
//!
//! # How It Works
//!
//! 1. Every watched path gets its own [`PathId`]. The path is resolved
//!    inside a recording frame for `(monitor, path)`, so the tracker knows
//!    which path each subscription belongs to.
//!
//! 2. `init_run` resolves every path once and seeds `before = now`. The
//!    first observation never fires.
//!
//! 3. When a cell under a path changes, the tracker hands the monitor the
//!    affected path ids. Each one is re-resolved (its old subscriptions are
//!    replaced) and compared with its `before` value. The monitor asks to be
//!    queued only if a path became dirty.
//!
//! 4. When the host drains the queue, the user function runs once with
//!    every dirty path. Afterwards all entries are reset, also when the user
//!    function fails or panics.
//!
//! # Presence
//!
//! A path that stops resolving becomes absent (`now = None`). Disappearing
//! and reappearing are both changes, even when the value that reappears
//! equals the one that disappeared, because the reset after the
//! disappearance leaves `before = None`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::diagnostics::Diagnostic;
use crate::error::{ReactiveError, Result, UserError};
use crate::observe::{resolve, PropertyPath, Resolution, Value};
use crate::reactive::{Consumer, ConsumerId, ConsumerKind, PathId, StateCell, Tracker};

type MonitorFn = Box<dyn FnMut(&MonitorEvent) -> std::result::Result<(), UserError>>;

/// The state of one watched path.
#[derive(Debug, Clone)]
pub struct MonitorValue {
    path: PropertyPath,
    id: PathId,
    before: Option<Value>,
    now: Option<Value>,
    before_stamp: Option<u64>,
    now_stamp: Option<u64>,
    dirty: bool,
    monitorable: bool,
}

impl MonitorValue {
    fn new(path: PropertyPath, id: PathId) -> Self {
        Self {
            path,
            id,
            before: None,
            now: None,
            before_stamp: None,
            now_stamp: None,
            dirty: false,
            monitorable: true,
        }
    }

    pub fn path(&self) -> &PropertyPath {
        &self.path
    }

    pub fn id(&self) -> PathId {
        self.id
    }

    /// Value at the last reset.
    pub fn before(&self) -> Option<&Value> {
        self.before.as_ref()
    }

    /// Value at the last resolution.
    pub fn now(&self) -> Option<&Value> {
        self.now.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the path resolved the last time it was evaluated.
    pub fn is_present(&self) -> bool {
        self.now.is_some()
    }

    pub fn is_monitorable(&self) -> bool {
        self.monitorable
    }

    fn compute_dirty(&self) -> bool {
        if !self.monitorable {
            return false;
        }
        // Arrays compare by identity; the stamp catches in-place mutation.
        self.before != self.now || self.before_stamp != self.now_stamp
    }

    fn reset(&mut self) {
        self.before = self.now.clone();
        self.before_stamp = self.now_stamp;
        self.dirty = false;
    }
}

/// Before and after values of a dirty path.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorChange {
    pub before: Option<Value>,
    pub now: Option<Value>,
}

/// What the user function sees.
#[derive(Debug, Clone, Default)]
pub struct MonitorEvent {
    changes: Vec<(PropertyPath, MonitorChange)>,
}

impl MonitorEvent {
    /// Dirty paths in watch order.
    pub fn dirty_paths(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|(path, _)| path.as_str())
    }

    pub fn value(&self, path: &str) -> Option<&MonitorChange> {
        self.changes
            .iter()
            .find(|(p, _)| p.as_str() == path)
            .map(|(_, change)| change)
    }

    /// The change of the first dirty path.
    pub fn value_first(&self) -> Option<&MonitorChange> {
        self.changes.first().map(|(_, change)| change)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

struct MonitorInner {
    id: ConsumerId,
    tracker: Tracker,
    source: StateCell<Value>,
    entries: RefCell<Vec<MonitorValue>>,
    callback: RefCell<MonitorFn>,
    next_path: Cell<u32>,
    runs: Cell<usize>,
    disposed: Cell<bool>,
}

/// Resets every entry when dropped.
struct ResetGuard<'a> {
    entries: &'a RefCell<Vec<MonitorValue>>,
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut entries) = self.entries.try_borrow_mut() {
            entries.iter_mut().for_each(MonitorValue::reset);
        }
    }
}

impl MonitorInner {
    fn allocate_path(&self) -> PathId {
        let index = self.next_path.get();
        self.next_path.set(index + 1);
        PathId::new(index)
    }

    /// Re-resolve one path and update its entry. Returns whether it is
    /// dirty, or `None` if the path is not watched.
    fn evaluate(&self, path_id: PathId, seed: bool) -> Option<bool> {
        let path = self
            .entries
            .borrow()
            .iter()
            .find(|entry| entry.id == path_id)
            .map(|entry| entry.path.clone())?;

        self.tracker.clear_path(self.id, path_id);
        let resolution = {
            let _frame = self.tracker.record(self.id, path_id);
            let root = self.source.read();
            resolve(&self.tracker, &root, &path)
        };

        let (dirty, diagnostic) = {
            let mut entries = self.entries.borrow_mut();
            let entry = entries.iter_mut().find(|entry| entry.id == path_id)?;
            let was_present = entry.is_present();
            let was_monitorable = entry.monitorable;

            let diagnostic = match resolution {
                Resolution::Found { value, stamp } => {
                    entry.monitorable = true;
                    entry.now = Some(value);
                    entry.now_stamp = stamp;
                    None
                }
                Resolution::NotFound { .. } => {
                    entry.monitorable = true;
                    entry.now = None;
                    entry.now_stamp = None;
                    (seed || was_present).then(|| Diagnostic::PathNotFound {
                        monitor: self.id,
                        path: path.to_string(),
                    })
                }
                Resolution::Unmonitorable { segment } => {
                    entry.monitorable = false;
                    (seed || was_monitorable).then(|| Diagnostic::UnmonitorableProperty {
                        monitor: self.id,
                        path: path.to_string(),
                        segment,
                    })
                }
            };

            if seed {
                entry.reset();
            } else {
                entry.dirty = entry.compute_dirty();
            }
            (entry.dirty, diagnostic)
        };

        if let Some(diagnostic) = diagnostic {
            self.tracker.report(diagnostic);
        }
        Some(dirty)
    }

    fn init_run(&self) {
        let ids: Vec<PathId> = self.entries.borrow().iter().map(|e| e.id).collect();
        for id in ids {
            self.evaluate(id, true);
        }
    }

    fn notify_change(&self, path_id: PathId) -> Option<ConsumerId> {
        if self.disposed.get() {
            return None;
        }
        match self.evaluate(path_id, false) {
            Some(true) => Some(self.id),
            _ => None,
        }
    }

    fn run_monitor_function(&self) -> Result<bool> {
        if self.disposed.get() {
            return Ok(false);
        }

        let event = MonitorEvent {
            changes: self
                .entries
                .borrow()
                .iter()
                .filter(|entry| entry.dirty)
                .map(|entry| {
                    let change = MonitorChange {
                        before: entry.before.clone(),
                        now: entry.now.clone(),
                    };
                    (entry.path.clone(), change)
                })
                .collect(),
        };

        let _reset = ResetGuard {
            entries: &self.entries,
        };
        if event.is_empty() {
            return Ok(false);
        }
        let Ok(mut callback) = self.callback.try_borrow_mut() else {
            tracing::warn!(monitor = self.id.raw(), "monitor function re-entered itself");
            return Ok(false);
        };

        self.runs.set(self.runs.get() + 1);
        tracing::debug!(monitor = self.id.raw(), dirty = event.len(), "running monitor function");
        callback(&event).map_err(|source| ReactiveError::user(self.id, source))?;
        Ok(true)
    }
}

impl Consumer for MonitorInner {
    fn consumer_id(&self) -> ConsumerId {
        self.id
    }

    fn kind(&self) -> ConsumerKind {
        ConsumerKind::Monitor
    }

    fn on_notify(&self, paths: &[PathId]) -> bool {
        let mut dirty = false;
        for path in paths {
            dirty |= self.notify_change(*path).is_some();
        }
        dirty
    }

    fn run(&self) -> Result<()> {
        self.run_monitor_function().map(|_| ())
    }
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        self.tracker.unregister(self.id);
    }
}

/// Watches property paths under a deep cell.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = Tracker::new();
/// let data = ObservedObject::new().with("count", 1);
/// let state = StateCell::deep(&tracker, Value::from(data.clone()))?;
///
/// let monitor = Monitor::new(&tracker, &state, ["count"], |event| {
///     println!("count: {:?}", event.value("count"));
///     Ok(())
/// })?;
///
/// data.set("count", 2)?;
/// tracker.flush()?;  // Prints the before and after values
/// ```
#[derive(Clone)]
pub struct Monitor {
    inner: Rc<MonitorInner>,
}

impl Monitor {
    /// Create a monitor over `paths` and run [`init_run`](Self::init_run).
    ///
    /// Fails with `InvalidPath` if a path is empty or has an empty segment.
    pub fn new<P: AsRef<str>>(
        tracker: &Tracker,
        source: &StateCell<Value>,
        paths: impl IntoIterator<Item = P>,
        callback: impl FnMut(&MonitorEvent) -> std::result::Result<(), UserError> + 'static,
    ) -> Result<Self> {
        let parsed = paths
            .into_iter()
            .map(|p| PropertyPath::parse(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let inner = Rc::new(MonitorInner {
            id: ConsumerId::new(),
            tracker: tracker.clone(),
            source: source.clone(),
            entries: RefCell::new(Vec::with_capacity(parsed.len())),
            callback: RefCell::new(Box::new(callback)),
            next_path: Cell::new(1),
            runs: Cell::new(0),
            disposed: Cell::new(false),
        });
        for path in parsed {
            let id = inner.allocate_path();
            inner.entries.borrow_mut().push(MonitorValue::new(path, id));
        }

        let weak = Rc::downgrade(&inner);
        tracker.register(inner.id, ConsumerKind::Monitor, weak)?;
        let monitor = Self { inner };
        monitor.init_run();
        Ok(monitor)
    }

    pub fn id(&self) -> ConsumerId {
        self.inner.id
    }

    /// Resolve every path and seed `before = now`. Never marks anything dirty.
    pub fn init_run(&self) {
        self.inner.init_run();
    }

    /// Re-resolve one path. Returns the monitor id if the path is now dirty.
    pub fn notify_change(&self, path: PathId) -> Option<ConsumerId> {
        self.inner.notify_change(path)
    }

    /// Run the user function with the dirty paths, then reset every entry.
    ///
    /// Returns whether the function ran. A failing function is returned as
    /// `UserFunctionException` after the reset.
    pub fn run_monitor_function(&self) -> Result<bool> {
        self.inner.run_monitor_function()
    }

    /// Start watching another path. It is seeded like `init_run`.
    pub fn add_path(&self, path: &str) -> Result<PathId> {
        let path = PropertyPath::parse(path)?;
        let id = self.inner.allocate_path();
        self.inner
            .entries
            .borrow_mut()
            .push(MonitorValue::new(path, id));
        self.inner.evaluate(id, true);
        Ok(id)
    }

    /// Stop watching a path. Returns whether it was watched.
    pub fn remove_path(&self, path: &str) -> bool {
        let removed = {
            let mut entries = self.inner.entries.borrow_mut();
            let position = entries.iter().position(|e| e.path.as_str() == path);
            position.map(|position| entries.remove(position))
        };
        match removed {
            Some(entry) => {
                self.inner.tracker.clear_path(self.inner.id, entry.id);
                true
            }
            None => false,
        }
    }

    /// Snapshot of every watched path.
    pub fn values(&self) -> Vec<MonitorValue> {
        self.inner.entries.borrow().clone()
    }

    pub fn value(&self, path: &str) -> Option<MonitorValue> {
        self.inner
            .entries
            .borrow()
            .iter()
            .find(|entry| entry.path.as_str() == path)
            .cloned()
    }

    /// Number of times the user function has run.
    pub fn run_count(&self) -> usize {
        self.inner.runs.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.tracker.is_dirty(self.inner.id)
    }

    /// Stop watching and drop every subscription.
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

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<String> = self
            .inner
            .entries
            .borrow()
            .iter()
            .map(|e| e.path.to_string())
            .collect();
        f.debug_struct("Monitor")
            .field("id", &self.inner.id)
            .field("paths", &paths)
            .field("run_count", &self.run_count())
            .finish()
    }
}
