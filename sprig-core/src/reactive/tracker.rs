//! Dependency Tracker
//!
//! The tracker is the central coordinator that connects cells and the
//! consumers that read them. It records dependencies during read phases,
//! routes writes to the dependent consumers and holds the dirty queue the
//! host drains once per tick.
//!
//! # How It Works
//!
//! 1. A consumer registers with the tracker (a weak reference; the tracker
//!    never keeps a consumer alive).
//!
//! 2. While the consumer runs, a recording frame for it sits on top of the
//!    stack. Every cell read calls `record_read`, which adds the pair to
//!    both the consumer's and the cell's index.
//!
//! 3. Before a fresh read phase the consumer's old subscriptions are
//!    cleared, so after the phase they equal exactly what was read.
//!
//! 4. When a cell changes, `notify` snapshots its subscribers and
//!    `dispatch` hands each of them the paths it read the cell through.
//!    Consumers that subscribe while handling a dispatch are not part of
//!    that snapshot.
//!
//! # Threading
//!
//! A tracker is single threaded (`Rc`/`RefCell`). No borrow of the
//! tracker's state is held while consumer code runs, so consumers may read
//! and write cells freely from inside callbacks.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::consumer::{CellId, Consumer, ConsumerId, ConsumerKind, Notification, PathId, PathSet};
use super::context::{Frame, RecordingGuard, RecordingStack};
use super::scheduler::{DirtyQueue, DrainDirty, FlushStats};
use crate::config::RuntimeConfig;
use crate::diagnostics::Diagnostic;
use crate::error::{ReactiveError, Result};

type DiagnosticSink = Rc<dyn Fn(&Diagnostic)>;

struct Registration {
    consumer: Weak<dyn Consumer>,
    kind: ConsumerKind,
}

#[derive(Default)]
struct TrackerState {
    /// Live consumers, in registration order.
    registry: IndexMap<ConsumerId, Registration>,
    /// Consumer -> cells it read, with the paths it read them through.
    reads: HashMap<ConsumerId, IndexMap<CellId, PathSet>>,
    /// Cell -> consumers that read it.
    subscribers: HashMap<CellId, IndexMap<ConsumerId, PathSet>>,
}

struct TrackerInner {
    config: RuntimeConfig,
    state: RefCell<TrackerState>,
    stack: RefCell<RecordingStack>,
    dirty: RefCell<DirtyQueue>,
    diagnostics: RefCell<Vec<Diagnostic>>,
    sink: RefCell<Option<DiagnosticSink>>,
    disposed: Cell<bool>,
}

/// Handle to a dependency tracker.
///
/// Cloning the handle shares the tracker. There is no global instance: each
/// runtime (and each test) constructs its own.
#[derive(Clone)]
pub struct Tracker {
    inner: Rc<TrackerInner>,
}

impl Tracker {
    /// Create a tracker with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a tracker with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(TrackerInner {
                config,
                state: RefCell::new(TrackerState::default()),
                stack: RefCell::new(RecordingStack::default()),
                dirty: RefCell::new(DirtyQueue::default()),
                diagnostics: RefCell::new(Vec::new()),
                sink: RefCell::new(None),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Whether two handles refer to the same tracker.
    pub fn ptr_eq(&self, other: &Tracker) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a consumer.
    pub fn register(
        &self,
        id: ConsumerId,
        kind: ConsumerKind,
        consumer: Weak<dyn Consumer>,
    ) -> Result<()> {
        if self.is_disposed() {
            return Err(ReactiveError::TrackerDisposed);
        }
        self.inner
            .state
            .borrow_mut()
            .registry
            .insert(id, Registration { consumer, kind });
        tracing::trace!(consumer = id.raw(), ?kind, "registered consumer");
        Ok(())
    }

    /// Unregister a consumer, dropping all of its subscriptions and any
    /// pending dirty mark.
    pub fn unregister(&self, id: ConsumerId) {
        let removed = self.inner.state.borrow_mut().registry.shift_remove(&id);
        self.clear(id);
        self.inner.dirty.borrow_mut().remove(id);
        if removed.is_some() {
            tracing::trace!(consumer = id.raw(), "unregistered consumer");
        }
    }

    pub fn is_registered(&self, id: ConsumerId) -> bool {
        self.inner.state.borrow().registry.contains_key(&id)
    }

    /// Kind of a registered consumer.
    pub fn consumer_kind(&self, id: ConsumerId) -> Option<ConsumerKind> {
        self.inner.state.borrow().registry.get(&id).map(|r| r.kind)
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.state.borrow().registry.len()
    }

    fn lookup(&self, id: ConsumerId) -> Option<Rc<dyn Consumer>> {
        self.inner
            .state
            .borrow()
            .registry
            .get(&id)
            .and_then(|r| r.consumer.upgrade())
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Open a recording frame. Must be paired with [`Tracker::end_recording`].
    pub fn begin_recording(&self, consumer: ConsumerId, path: PathId) {
        self.inner
            .stack
            .borrow_mut()
            .push(Frame::Record { consumer, path });
    }

    /// Close the innermost frame and return it.
    pub fn end_recording(&self) -> Option<Frame> {
        self.inner.stack.borrow_mut().pop()
    }

    /// Open a recording frame that closes when the guard is dropped.
    pub fn record(&self, consumer: ConsumerId, path: PathId) -> RecordingGuard {
        let frame = Frame::Record { consumer, path };
        self.inner.stack.borrow_mut().push(frame);
        RecordingGuard::new(self.clone(), frame)
    }

    /// Run `f` with reads not attributed to anyone.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.stack.borrow_mut().push(Frame::Untracked);
        let _guard = RecordingGuard::new(self.clone(), Frame::Untracked);
        f()
    }

    /// The consumer reads are currently attributed to, if any.
    pub fn current_consumer(&self) -> Option<ConsumerId> {
        self.current_frame().map(|(consumer, _)| consumer)
    }

    pub fn current_frame(&self) -> Option<(ConsumerId, PathId)> {
        self.inner.stack.borrow().current()
    }

    /// Whether reads are currently being attributed.
    pub fn is_recording(&self) -> bool {
        self.current_frame().is_some()
    }

    pub fn recording_depth(&self) -> usize {
        self.inner.stack.borrow().depth()
    }

    /// Record a read of `cell` by the innermost recording frame, if any.
    pub fn record_read(&self, cell: CellId) {
        if let Some((consumer, path)) = self.current_frame() {
            self.record_read_for(consumer, path, cell);
        }
    }

    /// Record that `consumer` read `cell` through `path`. Idempotent.
    pub fn record_read_for(&self, consumer: ConsumerId, path: PathId, cell: CellId) {
        if self.is_disposed() {
            return;
        }
        let mut state = self.inner.state.borrow_mut();

        let paths = state
            .reads
            .entry(consumer)
            .or_default()
            .entry(cell)
            .or_default();
        if paths.contains(&path) {
            return;
        }
        paths.push(path);

        let paths = state
            .subscribers
            .entry(cell)
            .or_default()
            .entry(consumer)
            .or_default();
        paths.push(path);

        tracing::trace!(consumer = consumer.raw(), cell = cell.raw(), path = path.index(), "recorded read");
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Remove every subscription held by `consumer`.
    pub fn clear(&self, consumer: ConsumerId) {
        let mut state = self.inner.state.borrow_mut();
        let Some(cells) = state.reads.remove(&consumer) else {
            return;
        };
        for cell in cells.keys() {
            if let Some(subs) = state.subscribers.get_mut(cell) {
                subs.shift_remove(&consumer);
                if subs.is_empty() {
                    state.subscribers.remove(cell);
                }
            }
        }
    }

    /// Remove the subscriptions `consumer` holds through `path` only.
    pub fn clear_path(&self, consumer: ConsumerId, path: PathId) {
        let mut state = self.inner.state.borrow_mut();
        let TrackerState {
            reads, subscribers, ..
        } = &mut *state;
        let Some(cells) = reads.get_mut(&consumer) else {
            return;
        };

        cells.retain(|cell, paths| {
            paths.retain(|p| *p != path);
            if let Some(subs) = subscribers.get_mut(cell) {
                if paths.is_empty() {
                    subs.shift_remove(&consumer);
                    if subs.is_empty() {
                        subscribers.remove(cell);
                    }
                } else if let Some(sub_paths) = subs.get_mut(&consumer) {
                    sub_paths.retain(|p| *p != path);
                }
            }
            !paths.is_empty()
        });

        if cells.is_empty() {
            reads.remove(&consumer);
        }
    }

    /// Drop every subscription to `cell`. Called when the cell goes away.
    pub fn forget_cell(&self, cell: CellId) {
        let mut state = self.inner.state.borrow_mut();
        let Some(subs) = state.subscribers.remove(&cell) else {
            return;
        };
        for consumer in subs.keys() {
            if let Some(cells) = state.reads.get_mut(consumer) {
                cells.shift_remove(&cell);
                if cells.is_empty() {
                    state.reads.remove(consumer);
                }
            }
        }
    }

    /// Number of consumers subscribed to `cell`.
    pub fn subscriber_count(&self, cell: CellId) -> usize {
        self.inner
            .state
            .borrow()
            .subscribers
            .get(&cell)
            .map_or(0, |subs| subs.len())
    }

    /// Number of cells `consumer` is subscribed to.
    pub fn dependency_count(&self, consumer: ConsumerId) -> usize {
        self.inner
            .state
            .borrow()
            .reads
            .get(&consumer)
            .map_or(0, |cells| cells.len())
    }

    pub fn is_subscribed(&self, consumer: ConsumerId, cell: CellId) -> bool {
        self.inner
            .state
            .borrow()
            .reads
            .get(&consumer)
            .is_some_and(|cells| cells.contains_key(&cell))
    }

    // ------------------------------------------------------------------
    // Notification
    // ------------------------------------------------------------------

    /// The consumers subscribed to `cell`, each once, in registration order.
    ///
    /// Does not run anything.
    pub fn notify(&self, cell: CellId) -> Vec<Notification> {
        if self.is_disposed() {
            return Vec::new();
        }
        let state = self.inner.state.borrow();
        let Some(subs) = state.subscribers.get(&cell) else {
            return Vec::new();
        };
        let mut out: Vec<Notification> = subs
            .iter()
            .map(|(consumer, paths)| Notification {
                consumer: *consumer,
                paths: paths.clone(),
            })
            .collect();
        out.sort_by_key(|n| n.consumer);
        out
    }

    /// Deliver notifications to live consumers. Returns how many consumers
    /// were newly queued.
    pub fn dispatch(&self, notifications: Vec<Notification>) -> usize {
        let mut queued = 0;
        for notification in notifications {
            // Looked up one at a time: an earlier consumer may have
            // destroyed a later one.
            let Some(consumer) = self.lookup(notification.consumer) else {
                continue;
            };
            if consumer.on_notify(&notification.paths) && self.mark_dirty(notification.consumer)
            {
                queued += 1;
            }
        }
        queued
    }

    /// Notify and dispatch in one step: the write path of every cell.
    pub fn changed(&self, cell: CellId) -> usize {
        let notifications = self.notify(cell);
        if notifications.is_empty() {
            return 0;
        }
        tracing::trace!(cell = cell.raw(), consumers = notifications.len(), "cell changed");
        self.dispatch(notifications)
    }

    // ------------------------------------------------------------------
    // Dirty queue
    // ------------------------------------------------------------------

    /// Queue a consumer for the end of the tick. Returns false if it was
    /// already queued, is not registered, or the tracker is disposed.
    pub fn mark_dirty(&self, consumer: ConsumerId) -> bool {
        if self.is_disposed() || !self.is_registered(consumer) {
            return false;
        }
        self.inner.dirty.borrow_mut().mark(consumer)
    }

    pub fn is_dirty(&self, consumer: ConsumerId) -> bool {
        self.inner.dirty.borrow().contains(consumer)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.dirty.borrow().len()
    }

    /// Take the consumers queued this tick, deduplicated, in registration order.
    pub fn drain_dirty(&self) -> DrainDirty {
        self.inner.dirty.borrow_mut().drain()
    }

    /// Run one consumer if it is still alive. Returns whether it ran.
    pub fn run_consumer(&self, consumer: ConsumerId) -> Result<bool> {
        match self.lookup(consumer) {
            Some(c) => c.run().map(|()| true),
            None => Ok(false),
        }
    }

    /// Drain and run dirty consumers until the queue stays empty.
    ///
    /// If a consumer fails, the consumers of the same round that did not run
    /// yet are queued again and the error is returned.
    pub fn flush(&self) -> Result<FlushStats> {
        let mut stats = FlushStats::default();
        let max_rounds = self.inner.config.max_flush_rounds;

        loop {
            let batch: Vec<ConsumerId> = self.drain_dirty().collect();
            if batch.is_empty() {
                tracing::debug!(rounds = stats.rounds, runs = stats.runs, "flush settled");
                return Ok(stats);
            }
            if stats.rounds == max_rounds {
                let mut dirty = self.inner.dirty.borrow_mut();
                for id in batch {
                    dirty.mark(id);
                }
                return Err(ReactiveError::FlushLimitExceeded { rounds: max_rounds });
            }
            stats.rounds += 1;

            for (position, id) in batch.iter().enumerate() {
                match self.run_consumer(*id) {
                    Ok(true) => stats.runs += 1,
                    Ok(false) => {}
                    Err(err) => {
                        for rest in &batch[position + 1..] {
                            self.mark_dirty(*rest);
                        }
                        return Err(err);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Report a recoverable condition.
    pub fn report(&self, diagnostic: Diagnostic) {
        diagnostic.log();
        let sink = self.inner.sink.borrow().clone();
        if let Some(sink) = sink {
            sink(&diagnostic);
        }
        if self.inner.config.record_diagnostics {
            self.inner.diagnostics.borrow_mut().push(diagnostic);
        }
    }

    /// Install a callback that sees every diagnostic as it is reported.
    pub fn set_diagnostic_sink(&self, sink: impl Fn(&Diagnostic) + 'static) {
        *self.inner.sink.borrow_mut() = Some(Rc::new(sink));
    }

    /// Take the buffered diagnostics.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.inner.diagnostics.borrow_mut())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Tear the tracker down. All subscriptions, registrations, frames and
    /// pending dirty marks are dropped; later recording and notification
    /// are no-ops.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let consumers = {
            let mut state = self.inner.state.borrow_mut();
            let count = state.registry.len();
            *state = TrackerState::default();
            count
        };
        self.inner.stack.borrow_mut().clear();
        self.inner.dirty.borrow_mut().clear();
        tracing::debug!(consumers, "tracker disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Tracker")
            .field("consumers", &state.registry.len())
            .field("cells", &state.subscribers.len())
            .field("pending", &self.inner.dirty.borrow().len())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct MockConsumer {
        id: ConsumerId,
        kind: ConsumerKind,
        notified: Cell<usize>,
        runs: Cell<usize>,
        last_paths: RefCell<Vec<PathId>>,
        fail: Cell<bool>,
    }

    impl MockConsumer {
        fn new(tracker: &Tracker, kind: ConsumerKind) -> Rc<Self> {
            let mock = Rc::new(Self {
                id: ConsumerId::new(),
                kind,
                notified: Cell::new(0),
                runs: Cell::new(0),
                last_paths: RefCell::new(Vec::new()),
                fail: Cell::new(false),
            });
            let weak: Weak<dyn Consumer> = Rc::downgrade(&mock) as Weak<dyn Consumer>;
            tracker.register(mock.id, kind, weak).unwrap();
            mock
        }
    }

    impl Consumer for MockConsumer {
        fn consumer_id(&self) -> ConsumerId {
            self.id
        }

        fn kind(&self) -> ConsumerKind {
            self.kind
        }

        fn on_notify(&self, paths: &[PathId]) -> bool {
            self.notified.set(self.notified.get() + 1);
            *self.last_paths.borrow_mut() = paths.to_vec();
            self.kind != ConsumerKind::Computed
        }

        fn run(&self) -> Result<()> {
            self.runs.set(self.runs.get() + 1);
            if self.fail.get() {
                return Err(ReactiveError::user(self.id, "mock failure".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn record_read_is_idempotent_and_bidirectional() {
        let tracker = Tracker::new();
        let consumer = ConsumerId::new();
        let cell = CellId::new();

        tracker.record_read_for(consumer, PathId::ROOT, cell);
        tracker.record_read_for(consumer, PathId::ROOT, cell);

        assert_eq!(tracker.subscriber_count(cell), 1);
        assert_eq!(tracker.dependency_count(consumer), 1);
        assert_eq!(tracker.notify(cell).len(), 1);
    }

    #[test]
    fn reads_attribute_to_innermost_frame() {
        let tracker = Tracker::new();
        let outer = ConsumerId::new();
        let inner = ConsumerId::new();
        let a = CellId::new();
        let b = CellId::new();

        tracker.begin_recording(outer, PathId::ROOT);
        tracker.record_read(a);
        tracker.begin_recording(inner, PathId::ROOT);
        tracker.record_read(b);
        tracker.end_recording();
        tracker.end_recording();

        assert!(tracker.is_subscribed(outer, a));
        assert!(!tracker.is_subscribed(outer, b));
        assert!(tracker.is_subscribed(inner, b));
        assert!(!tracker.is_subscribed(inner, a));
    }

    #[test]
    fn untracked_reads_are_not_recorded() {
        let tracker = Tracker::new();
        let consumer = ConsumerId::new();
        let cell = CellId::new();

        let _guard = tracker.record(consumer, PathId::ROOT);
        tracker.untracked(|| tracker.record_read(cell));
        assert_eq!(tracker.dependency_count(consumer), 0);
    }

    #[test]
    fn notify_dedupes_by_consumer_and_keeps_paths() {
        let tracker = Tracker::new();
        let consumer = ConsumerId::new();
        let cell = CellId::new();

        tracker.record_read_for(consumer, PathId::new(1), cell);
        tracker.record_read_for(consumer, PathId::new(2), cell);

        let notifications = tracker.notify(cell);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].paths.as_slice(), &[PathId::new(1), PathId::new(2)]);
    }

    #[test]
    fn clear_removes_every_subscription() {
        let tracker = Tracker::new();
        let consumer = ConsumerId::new();
        let a = CellId::new();
        let b = CellId::new();

        tracker.record_read_for(consumer, PathId::ROOT, a);
        tracker.record_read_for(consumer, PathId::ROOT, b);
        tracker.clear(consumer);

        assert_eq!(tracker.subscriber_count(a), 0);
        assert_eq!(tracker.subscriber_count(b), 0);
        assert_eq!(tracker.dependency_count(consumer), 0);
    }

    #[test]
    fn clear_path_keeps_other_paths() {
        let tracker = Tracker::new();
        let consumer = ConsumerId::new();
        let shared = CellId::new();
        let only_first = CellId::new();

        tracker.record_read_for(consumer, PathId::new(1), shared);
        tracker.record_read_for(consumer, PathId::new(1), only_first);
        tracker.record_read_for(consumer, PathId::new(2), shared);

        tracker.clear_path(consumer, PathId::new(1));

        assert!(!tracker.is_subscribed(consumer, only_first));
        let notifications = tracker.notify(shared);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].paths.as_slice(), &[PathId::new(2)]);
    }

    #[test]
    fn forget_cell_drops_back_references() {
        let tracker = Tracker::new();
        let consumer = ConsumerId::new();
        let cell = CellId::new();

        tracker.record_read_for(consumer, PathId::ROOT, cell);
        tracker.forget_cell(cell);

        assert_eq!(tracker.dependency_count(consumer), 0);
        assert!(tracker.notify(cell).is_empty());
    }

    #[test]
    fn dispatch_queues_eager_consumers_only() {
        let tracker = Tracker::new();
        let unit = MockConsumer::new(&tracker, ConsumerKind::RenderUnit);
        let computed = MockConsumer::new(&tracker, ConsumerKind::Computed);
        let cell = CellId::new();

        tracker.record_read_for(unit.id, PathId::ROOT, cell);
        tracker.record_read_for(computed.id, PathId::ROOT, cell);

        assert_eq!(tracker.changed(cell), 1);
        assert_eq!(unit.notified.get(), 1);
        assert_eq!(computed.notified.get(), 1);
        assert!(tracker.is_dirty(unit.id));
        assert!(!tracker.is_dirty(computed.id));
    }

    #[test]
    fn unregister_cancels_pending_run() {
        let tracker = Tracker::new();
        let unit = MockConsumer::new(&tracker, ConsumerKind::RenderUnit);

        tracker.mark_dirty(unit.id);
        tracker.unregister(unit.id);

        assert_eq!(tracker.drain_dirty().count(), 0);
        assert!(!tracker.mark_dirty(unit.id));
    }

    #[test]
    fn dropped_consumer_is_skipped() {
        let tracker = Tracker::new();
        let unit = MockConsumer::new(&tracker, ConsumerKind::RenderUnit);
        let id = unit.id;
        let cell = CellId::new();
        tracker.record_read_for(id, PathId::ROOT, cell);
        drop(unit);

        assert_eq!(tracker.changed(cell), 0);
        assert!(!tracker.run_consumer(id).unwrap());
    }

    #[test]
    fn flush_runs_each_dirty_consumer_once() {
        let tracker = Tracker::new();
        let a = MockConsumer::new(&tracker, ConsumerKind::RenderUnit);
        let b = MockConsumer::new(&tracker, ConsumerKind::Monitor);

        tracker.mark_dirty(b.id);
        tracker.mark_dirty(a.id);
        tracker.mark_dirty(a.id);

        let stats = tracker.flush().unwrap();
        assert_eq!(stats, FlushStats { rounds: 1, runs: 2 });
        assert_eq!(a.runs.get(), 1);
        assert_eq!(b.runs.get(), 1);
    }

    #[test]
    fn flush_error_requeues_the_rest() {
        let tracker = Tracker::new();
        let failing = MockConsumer::new(&tracker, ConsumerKind::RenderUnit);
        let later = MockConsumer::new(&tracker, ConsumerKind::RenderUnit);
        failing.fail.set(true);

        tracker.mark_dirty(failing.id);
        tracker.mark_dirty(later.id);

        let err = tracker.flush().unwrap_err();
        assert!(matches!(err, ReactiveError::UserFunctionException { .. }));
        assert_eq!(later.runs.get(), 0);
        assert!(tracker.is_dirty(later.id));
    }

    #[test]
    fn diagnostics_are_buffered_and_sunk() {
        let tracker = Tracker::new();
        let seen = Rc::new(Cell::new(0));
        let seen_clone = seen.clone();
        tracker.set_diagnostic_sink(move |_| seen_clone.set(seen_clone.get() + 1));

        tracker.report(Diagnostic::PathNotFound {
            monitor: ConsumerId::new(),
            path: "a".to_string(),
        });

        assert_eq!(seen.get(), 1);
        assert_eq!(tracker.take_diagnostics().len(), 1);
        assert!(tracker.take_diagnostics().is_empty());
    }

    #[test]
    fn dispose_tears_everything_down() {
        let tracker = Tracker::new();
        let unit = MockConsumer::new(&tracker, ConsumerKind::RenderUnit);
        let cell = CellId::new();
        tracker.record_read_for(unit.id, PathId::ROOT, cell);
        tracker.mark_dirty(unit.id);

        tracker.dispose();

        assert!(tracker.is_disposed());
        assert_eq!(tracker.subscriber_count(cell), 0);
        assert_eq!(tracker.pending_count(), 0);
        assert!(!tracker.is_registered(unit.id));
        tracker.record_read_for(unit.id, PathId::ROOT, cell);
        assert_eq!(tracker.subscriber_count(cell), 0);

        let weak: Weak<dyn Consumer> = Rc::downgrade(&unit) as Weak<dyn Consumer>;
        assert!(matches!(
            tracker.register(unit.id, ConsumerKind::RenderUnit, weak),
            Err(ReactiveError::TrackerDisposed)
        ));
    }
}
