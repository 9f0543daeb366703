//! Identifiers and the consumer trait.
//!
//! A consumer is anything that reads cells inside a recording phase and
//! wants to hear about later writes: render units, computed values and
//! monitors.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use smallvec::SmallVec;

use crate::error::Result;

/// Unique identifier for a consumer.
///
/// Ids come from a process-wide counter and are taken when the consumer is
/// constructed, so ascending id order is registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConsumerId(u64);

impl ConsumerId {
    /// Generate a new unique consumer ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a state slot: a cell, an observed object property,
/// an object's shape or an observed array's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CellId(u64);

impl CellId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

/// Which of a consumer's read phases a subscription belongs to.
///
/// Monitors open one read phase per watched path; every other consumer uses
/// [`PathId::ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PathId(u32);

impl PathId {
    pub const ROOT: PathId = PathId(0);

    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Paths through which one consumer subscribed to one cell.
pub type PathSet = SmallVec<[PathId; 2]>;

/// One consumer to notify for a write, with every path it read the cell through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub consumer: ConsumerId,
    pub paths: PathSet,
}

/// The kind of consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConsumerKind {
    /// Re-renders when drained. Queued on change.
    RenderUnit,
    /// Recomputes synchronously on change. Never queued.
    Computed,
    /// Re-evaluates the changed paths; queued only when one became dirty.
    Monitor,
}

/// A computation that can be notified when cells it read change.
pub trait Consumer {
    /// The consumer's id.
    fn consumer_id(&self) -> ConsumerId;

    /// What kind of consumer this is.
    fn kind(&self) -> ConsumerKind;

    /// One or more cells read through `paths` changed.
    ///
    /// Returns whether the consumer wants to be queued for [`Consumer::run`].
    fn on_notify(&self, paths: &[PathId]) -> bool;

    /// Run queued work. Called at most once per drain.
    fn run(&self) -> Result<()>;
}
