//! Observed Values
//!
//! This module is the object-wrapper provider of the engine. Deep cells
//! hold [`Value`]s; object and array values are wrapped in
//! [`ObservedObject`] and [`ObservedArray`], whose reads are attributed to
//! the current recording frame at property granularity.
//!
//! # Ownership
//!
//! A wrapper becomes observable once it is attached to an owner: a deep
//! cell, a property slot of an attached object, or an attached array. The
//! owner link carries the tracker that reads are reported to. A wrapper has
//! at most one owner. When the owning slot is overwritten the old wrapper
//! is detached: its link is cleared and every subscription to its slots is
//! removed from the tracker, recursively.
//!
//! # Paths
//!
//! [`PropertyAccessible`] is the closed capability the path resolver walks.
//! Monitors resolve dotted paths through [`resolve`].

mod array;
mod object;
mod path;
mod value;

pub use array::ObservedArray;
pub use object::ObservedObject;
pub use path::{resolve, PropertyAccessible, PropertyKind, PropertyPath, Resolution};
pub use value::{Value, ValueKind, WeakIdentity};

use crate::reactive::{CellId, Tracker};

/// Link from an attached wrapper to the slot that owns it.
#[derive(Clone, Debug)]
pub struct Owner {
    cell: CellId,
    tracker: Tracker,
}

impl Owner {
    pub fn new(cell: CellId, tracker: Tracker) -> Self {
        Self { cell, tracker }
    }

    /// The owning slot.
    pub fn cell(&self) -> CellId {
        self.cell
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// A link for a child slot, reporting to the same tracker.
    pub(crate) fn child(&self, cell: CellId) -> Owner {
        Owner {
            cell,
            tracker: self.tracker.clone(),
        }
    }

    pub(crate) fn same_as(&self, other: &Owner) -> bool {
        self.cell == other.cell && self.tracker.ptr_eq(&other.tracker)
    }
}
