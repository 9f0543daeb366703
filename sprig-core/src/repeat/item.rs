use std::fmt;

use crate::reactive::{CellValue, StateCell, Tracker};

/// The item and index a repeated unit renders.
///
/// Both live in state cells, so a child render function that reads
/// [`item`](Self::item) or [`index`](Self::index) re-renders when the
/// reconciler updates them in place. Cloning shares the cells.
#[derive(Clone)]
pub struct RepeatItem<T: CellValue> {
    key: String,
    item: StateCell<T>,
    index: StateCell<usize>,
}

impl<T: CellValue> RepeatItem<T> {
    pub(crate) fn new(tracker: &Tracker, key: String, item: T, index: usize) -> Self {
        Self {
            key,
            item: StateCell::new(tracker, item),
            index: StateCell::new(tracker, index),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The item, recording a read.
    pub fn item(&self) -> T {
        self.item.read()
    }

    /// The index in the source sequence, recording a read.
    pub fn index(&self) -> usize {
        self.index.read()
    }

    pub fn peek_item(&self) -> T {
        self.item.peek()
    }

    pub fn peek_index(&self) -> usize {
        self.index.peek()
    }

    pub fn item_cell(&self) -> &StateCell<T> {
        &self.item
    }

    pub fn index_cell(&self) -> &StateCell<usize> {
        &self.index
    }

    /// Write both cells. Returns whether either changed.
    pub(crate) fn set(&self, item: T, index: usize) -> bool {
        // Shallow cells accept every value.
        let item_changed = matches!(self.item.write(item), Ok(true));
        let index_changed = matches!(self.index.write(index), Ok(true));
        item_changed || index_changed
    }
}

impl<T: CellValue + fmt::Debug> fmt::Debug for RepeatItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatItem")
            .field("key", &self.key)
            .field("item", &self.peek_item())
            .field("index", &self.peek_index())
            .finish()
    }
}
