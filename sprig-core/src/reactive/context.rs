//! Recording Context
//!
//! A recording context says which consumer the current reads belong to.
//! Each tracker owns a stack of frames: entering a render function, a
//! computed value or a monitor path pushes a frame, leaving it pops.
//!
//! # Implementation
//!
//! Reads are attributed to the innermost frame only. An `Untracked` frame
//! masks everything below it, which is how untracked reads inside a
//! recording phase are expressed.
//!
//! This design supports nested contexts (e.g. a render function that
//! creates a child render unit which renders immediately).

use super::consumer::{ConsumerId, PathId};
use super::tracker::Tracker;

/// An entry in the recording stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Reads are attributed to `consumer` through `path`.
    Record { consumer: ConsumerId, path: PathId },
    /// Reads are not attributed to anyone.
    Untracked,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingStack {
    frames: Vec<Frame>,
}

impl RecordingStack {
    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// The consumer and path reads are currently attributed to, if any.
    pub(crate) fn current(&self) -> Option<(ConsumerId, PathId)> {
        match self.frames.last()? {
            Frame::Record { consumer, path } => Some((*consumer, *path)),
            Frame::Untracked => None,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Guard that pops its frame when dropped.
///
/// This keeps the stack balanced even if the computation panics or
/// returns early with `?`.
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct RecordingGuard {
    tracker: Tracker,
    frame: Frame,
}

impl RecordingGuard {
    pub(crate) fn new(tracker: Tracker, frame: Frame) -> Self {
        Self { tracker, frame }
    }

    /// The frame this guard pushed.
    pub fn frame(&self) -> Frame {
        self.frame
    }
}

impl Drop for RecordingGuard {
    fn drop(&mut self) {
        let popped = self.tracker.end_recording();

        // A disposed tracker has already cleared its stack.
        if let Some(frame) = popped {
            debug_assert_eq!(
                frame, self.frame,
                "recording frame mismatch: expected {:?}, got {:?}",
                self.frame, frame
            );
        }
    }
}
