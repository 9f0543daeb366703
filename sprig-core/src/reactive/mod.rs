//! Reactive Primitives
//!
//! This module implements the core reactive system: state cells, the
//! dependency tracker, and the consumers that read cells (render units and
//! computed values; monitors live in [`crate::monitor`]).
//!
//! # Concepts
//!
//! ## State Cells
//!
//! A [`StateCell`] is a container for mutable state. When its value is read
//! inside a recording frame, the frame's consumer is subscribed. When the
//! value changes, every subscriber is notified once.
//!
//! ## Tracker
//!
//! The [`Tracker`] is an explicit, constructible registry. It owns the
//! recording stack, both subscription indices and the dirty queue. Nothing
//! in the crate reaches for a global instance.
//!
//! ## Consumers
//!
//! - [`RenderUnit`]: re-renders once per drain of the dirty queue.
//! - [`Computed`]: recomputes synchronously and forwards real changes only.
//! - [`crate::monitor::Monitor`]: re-evaluates the paths that changed and
//!   runs its callback when one of them is dirty.
//!
//! # Implementation Notes
//!
//! Dependencies are detected automatically: a read checks the innermost
//! recording frame and, if it belongs to a consumer, records the pair.

mod cell;
mod computed;
mod consumer;
mod context;
mod render;
mod scheduler;
mod tracker;

pub use cell::{CellValue, Observation, StateCell};
pub use computed::Computed;
pub use consumer::{CellId, Consumer, ConsumerId, ConsumerKind, Notification, PathId, PathSet};
pub use context::{Frame, RecordingGuard};
pub use render::RenderUnit;
pub use scheduler::{DrainDirty, FlushStats};
pub use tracker::Tracker;
