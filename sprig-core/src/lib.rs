//! Sprig Core
//!
//! This crate provides the core runtime for the Sprig declarative UI
//! state-management engine. It implements:
//!
//! - Reactive primitives (state cells, computed values, render units)
//! - Deep observed objects and arrays with property-level read tracking
//! - Monitors that watch property paths and report before/after values
//! - A keyed list reconciler with templates, reuse caches and virtual
//!   scrolling
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: state cells, the dependency tracker and its consumers
//! - `observe`: observed values and property path resolution
//! - `monitor`: path watchers with dirty-path analysis
//! - `repeat`: stable-identity list reconciliation
//! - `config`, `diagnostics`, `error`: the ambient runtime surface
//!
//! Everything is single threaded. A host owns one [`Tracker`], drives
//! writes from its event handlers and drains the dirty queue once per tick.
//!
//! # Example
//!
//! ```rust,ignore
//! use sprig_core::{RenderUnit, StateCell, Tracker};
//!
//! let tracker = Tracker::new();
//!
//! // Create a cell
//! let count = StateCell::new(&tracker, 0);
//!
//! // Render whenever it changes
//! let reader = count.clone();
//! let unit = RenderUnit::new(&tracker, move || {
//!     println!("Count: {}", reader.read());
//! })?;
//!
//! // Update the cell, then drain the tick
//! count.write(5)?;
//! tracker.flush()?;
//! // Prints: "Count: 5"
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod monitor;
pub mod observe;
pub mod reactive;
pub mod repeat;

pub use config::RuntimeConfig;
pub use diagnostics::Diagnostic;
pub use error::{ReactiveError, Result, UserError};
pub use monitor::{Monitor, MonitorChange, MonitorEvent, MonitorValue};
pub use observe::{ObservedArray, ObservedObject, PropertyPath, Value, ValueKind};
pub use reactive::{
    CellId, CellValue, Computed, ConsumerId, FlushStats, PathId, RenderUnit, StateCell, Tracker,
};
pub use repeat::{
    MoveEvent, RenderSummary, Repeat, RepeatItem, TemplateOptions, UnitHost, VirtualScrollOptions,
};
