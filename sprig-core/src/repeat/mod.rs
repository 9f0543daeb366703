//! Keyed Reconciler
//!
//! [`Repeat`] maps a source sequence onto units with stable identities.
//! Units are created, updated and destroyed through a [`UnitHost`]; the
//! reconciler decides which of the three each item needs.
//!
//! # Concepts
//!
//! ## Keys
//!
//! Every item gets a key, from the key function or from the default
//! `"{index}__{structural}"` (see [`default_key`]). A retained key keeps
//! its unit; only its item and index cells are written.
//!
//! ## Templates
//!
//! A template is an alternate item generator selected per item by tag.
//! Each template has a bounded cache of retired units that new items of
//! the same template reuse before the host is asked to create one.
//!
//! ## Virtual scrolling
//!
//! In windowed mode only the items inside the visible range hold units.
//! Scrolling retires the units that leave the window and creates (or
//! reuses) units for those that enter it.

mod cache;
mod item;
mod key;
mod options;
mod reconciler;

pub use item::RepeatItem;
pub use key::{default_key, IdentityKeys, StructuralKey};
pub use options::{TemplateOptions, VirtualScrollOptions};
pub use reconciler::{
    MoveEvent, ReconcileState, RenderSummary, Repeat, UnitHost, DEFAULT_TEMPLATE,
};
