//! Error types for the reactive core.
//!
//! Only two kinds of failure ever reach the host as an `Err`: writes that
//! the engine refuses (the value is left untouched) and failures of user
//! supplied functions. Everything else is recoverable and is reported
//! through the tracker's diagnostics channel instead.

use std::error::Error as StdError;

use thiserror::Error;

use crate::observe::ValueKind;
use crate::reactive::{CellId, ConsumerId};

/// Error returned by user supplied functions (render functions, monitor
/// callbacks, item generators).
pub type UserError = Box<dyn StdError + 'static>;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A deep cell (or a tracked property) was given a value it cannot observe.
    #[error("cell {cell:?} cannot hold a value of kind {kind:?}")]
    UnsupportedValueKind { cell: CellId, kind: ValueKind },

    /// An observed wrapper is already attached to another owner.
    #[error("observed value {object} is already owned by cell {owner:?}")]
    AlreadyOwned { object: u64, owner: CellId },

    /// A monitored path crosses a property that is neither deep observed nor traced.
    #[error("path `{path}` is not monitorable at segment `{segment}`")]
    UnmonitorableProperty { path: String, segment: String },

    /// A monitored path no longer resolves.
    #[error("path `{path}` does not resolve")]
    PathNotFound { path: String },

    /// A path string is empty or contains an empty segment.
    #[error("invalid property path `{path}`")]
    InvalidPath { path: String },

    /// Two items of one reconciliation pass produced the same key.
    #[error("duplicate key `{key}` at index {duplicate} (first seen at {first})")]
    DuplicateKey {
        key: String,
        first: usize,
        duplicate: usize,
    },

    /// A user supplied function failed. Bookkeeping has completed.
    #[error("user function of consumer {consumer:?} failed: {source}")]
    UserFunctionException {
        consumer: ConsumerId,
        #[source]
        source: UserError,
    },

    /// An array write landed too far past the end to pad.
    #[error("index {index} is too far past the end of an array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// `Repeat::render` was called while a render was already in progress.
    #[error("reconciler render re-entered while {state}")]
    ReentrantRender { state: &'static str },

    /// `Tracker::flush` kept producing dirty consumers.
    #[error("flush did not settle after {rounds} rounds")]
    FlushLimitExceeded { rounds: usize },

    /// The tracker was disposed and no longer accepts consumers.
    #[error("tracker has been disposed")]
    TrackerDisposed,

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Diagnostics could not be encoded for the host bridge.
    #[error("encoding failed: {0}")]
    Encode(String),
}

impl ReactiveError {
    /// Wrap a user error for the given consumer.
    pub fn user(consumer: ConsumerId, source: UserError) -> Self {
        Self::UserFunctionException { consumer, source }
    }

    /// Whether the host must treat this error as fatal for the current tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UserFunctionException { .. } | Self::FlushLimitExceeded { .. }
        )
    }
}

impl From<rmp_serde::encode::Error> for ReactiveError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<serde_json::Error> for ReactiveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
