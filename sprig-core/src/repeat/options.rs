//! Options for templates and virtual scrolling.
//!
//! Field names follow the host's option objects (`cachedCount`,
//! `totalCount`) so they deserialize from the same JSON.

use serde::{Deserialize, Serialize};

/// Options of one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplateOptions {
    /// How many retired units of this template are kept for reuse. `None`
    /// uses the runtime's `default_cached_count`.
    pub cached_count: Option<usize>,
}

impl TemplateOptions {
    pub fn cached(count: usize) -> Self {
        Self {
            cached_count: Some(count),
        }
    }
}

/// Options of windowed rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VirtualScrollOptions {
    /// Logical item count. `None` infers it from the source sequence; a
    /// larger value is clamped to the sequence length.
    pub total_count: Option<usize>,
}
