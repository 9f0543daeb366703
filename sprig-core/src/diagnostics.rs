//! Recoverable conditions reported by the engine.
//!
//! Diagnostics never interrupt the operation that produced them. They are
//! logged through `tracing`, buffered on the tracker (unless disabled in
//! the configuration) and handed to an optional host sink.

use serde::Serialize;

use crate::error::{ReactiveError, Result};
use crate::reactive::ConsumerId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A reconciliation pass produced the same key twice. The later item
    /// was given a synthetic key.
    DuplicateKey {
        key: String,
        first: usize,
        duplicate: usize,
    },

    /// A monitored path crosses a property that cannot be observed.
    UnmonitorableProperty {
        monitor: ConsumerId,
        path: String,
        segment: String,
    },

    /// A monitored path no longer resolves.
    PathNotFound { monitor: ConsumerId, path: String },
}

impl Diagnostic {
    pub(crate) fn log(&self) {
        match self {
            Diagnostic::DuplicateKey {
                key,
                first,
                duplicate,
            } => {
                tracing::warn!(%key, first, duplicate, "duplicate key in reconciliation pass");
            }
            Diagnostic::UnmonitorableProperty {
                monitor,
                path,
                segment,
            } => {
                tracing::warn!(monitor = monitor.raw(), %path, %segment, "property is not monitorable");
            }
            Diagnostic::PathNotFound { monitor, path } => {
                tracing::debug!(monitor = monitor.raw(), %path, "monitored path not found");
            }
        }
    }

    /// The error this diagnostic stands for.
    pub fn to_error(&self) -> ReactiveError {
        match self {
            Diagnostic::DuplicateKey {
                key,
                first,
                duplicate,
            } => ReactiveError::DuplicateKey {
                key: key.clone(),
                first: *first,
                duplicate: *duplicate,
            },
            Diagnostic::UnmonitorableProperty { path, segment, .. } => {
                ReactiveError::UnmonitorableProperty {
                    path: path.clone(),
                    segment: segment.clone(),
                }
            }
            Diagnostic::PathNotFound { path, .. } => {
                ReactiveError::PathNotFound { path: path.clone() }
            }
        }
    }
}

/// Encode a batch of diagnostics as MessagePack for a host bridge.
///
/// Each diagnostic becomes a map keyed by field name, with the variant in
/// `kind`.
pub fn encode_batch(diagnostics: &[Diagnostic]) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(diagnostics)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let diag = Diagnostic::DuplicateKey {
            key: "a".to_string(),
            first: 0,
            duplicate: 2,
        };
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["kind"], "duplicate_key");
        assert_eq!(json["duplicate"], 2);
    }

    #[test]
    fn maps_to_error() {
        let diag = Diagnostic::PathNotFound {
            monitor: ConsumerId::new(),
            path: "a.b".to_string(),
        };
        assert!(matches!(
            diag.to_error(),
            ReactiveError::PathNotFound { path } if path == "a.b"
        ));
    }

    #[test]
    fn encodes_batches_as_named_maps() {
        let batch = vec![
            Diagnostic::DuplicateKey {
                key: "a".to_string(),
                first: 0,
                duplicate: 1,
            },
            Diagnostic::PathNotFound {
                monitor: ConsumerId::new(),
                path: "user.name".to_string(),
            },
        ];
        let bytes = encode_batch(&batch).unwrap();
        let decoded: serde_json::Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded[0]["kind"], "duplicate_key");
        assert_eq!(decoded[0]["duplicate"], 1);
        assert_eq!(decoded[1]["path"], "user.name");
    }
}
