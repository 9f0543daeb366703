//! Property paths and their resolution.
//!
//! A path is a dotted list of property names (`"user.address.city"`,
//! `"items.0.title"`). Resolution walks the object graph one property at a
//! time through [`PropertyAccessible`], so every tracked hop records its
//! slot in the current recording frame.
//!
//! Arrays are observed as a whole. The first array met on a path becomes
//! the dependency root: its container (and the containers of arrays nested
//! in it) is recorded, and the rest of the path resolves without recording
//! anything. Multi-dimensional arrays therefore collapse onto one root.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::reactive::Tracker;

/// How a property can be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Reads are attributable.
    Tracked,
    /// The property exists but reads are not attributable.
    Untracked,
    /// No such property.
    Missing,
}

/// The capability the path resolver walks. Objects opt in by implementing it.
pub trait PropertyAccessible {
    /// Read a property. Observed implementations record the read.
    fn get_property(&self, key: &str) -> Option<Value>;

    fn has_property(&self, key: &str) -> bool;

    /// Classify a property without recording anything.
    fn property_kind(&self, key: &str) -> PropertyKind;
}

/// A parsed dotted property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    raw: String,
    segments: SmallVec<[String; 4]>,
}

impl PropertyPath {
    /// Parse a dotted path. Empty paths and empty segments are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: SmallVec<[String; 4]> = raw.split('.').map(str::to_string).collect();
        if raw.is_empty() || segments.iter().any(String::is_empty) {
            return Err(ReactiveError::InvalidPath {
                path: raw.to_string(),
            });
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for PropertyPath {
    type Err = ReactiveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The path resolves. `stamp` is the deep mutation stamp when the
    /// value is an array, so in-place array mutations count as changes.
    Found { value: Value, stamp: Option<u64> },
    /// A segment does not exist (or a primitive was dereferenced).
    NotFound { segment: String },
    /// A segment crosses a property that cannot be observed.
    Unmonitorable { segment: String },
}

impl Resolution {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Resolution::Found { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Resolve `path` starting at `root`, recording tracked hops in the
/// tracker's current frame.
pub fn resolve(tracker: &Tracker, root: &Value, path: &PropertyPath) -> Resolution {
    let segments = path.segments();
    let mut current = root.clone();

    for (position, segment) in segments.iter().enumerate() {
        let next = match &current {
            Value::Array(array) => {
                array.track_deep();
                let rest = &segments[position..];
                return tracker.untracked(|| walk_untracked(current.clone(), rest));
            }
            Value::Object(object) => match object.property_kind(segment) {
                PropertyKind::Missing => {
                    // Records the shape, so the property appearing re-resolves the path.
                    object.get(segment);
                    return Resolution::NotFound {
                        segment: segment.clone(),
                    };
                }
                PropertyKind::Untracked => {
                    return Resolution::Unmonitorable {
                        segment: segment.clone(),
                    }
                }
                PropertyKind::Tracked => object.get(segment).unwrap_or_default(),
            },
            Value::Foreign(_) => {
                return Resolution::Unmonitorable {
                    segment: segment.clone(),
                }
            }
            _ => {
                return Resolution::NotFound {
                    segment: segment.clone(),
                }
            }
        };
        current = next;
    }

    found(current)
}

fn walk_untracked(mut current: Value, segments: &[String]) -> Resolution {
    for segment in segments {
        let next = match &current {
            Value::Object(object) => object.get_property(segment),
            Value::Array(array) => array.get_property(segment),
            Value::Foreign(foreign) => foreign.get_property(segment),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => {
                return Resolution::NotFound {
                    segment: segment.clone(),
                }
            }
        }
    }
    found(current)
}

fn found(value: Value) -> Resolution {
    let stamp = value.as_array().map(|array| {
        array.track_deep();
        array.deep_stamp()
    });
    Resolution::Found { value, stamp }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{ObservedArray, ObservedObject, Owner};
    use crate::reactive::{CellId, ConsumerId, PathId};
    use std::collections::HashSet;

    fn root(tracker: &Tracker, value: Value) -> Value {
        let owner = Owner::new(CellId::new(), tracker.clone());
        value.check_attach(&owner, &mut HashSet::new()).unwrap();
        value.attach(&owner);
        value
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(PropertyPath::parse("").is_err());
        assert!(PropertyPath::parse("a..b").is_err());
        assert!(PropertyPath::parse(".a").is_err());
        let path: PropertyPath = "a.b.0".parse().unwrap();
        assert_eq!(path.segments(), &["a", "b", "0"]);
        assert_eq!(path.to_string(), "a.b.0");
    }

    #[test]
    fn resolves_nested_properties_and_records_each_hop() {
        let tracker = Tracker::new();
        let address = ObservedObject::new().with("city", "Oslo");
        let user = ObservedObject::new().with("address", address.clone());
        let target = root(&tracker, user.clone().into());
        let monitor = ConsumerId::new();

        let resolution = {
            let _guard = tracker.record(monitor, PathId::new(1));
            resolve(&tracker, &target, &"address.city".parse().unwrap())
        };

        assert_eq!(resolution.value(), Some(&Value::from("Oslo")));
        assert!(tracker.is_subscribed(monitor, user.slot_id("address").unwrap()));
        assert!(tracker.is_subscribed(monitor, address.slot_id("city").unwrap()));
    }

    #[test]
    fn missing_and_primitive_hops_are_not_found() {
        let tracker = Tracker::new();
        let target = root(&tracker, ObservedObject::new().with("n", 1).into());

        assert!(matches!(
            resolve(&tracker, &target, &"missing".parse().unwrap()),
            Resolution::NotFound { segment } if segment == "missing"
        ));
        assert!(matches!(
            resolve(&tracker, &target, &"n.deeper".parse().unwrap()),
            Resolution::NotFound { segment } if segment == "deeper"
        ));
    }

    #[test]
    fn untracked_property_is_unmonitorable() {
        let tracker = Tracker::new();
        let target = root(
            &tracker,
            ObservedObject::traced().with("plain", 1).into(),
        );

        assert!(matches!(
            resolve(&tracker, &target, &"plain".parse().unwrap()),
            Resolution::Unmonitorable { segment } if segment == "plain"
        ));
    }

    #[test]
    fn first_array_is_the_dependency_root() {
        let tracker = Tracker::new();
        let row = ObservedArray::from_vec(vec![1.into(), 2.into()]);
        let grid = ObservedArray::from_vec(vec![row.clone().into()]);
        let cell = ObservedObject::new().with("v", 7);
        let items = ObservedArray::from_vec(vec![cell.clone().into()]);
        let target = root(
            &tracker,
            ObservedObject::new()
                .with("grid", grid.clone())
                .with("items", items.clone())
                .into(),
        );
        let monitor = ConsumerId::new();

        let _guard = tracker.record(monitor, PathId::ROOT);
        let resolution = resolve(&tracker, &target, &"grid.0.1".parse().unwrap());
        assert_eq!(resolution.value(), Some(&Value::from(2)));
        assert!(tracker.is_subscribed(monitor, grid.container_id()));
        assert!(tracker.is_subscribed(monitor, row.container_id()));

        let resolution = resolve(&tracker, &target, &"items.0.v".parse().unwrap());
        assert_eq!(resolution.value(), Some(&Value::from(7)));
        // Elements below the root are not individually recorded.
        assert!(!tracker.is_subscribed(monitor, cell.slot_id("v").unwrap()));
    }

    #[test]
    fn array_values_carry_a_stamp() {
        let tracker = Tracker::new();
        let list = ObservedArray::new();
        let target = root(&tracker, ObservedObject::new().with("list", list.clone()).into());

        let first = resolve(&tracker, &target, &"list".parse().unwrap());
        list.push(1).unwrap();
        let second = resolve(&tracker, &target, &"list".parse().unwrap());

        let (Resolution::Found { stamp: a, .. }, Resolution::Found { stamp: b, .. }) = (first, second) else {
            panic!("list should resolve");
        };
        assert!(a.unwrap() < b.unwrap());
    }
}
