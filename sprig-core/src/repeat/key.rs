//! Default keys.
//!
//! The default key of an item is `"{index}__{structural}"`. Primitives
//! contribute their JSON text; objects, arrays and foreign values
//! contribute a number tied to their identity, so the same object always
//! maps to the same number while it is alive.

use std::collections::HashMap;

use crate::observe::{Value, WeakIdentity};

/// Numbers handed out per object identity.
///
/// Entries hold weak references only. Dead entries are pruned once the map
/// grows past the prune threshold.
#[derive(Debug)]
pub struct IdentityKeys {
    entries: HashMap<usize, (WeakIdentity, u64)>,
    counter: u64,
    prune_threshold: usize,
}

impl IdentityKeys {
    pub fn new(prune_threshold: usize) -> Self {
        Self {
            entries: HashMap::new(),
            counter: 0,
            prune_threshold: prune_threshold.max(1),
        }
    }

    /// The number for `identity`, allocating one on first sight.
    pub fn key_of(&mut self, identity: &WeakIdentity) -> u64 {
        let addr = identity.addr();
        if let Some((known, number)) = self.entries.get(&addr) {
            if known.is_alive() {
                return *number;
            }
        }

        self.counter += 1;
        self.entries.insert(addr, (identity.clone(), self.counter));
        if self.entries.len() > self.prune_threshold {
            self.prune();
        }
        self.counter
    }

    /// Drop entries whose referent is gone.
    pub fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, (identity, _)| identity.is_alive());
        tracing::trace!(pruned = before - self.entries.len(), "pruned identity keys");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for IdentityKeys {
    fn default() -> Self {
        Self::new(256)
    }
}

/// The structural part of a default key.
pub trait StructuralKey {
    fn structural_key(&self, identities: &mut IdentityKeys) -> String;
}

macro_rules! json_structural_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl StructuralKey for $ty {
                fn structural_key(&self, _identities: &mut IdentityKeys) -> String {
                    serde_json::to_string(self).unwrap_or_default()
                }
            }
        )*
    };
}

json_structural_key!(
    bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, char, String, &'static str, ()
);

impl<T: StructuralKey> StructuralKey for Option<T> {
    fn structural_key(&self, identities: &mut IdentityKeys) -> String {
        match self {
            Some(value) => value.structural_key(identities),
            None => "null".to_string(),
        }
    }
}

impl StructuralKey for Value {
    fn structural_key(&self, identities: &mut IdentityKeys) -> String {
        match self.identity() {
            Some(identity) => identities.key_of(&identity).to_string(),
            None => self.to_json().to_string(),
        }
    }
}

/// `"{index}__{structural}"`.
pub fn default_key<T: StructuralKey>(item: &T, index: usize, identities: &mut IdentityKeys) -> String {
    format!("{index}__{}", item.structural_key(identities))
}
