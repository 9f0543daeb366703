//! Bounded per-template reuse cache.

use std::collections::HashMap;

/// Retired units waiting to be reused, grouped by template tag.
#[derive(Debug)]
pub(crate) struct TemplateCache<U> {
    pools: HashMap<String, Vec<U>>,
}

impl<U> TemplateCache<U> {
    /// Keep `unit` if the template's pool has fewer than `capacity` units.
    /// Otherwise hand it back for destruction.
    pub(crate) fn offer(&mut self, tag: &str, unit: U, capacity: usize) -> Option<U> {
        let pool = self.pools.entry(tag.to_string()).or_default();
        if pool.len() < capacity {
            pool.push(unit);
            None
        } else {
            Some(unit)
        }
    }

    /// Take the most recently retired unit of a template.
    pub(crate) fn take(&mut self, tag: &str) -> Option<U> {
        self.pools.get_mut(tag).and_then(Vec::pop)
    }

    pub(crate) fn len(&self, tag: &str) -> usize {
        self.pools.get(tag).map_or(0, Vec::len)
    }

    pub(crate) fn total(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    /// Empty every pool.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = U> + '_ {
        self.pools.drain().flat_map(|(_, pool)| pool)
    }
}

impl<U> Default for TemplateCache<U> {
    fn default() -> Self {
        Self {
            pools: HashMap::new(),
        }
    }
}
