//! Keyed reconciliation.
//!
//! # How It Works
//!
//! A render derives one key per item (in the visible window when virtual
//! scrolling is on) and compares the new key list with the previous one:
//!
//! 1. **Retire.** Units whose key disappeared, or whose template changed,
//!    are returned to their template's cache while it has room and
//!    destroyed otherwise. Retirement happens before anything is created,
//!    so freed cache slots are available to the same pass.
//!
//! 2. **Update.** Retained units keep their identity. Their item and index
//!    cells are written in place and the host is asked to update them only
//!    when one of the two changed.
//!
//! 3. **Create.** New keys take a cached unit of their template when one
//!    exists, otherwise the host creates a unit and the template's item
//!    generator fills it.
//!
//! 4. **Move.** Retained keys whose relative order changed are reported to
//!    the move handler. The keys that stay put are the longest increasing
//!    subsequence of old positions; everything else moved.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use indexmap::IndexMap;
use serde::Serialize;

use super::cache::TemplateCache;
use super::item::RepeatItem;
use super::key::{default_key, IdentityKeys, StructuralKey};
use super::options::{TemplateOptions, VirtualScrollOptions};
use crate::diagnostics::Diagnostic;
use crate::error::{ReactiveError, Result};
use crate::reactive::{CellValue, Tracker};

/// Tag of the template registered with [`Repeat::each`].
pub const DEFAULT_TEMPLATE: &str = "default";

/// The host side of a repeat: creates, updates and destroys units.
///
/// Host methods must not panic. The repeat holds its units outside its own
/// storage while a render applies, so a panic drops every unit without a
/// `destroy` call. The repeat itself returns to idle and renders again from
/// an empty list.
pub trait UnitHost<T: CellValue> {
    type Unit;

    fn create(&mut self, template: &str) -> Self::Unit;

    /// Rebind `unit` to `item`. Called for retained units whose item or
    /// index changed and for units taken from the cache.
    fn update(&mut self, unit: &mut Self::Unit, item: &RepeatItem<T>);

    fn destroy(&mut self, unit: Self::Unit);
}

/// Reconciler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReconcileState {
    Idle,
    /// Deriving keys and templates.
    Diffing,
    /// Retiring, updating and creating units.
    Applying,
}

impl ReconcileState {
    fn name(self) -> &'static str {
        match self {
            ReconcileState::Idle => "idle",
            ReconcileState::Diffing => "diffing",
            ReconcileState::Applying => "applying",
        }
    }
}

/// What one render did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderSummary {
    /// Units created by the host.
    pub created: usize,
    /// Units taken from a template cache.
    pub reused: usize,
    /// Retained units whose item or index changed.
    pub updated: usize,
    /// Units returned to a template cache.
    pub retired: usize,
    /// Units destroyed by the host.
    pub destroyed: usize,
    /// Retained units whose relative order changed.
    pub moved: usize,
}

/// Passed to the move handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEvent {
    /// Keys of retained units that changed relative order, in new order.
    pub moves: Vec<String>,
    /// Whether the key set is unchanged, so the pass was only a reorder.
    pub pure_reorder: bool,
}

type KeyFn<T> = Box<dyn FnMut(&T, usize) -> String>;
type TemplateFn<T> = Box<dyn FnMut(&T, usize) -> String>;
type ItemGen<T, U> = Box<dyn FnMut(&mut U, &RepeatItem<T>)>;
type MoveFn = Box<dyn FnMut(&MoveEvent)>;

struct Template<T: CellValue, U> {
    generator: Option<ItemGen<T, U>>,
    cached_count: usize,
}

struct Entry<T: CellValue, U> {
    template: String,
    unit: U,
    item: RepeatItem<T>,
}

struct Planned {
    key: String,
    template: String,
    index: usize,
}

/// Restores `Idle` when a render ends, however it ends.
struct StateGuard<'a> {
    state: &'a Cell<ReconcileState>,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.state.set(ReconcileState::Idle);
    }
}

/// A keyed list of units.
///
/// Configure with the builder methods, then call [`render`](Self::render)
/// with the current source sequence whenever it may have changed (usually
/// from the parent unit's render function, so reads made by key and
/// template functions are attributed to the parent).
///
/// Dropping a repeat drops its units without calling the host; call
/// [`clear`](Self::clear) first when the host needs to see them go.
pub struct Repeat<T: CellValue, U> {
    tracker: Tracker,
    key_fn: RefCell<KeyFn<T>>,
    template_fn: RefCell<Option<TemplateFn<T>>>,
    templates: RefCell<IndexMap<String, Template<T, U>>>,
    on_move: RefCell<Option<MoveFn>>,
    scroll: Cell<Option<VirtualScrollOptions>>,
    window: Cell<(usize, usize)>,
    entries: RefCell<Vec<Entry<T, U>>>,
    cache: RefCell<TemplateCache<U>>,
    state: Cell<ReconcileState>,
}

impl<T: CellValue + StructuralKey, U> Repeat<T, U> {
    /// A repeat using the default key `"{index}__{structural}"`.
    pub fn new(tracker: &Tracker) -> Self {
        let mut identities = IdentityKeys::new(tracker.config().identity_prune_threshold);
        Self::with_key(tracker, move |item: &T, index| default_key(item, index, &mut identities))
    }
}

impl<T: CellValue, U> Repeat<T, U> {
    /// A repeat using `key` to derive item keys.
    pub fn with_key(tracker: &Tracker, key: impl FnMut(&T, usize) -> String + 'static) -> Self {
        let mut templates = IndexMap::new();
        templates.insert(
            DEFAULT_TEMPLATE.to_string(),
            Template {
                generator: None,
                cached_count: tracker.config().default_cached_count,
            },
        );
        Self {
            tracker: tracker.clone(),
            key_fn: RefCell::new(Box::new(key)),
            template_fn: RefCell::new(None),
            templates: RefCell::new(templates),
            on_move: RefCell::new(None),
            scroll: Cell::new(None),
            window: Cell::new((0, usize::MAX)),
            entries: RefCell::new(Vec::new()),
            cache: RefCell::new(TemplateCache::default()),
            state: Cell::new(ReconcileState::Idle),
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Item generator of the default template.
    pub fn each(mut self, generator: impl FnMut(&mut U, &RepeatItem<T>) + 'static) -> Self {
        if let Some(template) = self.templates.get_mut().get_mut(DEFAULT_TEMPLATE) {
            template.generator = Some(Box::new(generator));
        }
        self
    }

    /// Replace the key function.
    pub fn key(mut self, key: impl FnMut(&T, usize) -> String + 'static) -> Self {
        *self.key_fn.get_mut() = Box::new(key);
        self
    }

    /// Register an alternate template. Registering [`DEFAULT_TEMPLATE`]
    /// replaces the default one.
    pub fn template(
        mut self,
        tag: &str,
        generator: impl FnMut(&mut U, &RepeatItem<T>) + 'static,
        options: TemplateOptions,
    ) -> Self {
        let cached_count = options
            .cached_count
            .unwrap_or(self.tracker.config().default_cached_count);
        self.templates.get_mut().insert(
            tag.to_string(),
            Template {
                generator: Some(Box::new(generator)),
                cached_count,
            },
        );
        self
    }

    /// Per-item template selection. Unknown tags use the default template.
    pub fn template_id(mut self, select: impl FnMut(&T, usize) -> String + 'static) -> Self {
        *self.template_fn.get_mut() = Some(Box::new(select));
        self
    }

    /// Handler for passes where retained keys changed order.
    pub fn on_move(mut self, handler: impl FnMut(&MoveEvent) + 'static) -> Self {
        *self.on_move.get_mut() = Some(Box::new(handler));
        self
    }

    /// Switch to windowed rendering. Until [`set_visible_range`] is called
    /// the window covers every item.
    ///
    /// [`set_visible_range`]: Self::set_visible_range
    pub fn virtual_scroll(self, options: VirtualScrollOptions) -> Self {
        self.scroll.set(Some(options));
        self
    }

    /// Set the window of materialized items. Takes effect on the next render.
    pub fn set_visible_range(&self, start: usize, len: usize) {
        self.window.set((start, len));
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Reconcile the units with `items`.
    ///
    /// With `is_initial` the previous units are all retired and the list is
    /// rebuilt. Calling `render` while a render is in progress returns
    /// `ReentrantRender` and changes nothing.
    pub fn render<H>(&self, host: &mut H, items: &[T], is_initial: bool) -> Result<RenderSummary>
    where
        H: UnitHost<T, Unit = U>,
    {
        let state = self.state.get();
        if state != ReconcileState::Idle {
            return Err(ReactiveError::ReentrantRender { state: state.name() });
        }
        let _idle = StateGuard { state: &self.state };

        self.state.set(ReconcileState::Diffing);
        let range = self.window_for(items.len());
        let planned = self.plan(items, range);

        self.state.set(ReconcileState::Applying);
        let old = std::mem::take(&mut *self.entries.borrow_mut());
        let mut cache = std::mem::take(&mut *self.cache.borrow_mut());
        let mut summary = RenderSummary::default();

        let positions: HashMap<&str, usize> = planned
            .iter()
            .enumerate()
            .map(|(position, plan)| (plan.key.as_str(), position))
            .collect();

        let mut retained: HashMap<String, (usize, Entry<T, U>)> = HashMap::new();
        for (old_position, entry) in old.into_iter().enumerate() {
            let keep = !is_initial
                && positions
                    .get(entry.item.key())
                    .is_some_and(|&p| planned[p].template == entry.template);
            if keep {
                retained.insert(entry.item.key().to_string(), (old_position, entry));
            } else {
                self.retire(host, &mut cache, entry, &mut summary);
            }
        }
        let removed = summary.retired + summary.destroyed;

        let mut slots: Vec<Option<Entry<T, U>>> = planned.iter().map(|_| None).collect();
        let mut old_positions: Vec<(usize, usize)> = Vec::with_capacity(retained.len());
        for (position, plan) in planned.iter().enumerate() {
            let Some((old_position, mut entry)) = retained.remove(&plan.key) else {
                continue;
            };
            if entry.item.set(items[plan.index].clone(), plan.index) {
                host.update(&mut entry.unit, &entry.item);
                summary.updated += 1;
            }
            old_positions.push((position, old_position));
            slots[position] = Some(entry);
        }

        for (position, plan) in planned.iter().enumerate() {
            if slots[position].is_some() {
                continue;
            }
            let item = RepeatItem::new(
                &self.tracker,
                plan.key.clone(),
                items[plan.index].clone(),
                plan.index,
            );
            let unit = match cache.take(&plan.template) {
                Some(mut unit) => {
                    host.update(&mut unit, &item);
                    summary.reused += 1;
                    unit
                }
                None => {
                    let mut unit = host.create(&plan.template);
                    self.generate(&plan.template, &mut unit, &item);
                    summary.created += 1;
                    unit
                }
            };
            slots[position] = Some(Entry {
                template: plan.template.clone(),
                unit,
                item,
            });
        }

        let sequence: Vec<usize> = old_positions.iter().map(|&(_, old)| old).collect();
        let stable = longest_increasing_subsequence(&sequence);
        let moves: Vec<String> = old_positions
            .iter()
            .zip(stable)
            .filter(|(_, stays)| !stays)
            .map(|(&(position, _), _)| planned[position].key.clone())
            .collect();
        summary.moved = moves.len();
        let pure_reorder = removed == 0 && summary.created + summary.reused == 0;

        *self.entries.borrow_mut() = slots.into_iter().flatten().collect();
        *self.cache.borrow_mut() = cache;

        if !moves.is_empty() {
            if let Ok(mut handler) = self.on_move.try_borrow_mut() {
                if let Some(handler) = handler.as_mut() {
                    handler(&MoveEvent {
                        moves,
                        pure_reorder,
                    });
                }
            }
        }

        tracing::debug!(
            created = summary.created,
            reused = summary.reused,
            updated = summary.updated,
            retired = summary.retired,
            destroyed = summary.destroyed,
            moved = summary.moved,
            "repeat rendered"
        );
        Ok(summary)
    }

    /// Destroy every unit, cached ones included. Returns how many were destroyed.
    pub fn clear<H>(&self, host: &mut H) -> Result<usize>
    where
        H: UnitHost<T, Unit = U>,
    {
        let state = self.state.get();
        if state != ReconcileState::Idle {
            return Err(ReactiveError::ReentrantRender { state: state.name() });
        }
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        let cached: Vec<U> = self.cache.borrow_mut().drain().collect();

        let mut destroyed = 0;
        for unit in entries.into_iter().map(|e| e.unit).chain(cached) {
            host.destroy(unit);
            destroyed += 1;
        }
        Ok(destroyed)
    }

    fn window_for(&self, len: usize) -> Range<usize> {
        let Some(options) = self.scroll.get() else {
            return 0..len;
        };
        let total = options.total_count.map_or(len, |total| total.min(len));
        let (start, count) = self.window.get();
        let start = start.min(total);
        start..start.saturating_add(count).min(total)
    }

    fn plan(&self, items: &[T], range: Range<usize>) -> Vec<Planned> {
        let mut key_fn = self.key_fn.borrow_mut();
        let mut template_fn = self.template_fn.borrow_mut();
        let templates = self.templates.borrow();

        let mut seen: HashMap<String, usize> = HashMap::with_capacity(range.len());
        let mut duplicates = Vec::new();
        let mut planned = Vec::with_capacity(range.len());

        for index in range {
            let item = &items[index];
            let mut key = key_fn(item, index);
            if let Some(&first) = seen.get(&key) {
                duplicates.push(Diagnostic::DuplicateKey {
                    key: key.clone(),
                    first,
                    duplicate: index,
                });
                key = synthetic_key(&key, index, &seen);
            }
            // Synthetic keys are reserved too, so a later real key equal to
            // one of them is itself a duplicate.
            seen.insert(key.clone(), index);

            let template = template_fn
                .as_mut()
                .map(|select| select(item, index))
                .filter(|tag| templates.contains_key(tag))
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());

            planned.push(Planned {
                key,
                template,
                index,
            });
        }

        drop((key_fn, template_fn, templates));
        for diagnostic in duplicates {
            self.tracker.report(diagnostic);
        }
        planned
    }

    fn retire<H>(
        &self,
        host: &mut H,
        cache: &mut TemplateCache<U>,
        entry: Entry<T, U>,
        summary: &mut RenderSummary,
    ) where
        H: UnitHost<T, Unit = U>,
    {
        let capacity = self
            .templates
            .borrow()
            .get(&entry.template)
            .map_or(0, |template| template.cached_count);
        match cache.offer(&entry.template, entry.unit, capacity) {
            None => summary.retired += 1,
            Some(unit) => {
                host.destroy(unit);
                summary.destroyed += 1;
            }
        }
    }

    fn generate(&self, tag: &str, unit: &mut U, item: &RepeatItem<T>) {
        let mut templates = self.templates.borrow_mut();
        let tag = if templates.get(tag).is_some_and(|t| t.generator.is_some()) {
            tag
        } else {
            DEFAULT_TEMPLATE
        };
        if let Some(generator) = templates.get_mut(tag).and_then(|t| t.generator.as_mut()) {
            generator(unit, item);
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Keys of the live units, in order.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|e| e.item.key().to_string())
            .collect()
    }

    /// Item of a live unit.
    pub fn item(&self, key: &str) -> Option<RepeatItem<T>> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.item.key() == key)
            .map(|e| e.item.clone())
    }

    pub fn with_unit<R>(&self, key: &str, f: impl FnOnce(&U) -> R) -> Option<R> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.item.key() == key)
            .map(|e| f(&e.unit))
    }

    /// Template tag of a live unit.
    pub fn template_of(&self, key: &str) -> Option<String> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.item.key() == key)
            .map(|e| e.template.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn state(&self) -> ReconcileState {
        self.state.get()
    }

    /// Number of cached units of a template.
    pub fn cached(&self, tag: &str) -> usize {
        self.cache.borrow().len(tag)
    }

    pub fn cached_total(&self) -> usize {
        self.cache.borrow().total()
    }

    /// The window `(start, len)` set by [`set_visible_range`](Self::set_visible_range).
    pub fn visible_range(&self) -> (usize, usize) {
        self.window.get()
    }

    pub fn is_virtual(&self) -> bool {
        self.scroll.get().is_some()
    }
}

impl<T: CellValue, U: Clone> Repeat<T, U> {
    /// The live units, in order.
    pub fn units(&self) -> Vec<U> {
        self.entries.borrow().iter().map(|e| e.unit.clone()).collect()
    }
}

impl<T: CellValue, U> fmt::Debug for Repeat<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repeat")
            .field("keys", &self.keys())
            .field("state", &self.state.get())
            .field("cached", &self.cached_total())
            .field("virtual", &self.is_virtual())
            .finish()
    }
}

/// `"{key}#dup{index}"`, suffixed with a counter while that name is taken.
fn synthetic_key(key: &str, index: usize, seen: &HashMap<String, usize>) -> String {
    let base = format!("{key}#dup{index}");
    let mut candidate = base.clone();
    let mut attempt = 1;
    while seen.contains_key(&candidate) {
        candidate = format!("{base}.{attempt}");
        attempt += 1;
    }
    candidate
}

/// Marks the elements of `sequence` that belong to one longest strictly
/// increasing subsequence.
fn longest_increasing_subsequence(sequence: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; sequence.len()];

    for (i, &value) in sequence.iter().enumerate() {
        let position = tails.partition_point(|&t| sequence[t] < value);
        if position > 0 {
            previous[i] = Some(tails[position - 1]);
        }
        if position == tails.len() {
            tails.push(i);
        } else {
            tails[position] = i;
        }
    }

    let mut stable = vec![false; sequence.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        stable[i] = true;
        cursor = previous[i];
    }
    stable
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[derive(Default)]
    struct Host {
        next: usize,
        created: Vec<(usize, String)>,
        updated: Vec<(usize, usize)>,
        destroyed: Vec<usize>,
    }

    impl UnitHost<String> for Host {
        type Unit = usize;

        fn create(&mut self, template: &str) -> usize {
            self.next += 1;
            self.created.push((self.next, template.to_string()));
            self.next
        }

        fn update(&mut self, unit: &mut usize, item: &RepeatItem<String>) {
            self.updated.push((*unit, item.peek_index()));
        }

        fn destroy(&mut self, unit: usize) {
            self.destroyed.push(unit);
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn by_value(tracker: &Tracker) -> Repeat<String, usize> {
        Repeat::with_key(tracker, |item: &String, _| item.clone())
    }

    #[test]
    fn lis_marks_stable_elements() {
        assert_eq!(longest_increasing_subsequence(&[0, 1, 2]), vec![true, true, true]);
        assert_eq!(longest_increasing_subsequence(&[2, 0]), vec![false, true]);
        assert_eq!(
            longest_increasing_subsequence(&[3, 0, 1, 2]),
            vec![false, true, true, true]
        );
        assert!(longest_increasing_subsequence(&[]).is_empty());
    }

    #[test]
    fn initial_render_creates_and_generates() {
        let tracker = Tracker::new();
        let generated = Rc::new(RefCell::new(Vec::new()));
        let sink = generated.clone();
        let repeat = by_value(&tracker).each(move |unit, item| {
            sink.borrow_mut().push((*unit, item.peek_item()));
        });
        let mut host = Host::default();

        let summary = repeat.render(&mut host, &strings(&["a", "b"]), true).unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(repeat.keys(), vec!["a", "b"]);
        assert_eq!(
            *generated.borrow(),
            vec![(1, "a".to_string()), (2, "b".to_string())]
        );
        assert_eq!(repeat.state(), ReconcileState::Idle);
    }

    #[test]
    fn removal_and_reorder() {
        let tracker = Tracker::new();
        let moves = Rc::new(RefCell::new(Vec::new()));
        let sink = moves.clone();
        let repeat = by_value(&tracker).on_move(move |event| sink.borrow_mut().push(event.clone()));
        let mut host = Host::default();

        repeat.render(&mut host, &strings(&["a", "b", "c"]), true).unwrap();
        let summary = repeat.render(&mut host, &strings(&["c", "a"]), false).unwrap();

        assert_eq!(summary.destroyed, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(summary.updated, 2);
        assert_eq!(host.destroyed, vec![2]);
        assert_eq!(repeat.units(), vec![3, 1]);
        assert_eq!(moves.borrow().len(), 1);
        assert_eq!(moves.borrow()[0].moves, vec!["c"]);
        assert!(!moves.borrow()[0].pure_reorder);
    }

    #[test]
    fn unchanged_render_does_nothing() {
        let tracker = Tracker::new();
        let repeat = by_value(&tracker);
        let mut host = Host::default();
        let items = strings(&["a", "b"]);

        repeat.render(&mut host, &items, true).unwrap();
        let summary = repeat.render(&mut host, &items, false).unwrap();
        assert_eq!(summary, RenderSummary::default());
        assert!(host.updated.is_empty());
    }

    #[test]
    fn duplicate_keys_first_occurrence_wins() {
        let tracker = Tracker::new();
        let repeat = by_value(&tracker);
        let mut host = Host::default();

        repeat.render(&mut host, &strings(&["a", "a", "b"]), true).unwrap();
        assert_eq!(repeat.keys(), vec!["a", "a#dup1", "b"]);
        assert_eq!(
            tracker.take_diagnostics(),
            vec![Diagnostic::DuplicateKey {
                key: "a".into(),
                first: 0,
                duplicate: 1,
            }]
        );
    }

    #[test]
    fn real_key_matching_a_synthetic_key_is_a_duplicate() {
        let tracker = Tracker::new();
        let repeat = by_value(&tracker);
        let mut host = Host::default();
        let items = strings(&["a", "a", "a#dup1"]);

        repeat.render(&mut host, &items, true).unwrap();
        assert_eq!(repeat.keys(), vec!["a", "a#dup1", "a#dup1#dup2"]);
        assert_eq!(tracker.take_diagnostics().len(), 2);

        let summary = repeat.render(&mut host, &items, false).unwrap();
        assert_eq!(summary, RenderSummary::default());
        assert_eq!(repeat.units(), vec![1, 2, 3]);

        assert_eq!(repeat.clear(&mut host).unwrap(), 3);
        assert_eq!(host.created.len(), host.destroyed.len());
    }

    #[test]
    fn taken_synthetic_key_gets_a_counter() {
        let tracker = Tracker::new();
        let repeat = by_value(&tracker);
        let mut host = Host::default();

        repeat
            .render(&mut host, &strings(&["a#dup2", "a", "a"]), true)
            .unwrap();
        assert_eq!(repeat.keys(), vec!["a#dup2", "a", "a#dup2.1"]);
    }

    #[test]
    fn panicking_host_leaves_the_repeat_idle() {
        struct Exploding;

        impl UnitHost<String> for Exploding {
            type Unit = usize;

            fn create(&mut self, _template: &str) -> usize {
                panic!("host failure");
            }

            fn update(&mut self, _unit: &mut usize, _item: &RepeatItem<String>) {}

            fn destroy(&mut self, _unit: usize) {}
        }

        let tracker = Tracker::new();
        let repeat = by_value(&tracker);
        let mut host = Host::default();
        repeat.render(&mut host, &strings(&["a"]), true).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            repeat.render(&mut Exploding, &strings(&["a", "b"]), false)
        }));
        assert!(outcome.is_err());
        assert_eq!(repeat.state(), ReconcileState::Idle);

        // Units in flight during the panic are gone; the repeat starts over.
        assert!(repeat.is_empty());
        let summary = repeat.render(&mut host, &strings(&["a", "b"]), false).unwrap();
        assert_eq!(summary.created, 2);
    }

    #[test]
    fn cache_bounds_retention_and_feeds_creation() {
        let tracker = Tracker::new();
        let repeat = by_value(&tracker).template("row", |_, _| {}, TemplateOptions::cached(1));
        let repeat = repeat.template_id(|_, _| "row".to_string());
        let mut host = Host::default();

        repeat.render(&mut host, &strings(&["a", "b", "c"]), true).unwrap();
        let summary = repeat.render(&mut host, &strings(&["a"]), false).unwrap();
        assert_eq!((summary.retired, summary.destroyed), (1, 1));
        assert_eq!(repeat.cached("row"), 1);

        let summary = repeat.render(&mut host, &strings(&["a", "d"]), false).unwrap();
        assert_eq!((summary.reused, summary.created), (1, 0));
        assert_eq!(repeat.cached("row"), 0);
        assert_eq!(repeat.item("d").unwrap().peek_index(), 1);
    }

    #[test]
    fn template_change_recreates_the_unit() {
        let tracker = Tracker::new();
        let repeat = by_value(&tracker)
            .template("wide", |_, _| {}, TemplateOptions::default())
            .template_id(|item: &String, _| {
                if item.ends_with('!') {
                    "wide".into()
                } else {
                    "missing".into()
                }
            })
            .key(|item: &String, _| item.trim_end_matches('!').to_string());
        let mut host = Host::default();

        repeat.render(&mut host, &strings(&["a"]), true).unwrap();
        assert_eq!(repeat.template_of("a").as_deref(), Some(DEFAULT_TEMPLATE));

        let summary = repeat.render(&mut host, &strings(&["a!"]), false).unwrap();
        assert_eq!((summary.destroyed, summary.created), (1, 1));
        assert_eq!(repeat.template_of("a").as_deref(), Some("wide"));
        assert_eq!(host.created[1].1, "wide");
    }

    #[test]
    fn virtual_window_materializes_visible_items_only() {
        let tracker = Tracker::new();
        let repeat = by_value(&tracker)
            .template(DEFAULT_TEMPLATE, |_, _| {}, TemplateOptions::cached(2))
            .virtual_scroll(VirtualScrollOptions::default());
        let items: Vec<String> = (0..100).map(|i| format!("item{i}")).collect();
        let mut host = Host::default();

        repeat.set_visible_range(10, 5);
        repeat.render(&mut host, &items, true).unwrap();
        assert_eq!(repeat.len(), 5);
        assert_eq!(repeat.item("item10").unwrap().peek_index(), 10);

        repeat.set_visible_range(12, 5);
        let summary = repeat.render(&mut host, &items, false).unwrap();
        assert_eq!(summary.retired, 2);
        assert_eq!(summary.reused, 2);
        assert_eq!(summary.created, 0);
        assert_eq!(repeat.keys().first().map(String::as_str), Some("item12"));

        // The window is clamped to the sequence.
        repeat.set_visible_range(98, 10);
        repeat.render(&mut host, &items, false).unwrap();
        assert_eq!(repeat.len(), 2);
    }

    #[test]
    fn explicit_total_count_clamps_the_window() {
        let tracker = Tracker::new();
        let repeat = by_value(&tracker).virtual_scroll(VirtualScrollOptions {
            total_count: Some(3),
        });
        let mut host = Host::default();

        repeat.set_visible_range(0, 10);
        repeat.render(&mut host, &strings(&["a", "b", "c", "d"]), true).unwrap();
        assert_eq!(repeat.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn nested_render_is_rejected() {
        struct Nested {
            repeat: Rc<Repeat<String, usize>>,
            outcome: Option<Result<RenderSummary>>,
        }

        impl UnitHost<String> for Nested {
            type Unit = usize;

            fn create(&mut self, _template: &str) -> usize {
                self.outcome = Some(self.repeat.render(&mut Host::default(), &[], false));
                0
            }

            fn update(&mut self, _unit: &mut usize, _item: &RepeatItem<String>) {}

            fn destroy(&mut self, _unit: usize) {}
        }

        let tracker = Tracker::new();
        let repeat = Rc::new(by_value(&tracker));
        let mut host = Nested {
            repeat: repeat.clone(),
            outcome: None,
        };

        repeat.render(&mut host, &strings(&["a"]), true).unwrap();
        assert!(matches!(
            host.outcome,
            Some(Err(ReactiveError::ReentrantRender { state: "applying" }))
        ));
        assert_eq!(repeat.state(), ReconcileState::Idle);
    }

    #[test]
    fn clear_destroys_live_and_cached_units() {
        let tracker = Tracker::new();
        let repeat = by_value(&tracker).template(DEFAULT_TEMPLATE, |_, _| {}, TemplateOptions::cached(4));
        let mut host = Host::default();

        repeat.render(&mut host, &strings(&["a", "b", "c"]), true).unwrap();
        repeat.render(&mut host, &strings(&["a"]), false).unwrap();
        assert_eq!(repeat.clear(&mut host).unwrap(), 3);
        assert!(repeat.is_empty());
        assert_eq!(repeat.cached_total(), 0);
    }

    #[test]
    fn default_keys_include_the_index() {
        let tracker = Tracker::new();
        let repeat: Repeat<String, usize> = Repeat::new(&tracker);
        let mut host = Host::default();

        repeat.render(&mut host, &strings(&["x", "y"]), true).unwrap();
        assert_eq!(repeat.keys(), vec!["0__\"x\"", "1__\"y\""]);
    }
}
