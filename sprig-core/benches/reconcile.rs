//! Benchmarks for keyed reconciliation and write propagation.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use sprig_core::repeat::{Repeat, RepeatItem, UnitHost};
use sprig_core::{RenderUnit, StateCell, Tracker};

struct NullHost {
    next: usize,
}

impl UnitHost<String> for NullHost {
    type Unit = usize;

    fn create(&mut self, _template: &str) -> usize {
        self.next += 1;
        self.next
    }

    fn update(&mut self, _unit: &mut usize, _item: &RepeatItem<String>) {}

    fn destroy(&mut self, _unit: usize) {}
}

fn items(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("item{i}")).collect()
}

/// Reverse a keyed list: every unit retained, most of them moved.
fn bench_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_reverse");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let tracker = Tracker::new();
            let repeat = Repeat::with_key(&tracker, |item: &String, _| item.clone());
            let mut host = NullHost { next: 0 };
            let forward = items(n);
            let mut backward = forward.clone();
            backward.reverse();
            repeat.render(&mut host, &forward, true).unwrap();

            let mut flip = false;
            b.iter(|| {
                flip = !flip;
                let list = if flip { &backward } else { &forward };
                black_box(repeat.render(&mut host, list, false).unwrap());
            });
        });
    }

    group.finish();
}

/// Scroll a window through a long list with a reuse cache.
fn bench_virtual_scroll(c: &mut Criterion) {
    let tracker = Tracker::new();
    let repeat = Repeat::<String, usize>::with_key(&tracker, |item: &String, _| item.clone())
        .template(
            sprig_core::repeat::DEFAULT_TEMPLATE,
            |_, _| {},
            sprig_core::TemplateOptions::cached(8),
        )
        .virtual_scroll(sprig_core::VirtualScrollOptions::default());
    let mut host = NullHost { next: 0 };
    let list = items(10_000);

    let mut start = 0;
    c.bench_function("virtual_scroll_step", |b| {
        b.iter(|| {
            start = (start + 3) % 9_950;
            repeat.set_visible_range(start, 40);
            black_box(repeat.render(&mut host, &list, false).unwrap());
        });
    });
}

/// One write fanned out to many readers, then drained.
fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_fan_out");

    for readers in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(readers), &readers, |b, &readers| {
            let tracker = Tracker::new();
            let cell = StateCell::new(&tracker, 0u64);
            let _units: Vec<RenderUnit> = (0..readers)
                .map(|_| {
                    let reader = cell.clone();
                    RenderUnit::new(&tracker, move || {
                        black_box(reader.read());
                    })
                    .unwrap()
                })
                .collect();

            let mut value = 0;
            b.iter(|| {
                value += 1;
                cell.write(value).unwrap();
                tracker.flush().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reverse, bench_virtual_scroll, bench_fan_out);
criterion_main!(benches);
