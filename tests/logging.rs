//! `debug` events under a subscriber that allocates from the heap it watches.

#![cfg(feature = "debug")]

use mapalloc::MapAlloc;
use std::cell::Cell;
use std::fmt::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::field::Field;
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Metadata, Subscriber};

#[global_allocator]
static GLOBAL: MapAlloc = MapAlloc;

static EVENTS: AtomicUsize = AtomicUsize::new(0);
static NESTED: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Formats every event into a fresh `String`.
struct Formatting;

impl Subscriber for Formatting {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.target() == "mapalloc"
    }

    fn new_span(&self, _: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _: &Id, _: &Record<'_>) {}

    fn record_follows_from(&self, _: &Id, _: &Id) {}

    fn event(&self, event: &Event<'_>) {
        if DEPTH.replace(DEPTH.get() + 1) > 0 {
            NESTED.fetch_add(1, Ordering::Relaxed);
        }

        let mut line = String::from(event.metadata().target());
        event.record(&mut |field: &Field, value: &dyn fmt::Debug| {
            let _ = write!(line, " {field}={value:?}");
        });
        drop(vec![line; 4]);

        EVENTS.fetch_add(1, Ordering::Relaxed);
        DEPTH.set(DEPTH.get() - 1);
    }

    fn enter(&self, _: &Id) {}

    fn exit(&self, _: &Id) {}
}

#[test]
fn test_allocating_subscriber_does_not_recurse() {
    tracing::subscriber::with_default(Formatting, || {
        let words: Vec<String> = (0..100).map(|i| format!("word {i}")).collect();
        let mut grown = Vec::new();
        for i in 0..5_000u32 {
            grown.push(i);
        }
        assert_eq!(words.len(), 100);
        assert_eq!(grown[4_999], 4_999);
    });

    // Allocations made while formatting were not reported back.
    assert!(EVENTS.load(Ordering::Relaxed) > 100);
    assert_eq!(NESTED.load(Ordering::Relaxed), 0);
    MapAlloc::heap().verify().expect("heap corrupted");
}
