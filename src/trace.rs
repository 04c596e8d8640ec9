//! Optional `tracing` events (feature `debug`).
//!
//! Events are only fired after the heap lock has been dropped. A subscriber
//! that allocates will re-enter the heap, so a per-thread flag suppresses
//! nested events instead of recursing.

#[cfg(feature = "debug")]
use core::cell::Cell;

#[cfg(feature = "debug")]
thread_local! {
    static IN_EVENT: Cell<bool> = const { Cell::new(false) };
}

/// Run `emit` unless this thread is already emitting.
/// Silently skips during TLS teardown.
#[cfg(feature = "debug")]
pub(crate) fn guarded(emit: impl FnOnce()) {
    let entered = IN_EVENT.try_with(|flag| !flag.replace(true)).unwrap_or(false);
    if !entered {
        return;
    }
    emit();
    let _ = IN_EVENT.try_with(|flag| flag.set(false));
}

#[cfg(feature = "debug")]
macro_rules! heap_event {
    ($level:ident, $($arg:tt)+) => {
        $crate::trace::guarded(|| ::tracing::$level!(target: "mapalloc", $($arg)+))
    };
}

#[cfg(not(feature = "debug"))]
macro_rules! heap_event {
    ($level:ident, $($arg:tt)+) => {};
}
