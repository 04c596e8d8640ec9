//! Workloads shared by the allocator benchmarks.
//!
//! Every workload drives a `GlobalAlloc` directly, so allocators can be
//! compared side by side in one binary without swapping the global one.

use std::alloc::{GlobalAlloc, Layout};
use std::hint::black_box;

/// Allocate and immediately free one block, `rounds` times.
pub fn alloc_free(alloc: &dyn GlobalAlloc, size: usize, rounds: usize) {
    let layout = Layout::from_size_align(size, 8).unwrap();
    for _ in 0..rounds {
        unsafe {
            let p = alloc.alloc(layout);
            black_box(p);
            alloc.dealloc(p, layout);
        }
    }
}

/// Keep `live` blocks around and free every other one before refilling,
/// the pattern first-fit reuse is meant for.
pub fn checkerboard(alloc: &dyn GlobalAlloc, size: usize, live: usize) {
    let layout = Layout::from_size_align(size, 8).unwrap();
    let mut ptrs: Vec<*mut u8> = (0..live).map(|_| unsafe { alloc.alloc(layout) }).collect();
    for p in ptrs.iter_mut().step_by(2) {
        unsafe { alloc.dealloc(*p, layout) };
        *p = unsafe { alloc.alloc(layout) };
    }
    for p in ptrs {
        unsafe { alloc.dealloc(black_box(p), layout) };
    }
}

/// Grow one buffer by doubling up to `max`.
pub fn grow(alloc: &dyn GlobalAlloc, max: usize) {
    let mut layout = Layout::from_size_align(16, 8).unwrap();
    let mut p = unsafe { alloc.alloc(layout) };
    while layout.size() < max {
        let new_size = layout.size() * 2;
        p = unsafe { alloc.realloc(p, layout, new_size) };
        layout = Layout::from_size_align(new_size, 8).unwrap();
    }
    unsafe { alloc.dealloc(black_box(p), layout) };
}
