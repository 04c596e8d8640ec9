//! Basic integration test: std collections on top of mapalloc as the global
//! allocator, checked against the heap's own view of its records.

use mapalloc::{MapAlloc, METADATA_SIZE};
use std::sync::{Mutex, MutexGuard};

#[global_allocator]
static GLOBAL: MapAlloc = MapAlloc;

// Every test here reads global heap state, so they take turns.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Header address of the last record in the directory.
fn last_record() -> Option<usize> {
    let mut last = None;
    MapAlloc::heap().walk(|info| last = Some(info.address));
    last
}

#[test]
fn test_vec_grows_into_freed_block() {
    let _serial = serial();
    // Larger than anything else this binary frees in the middle of the list.
    const BIG: usize = 4 << 20;
    let heap = MapAlloc::heap();

    // Allocated first so it cannot be carved out of the hole.
    let mut v: Vec<u32> = (0..64).collect();

    let hole: Vec<u8> = Vec::with_capacity(BIG);
    let pin: Vec<u8> = Vec::with_capacity(BIG);
    drop(hole);
    assert!(heap.stats().free_bytes >= BIG, "freed record was unmapped");

    let held = heap.held_bytes();
    v.reserve_exact(BIG / size_of::<u32>() - v.len());

    // The realloc landed in the free record instead of mapping more memory.
    assert!(heap.held_bytes() < held + BIG);
    assert!(v.iter().enumerate().all(|(i, &x)| x == i as u32));
    drop(v);
    drop(pin);
    heap.verify().expect("heap corrupted");
}

#[test]
fn test_tail_string_is_returned_on_drop() {
    let _serial = serial();
    const LEN: usize = 16 << 20;
    let heap = MapAlloc::heap();

    let s = "m".repeat(LEN);
    assert_eq!(last_record(), Some(s.as_ptr() as usize - METADATA_SIZE));
    let held = heap.held_bytes();
    drop(s);
    assert!(heap.held_bytes() + LEN <= held);
    heap.verify().expect("heap corrupted");
}

#[test]
fn test_vec_growth_preserves_contents() {
    let _serial = serial();
    // Every push past capacity goes through realloc.
    let mut v: Vec<u32> = Vec::new();
    for i in 0..10_000 {
        v.push(i);
    }
    assert!(v.iter().enumerate().all(|(i, &x)| x == i as u32));
    v.shrink_to_fit();
    assert_eq!(v[9_999], 9_999);
}

#[test]
fn test_boxes_are_usable_to_their_rounded_size() {
    let _serial = serial();
    let heap = MapAlloc::heap();
    for len in [1usize, 15, 16, 17, 100, 4095] {
        let b = vec![0x5Au8; len].into_boxed_slice();
        let handle = core::ptr::NonNull::new(b.as_ptr() as *mut u8).unwrap();
        let usable = unsafe { heap.usable_size(handle) };
        assert!(usable >= len.next_multiple_of(16));
        assert_eq!(usable % 16, 0);
    }
}

#[test]
fn test_overaligned_types() {
    let _serial = serial();
    #[repr(align(128))]
    struct Padded([u8; 40]);

    let boxes: Vec<Box<Padded>> = (0..64).map(|i| Box::new(Padded([i as u8; 40]))).collect();
    for (i, b) in boxes.iter().enumerate() {
        assert_eq!(&**b as *const Padded as usize % 128, 0);
        assert_eq!(b.0[39], i as u8);
    }
}

#[test]
fn test_zeroed_vec() {
    let _serial = serial();
    let v = vec![0u64; 4096];
    assert!(v.iter().all(|&x| x == 0));
}

#[test]
fn test_heap_consistent_after_churn() {
    let _serial = serial();
    for round in 0..20 {
        let v: Vec<String> = (0..100).map(|i| format!("{round}:{i}")).collect();
        drop(v);
    }
    let stats = MapAlloc::heap().verify().expect("heap corrupted");
    assert!(stats.held_bytes >= stats.used_bytes + stats.free_bytes);
}
