//! Multi-threaded integration test: one global heap shared by many threads.

use mapalloc::MapAlloc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

#[global_allocator]
static GLOBAL: MapAlloc = MapAlloc;

#[test]
fn test_cross_thread_free() {
    const PRODUCERS: u8 = 4;
    const ITEMS: usize = 500;

    let (tx, rx) = mpsc::channel::<(u8, Vec<Box<[u8; 200]>>)>();
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|t| {
            let tx = tx.clone();
            std::thread::spawn(move || {
                let items = (0..ITEMS).map(|_| Box::new([t; 200])).collect();
                tx.send((t, items)).unwrap();
            })
        })
        .collect();
    drop(tx);

    // Released on a thread that never allocated them.
    let consumer = std::thread::spawn(move || {
        let mut total = 0;
        for (t, items) in rx {
            assert!(items.iter().all(|item| item.iter().all(|&b| b == t)));
            total += items.len();
        }
        total
    });

    for p in producers {
        p.join().unwrap();
    }
    assert_eq!(consumer.join().unwrap(), PRODUCERS as usize * ITEMS);

    let stats = MapAlloc::heap().verify().expect("heap corrupted");
    assert!(stats.held_bytes >= stats.used_bytes + stats.free_bytes);
}

#[test]
fn test_verify_while_threads_churn() {
    let stop = Arc::new(AtomicBool::new(false));
    let workers: Vec<_> = (0..6)
        .map(|t| {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut live: Vec<Vec<u8>> = Vec::new();
                let mut i = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    let len = 1 + (i * 37 + t * 101) % 6000;
                    live.push(vec![t as u8; len]);
                    if live.len() > 32 {
                        let old = live.swap_remove(i % live.len());
                        assert!(old.iter().all(|&b| b == t as u8), "block clobbered");
                    }
                    i += 1;
                }
            })
        })
        .collect();

    for _ in 0..200 {
        MapAlloc::heap().verify().expect("heap corrupted");
    }
    stop.store(true, Ordering::Relaxed);
    for w in workers {
        w.join().unwrap();
    }
    MapAlloc::heap().verify().expect("heap corrupted");
}

#[test]
fn test_realloc_race() {
    let handles: Vec<_> = (0..8)
        .map(|t| {
            std::thread::spawn(move || {
                let mut s = String::new();
                for i in 0..2_000 {
                    s.push(char::from(b'a' + ((t + i) % 26) as u8));
                }
                assert_eq!(s.len(), 2_000);
                assert!(s.bytes().enumerate().all(|(i, b)| b == b'a' + ((t + i) % 26) as u8));
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    MapAlloc::heap().verify().expect("heap corrupted");
}
