//! Integrity of the concurrent map under many threads

use std::sync::Arc;
use std::thread;

use synckit::ConcurrentMap;

#[test]
fn test_last_write_per_thread_is_visible() {
    let map: ConcurrentMap<String, usize> = ConcurrentMap::new();

    thread::scope(|s| {
        for t in 0..8 {
            let map = &map;
            s.spawn(move || {
                for round in 0..50 {
                    for k in 0..20 {
                        map.set(format!("t{t}-k{k}"), round);
                        let _ = map.get(&format!("t{}-k{}", (t + 1) % 8, k));
                        let _ = map.keys();
                    }
                }
            });
        }
    });

    assert_eq!(map.len(), 8 * 20);
    for t in 0..8 {
        for k in 0..20 {
            assert_eq!(map.get(&format!("t{t}-k{k}")), Some(49));
        }
    }
}

#[test]
fn test_deletes_race_with_readers() {
    let map = Arc::new((0..1_000).map(|i| (i, i * 2)).collect::<ConcurrentMap<u32, u32>>());

    let deleter = {
        let map = Arc::clone(&map);
        thread::spawn(move || {
            for i in (0..1_000).step_by(2) {
                assert_eq!(map.delete(&i), Some(i * 2));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for _ in 0..20 {
                    // Every snapshot entry is internally consistent
                    for (k, v) in map.snapshot() {
                        assert_eq!(v, k * 2);
                    }
                    map.for_each(|k, v| assert_eq!(*v, k * 2));
                }
            })
        })
        .collect();

    deleter.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(map.len(), 500);
    let mut keys = map.keys();
    keys.sort_unstable();
    assert!(keys.iter().all(|k| k % 2 == 1));
}

#[test]
fn test_shared_handle_sees_every_write() {
    // Shared through a reference-counted handle, never copied
    let map = Arc::new(ConcurrentMap::new());
    let writer = Arc::clone(&map);

    thread::spawn(move || {
        writer.set("key", 1);
    })
    .join()
    .unwrap();

    assert_eq!(map.get(&"key"), Some(1));
    assert_eq!(Arc::strong_count(&map), 1);
}
