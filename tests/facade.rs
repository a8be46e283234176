//! End-to-end tests of the assembled facade on a temporary directory.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loggerhead::prelude::*;

fn core_in(dir: &std::path::Path) -> Loggerhead {
    let _ = env_logger::builder().is_test(true).try_init();
    LoggerheadBuilder::new()
        .cache_directory(dir)
        .build()
        .expect("facade should assemble")
}

#[test]
fn write_through_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let core = core_in(dir.path());
        core.put("stable-key", b"persisted payload".to_vec()).unwrap();
        assert_eq!(core.get("stable-key"), Some(b"persisted payload".to_vec()));
        core.shutdown();
    }

    // A fresh instance over the same directory recovers the entry from disk.
    let core = core_in(dir.path());
    assert_eq!(core.get("stable-key"), Some(b"persisted payload".to_vec()));
}

#[test]
fn disk_hit_promotes_back_into_memory() {
    let dir = tempfile::tempdir().unwrap();
    let core = LoggerheadBuilder::new()
        .cache_directory(dir.path())
        .memory_max_items(1)
        .build()
        .unwrap();

    core.put("a", b"first".to_vec()).unwrap();
    core.put("b", b"second".to_vec()).unwrap();

    // "a" was evicted from the one-slot memory tier but persists on disk;
    // the read promotes it and records a memory hit afterwards.
    assert_eq!(core.get("a"), Some(b"first".to_vec()));
    assert_eq!(core.get("a"), Some(b"first".to_vec()));
    let stats = core.stats();
    assert!(stats.memory.hits >= 1);
    assert!(stats.disk.hits >= 1);
}

#[test]
fn concurrent_misses_run_the_loader_once() {
    let dir = tempfile::tempdir().unwrap();
    let core = Arc::new(core_in(dir.path()));
    let loads = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let core = Arc::clone(&core);
            let loads = Arc::clone(&loads);
            std::thread::spawn(move || {
                core.get_or_load("expensive", move || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    Ok(b"computed".to_vec())
                })
                .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), b"computed".to_vec());
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn overload_samples_throttle_and_recover() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CoreConfig::default();
    config.disk_tier.directory = dir.path().to_path_buf();
    config.monitor.metrics_window_size = 3;
    config.monitor.recovery_samples = 3;
    let core = LoggerheadBuilder::new().config(config).build().unwrap();

    assert!(!core.should_throttle());
    for _ in 0..3 {
        core.record_sample(ResourceSample::now(4096.0, 10.0, 1.0, 1.0, 100.0));
    }
    assert!(core.should_throttle());
    let report = core.performance_report();
    assert!(report.throttling);
    assert!(report.load_ratio > 1.0);
    assert!(!report.recommendations.is_empty());

    for _ in 0..3 {
        core.record_sample(ResourceSample::now(10.0, 10.0, 1.0, 1.0, 100.0));
    }
    assert!(!core.should_throttle());
}

#[test]
fn submitted_jobs_execute_and_pool_reports_size() {
    let dir = tempfile::tempdir().unwrap();
    let core = core_in(dir.path());
    assert_eq!(core.worker_count(), 2);

    let done = Arc::new(AtomicU32::new(0));
    for _ in 0..4 {
        let done = Arc::clone(&done);
        assert!(core.submit(move || {
            done.fetch_add(1, Ordering::SeqCst);
        }));
    }
    for _ in 0..100 {
        if done.load(Ordering::SeqCst) == 4 {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(done.load(Ordering::SeqCst), 4);

    core.shutdown();
    assert_eq!(core.worker_count(), 0);
}

#[test]
fn invalidate_removes_from_both_tiers() {
    let dir = tempfile::tempdir().unwrap();
    let core = core_in(dir.path());
    core.put("gone", b"soon".to_vec()).unwrap();
    core.invalidate("gone");
    assert_eq!(core.get("gone"), None);

    // Still gone after a restart, so the disk copy was removed too.
    core.shutdown();
    drop(core);
    let core = core_in(dir.path());
    assert_eq!(core.get("gone"), None);
}
