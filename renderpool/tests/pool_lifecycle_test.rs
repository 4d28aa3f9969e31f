//! Worker-scaling lifecycle tests: floor and ceiling invariants, demand
//! responsiveness, self-retirement, hooks, and restart.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use renderpool::{PoolConfig, ThreadPool};
use renderpool_api::{Priority, SubsystemConfig, SubsystemTag, WorkItem, WorkPayload};

use common::wait_until;

fn fast_retire_pool(max_workers: usize) -> ThreadPool {
    ThreadPool::new(
        PoolConfig::default()
            .with_max_workers(max_workers)
            .with_idle_sleep(Duration::from_millis(2))
            .with_idle_timeout(Duration::from_millis(50)),
    )
}

#[test]
fn start_zero_settles_at_the_combined_floor() {
    let pool = fast_retire_pool(8);
    pool.register_subsystem(
        SubsystemConfig::new(SubsystemTag::EntityExtract, 4).with_min_workers(1),
    )
    .unwrap();
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::RenderCache, 2).with_min_workers(2))
        .unwrap();

    pool.start(0).unwrap();
    assert_eq!(pool.live_workers(), 3);
    assert_eq!(pool.worker_phases().len(), 3);

    // Zero demand and an aggressive idle timeout: the floor must hold.
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(pool.live_workers(), 3);
    assert!(pool
        .worker_phases()
        .iter()
        .all(|p| *p != renderpool::WorkerPhase::ShuttingDown));

    pool.shutdown();
    assert_eq!(pool.live_workers(), 0);
}

#[test]
fn idle_workers_above_the_floor_retire_to_it() {
    let pool = fast_retire_pool(8);
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::AssetStream, 8).with_min_workers(2))
        .unwrap();

    pool.start(8).unwrap();
    assert_eq!(pool.live_workers(), 8);

    assert!(wait_until(Duration::from_secs(10), || {
        pool.live_workers() == 2
    }));
    // Settled, not still draining.
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(pool.live_workers(), 2);

    pool.shutdown();
}

#[test]
fn demand_grows_the_pool_to_the_subsystem_cap() {
    let pool = fast_retire_pool(4);
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::AccelBuild, 4))
        .unwrap();
    pool.start(0).unwrap();
    assert_eq!(pool.live_workers(), 0);

    let granted = pool.request_workers(SubsystemTag::AccelBuild, 4);
    assert_eq!(granted, 4);
    assert_eq!(pool.live_workers(), 4);

    pool.shutdown();
}

#[test]
fn ceiling_holds_under_cumulative_demand() {
    let pool = fast_retire_pool(4);
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::AssetStream, 4))
        .unwrap();
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::HotReload, 4))
        .unwrap();
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::CommandRecord, 4))
        .unwrap();
    pool.start(0).unwrap();

    pool.request_workers(SubsystemTag::AssetStream, 4);
    pool.request_workers(SubsystemTag::HotReload, 4);
    pool.request_workers(SubsystemTag::CommandRecord, 4);

    assert!(pool.live_workers() <= 4);
    assert_eq!(pool.target_workers(), 4);

    pool.shutdown();
}

#[test]
fn saturated_subsystem_grants_zero_but_work_still_queues() {
    let pool = fast_retire_pool(2);
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::AssetStream, 1))
        .unwrap();
    pool.start(1).unwrap();

    let (release_tx, release_rx) = flume::bounded::<()>(0);
    let (started_tx, started_rx) = flume::bounded::<()>(1);
    pool.submit(WorkItem::new(
        Priority::Normal,
        WorkPayload::AssetStream {
            path: "meshes/city.glb".into(),
        },
        Box::new(move || {
            let _ = started_tx.try_send(());
            let _ = release_rx.recv();
        }),
    ))
    .unwrap();
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("streaming job should start");

    // Cap 1, one active: nothing grantable right now.
    assert_eq!(pool.request_workers(SubsystemTag::AssetStream, 3), 0);

    // Submission never blocks on saturation.
    pool.submit(WorkItem::new(
        Priority::Normal,
        WorkPayload::AssetStream {
            path: "meshes/park.glb".into(),
        },
        Box::new(|| {}),
    ))
    .unwrap();
    assert!(pool.statistics().current_queue_size >= 1);

    drop(release_tx);
    assert!(wait_until(Duration::from_secs(5), || {
        pool.statistics().processed == 2
    }));
    pool.shutdown();
}

#[test]
fn worker_count_hook_sees_every_transition_and_exit_hook_every_thread() {
    let pool = fast_retire_pool(4);
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::RenderCache, 4).with_min_workers(1))
        .unwrap();

    let transitions: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = transitions.clone();
    pool.set_worker_count_changed(move |old, new| {
        seen.lock().unwrap().push((old, new));
    });
    let exits = Arc::new(AtomicUsize::new(0));
    let exit_counter = exits.clone();
    pool.set_thread_exit_hook(move || {
        exit_counter.fetch_add(1, Ordering::SeqCst);
    });

    pool.start(3).unwrap();
    assert_eq!(transitions.lock().unwrap().first(), Some(&(0, 3)));

    // Two idle workers retire down to the floor, then shutdown stops the
    // last one; every spawned thread runs the exit hook exactly once.
    assert!(wait_until(Duration::from_secs(10), || {
        pool.live_workers() == 1
    }));
    pool.shutdown();
    assert_eq!(exits.load(Ordering::SeqCst), 3);
    assert_eq!(transitions.lock().unwrap().last(), Some(&(1, 0)));

    let retirements: Vec<(usize, usize)> = transitions
        .lock()
        .unwrap()
        .iter()
        .copied()
        .filter(|(old, new)| old > new && *new > 0)
        .collect();
    assert_eq!(retirements.len(), 2);
}

#[test]
fn statistics_track_processed_work_and_peaks() {
    let pool = fast_retire_pool(2);
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::CommandRecord, 2))
        .unwrap();
    pool.start(0).unwrap();

    for pass in 0..5 {
        pool.submit(WorkItem::new(
            Priority::Normal,
            WorkPayload::CommandRecord { pass },
            Box::new(|| std::thread::sleep(Duration::from_millis(5))),
        ))
        .unwrap();
    }
    pool.scale_workers(2).unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        pool.statistics().processed == 5
    }));
    let stats = pool.statistics();
    assert_eq!(stats.failed, 0);
    assert!(stats.avg_exec_time >= Duration::from_millis(1));
    assert!(stats.peak_workers >= 2);
    assert!(stats.peak_queue_size >= 5);
    assert_eq!(stats.current_queue_size, 0);

    pool.shutdown();
}

#[test]
fn pool_restarts_after_shutdown() {
    let pool = fast_retire_pool(2);
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::EntityExtract, 2))
        .unwrap();
    pool.start(1).unwrap();
    pool.shutdown();

    let item = || {
        WorkItem::new(
            Priority::Normal,
            WorkPayload::EntityExtract { view: 0, slice: 0 },
            Box::new(|| {}),
        )
    };
    assert!(pool.submit(item()).is_err());

    pool.start(1).unwrap();
    pool.submit(item()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        pool.statistics().processed == 1
    }));
    pool.shutdown();
}
