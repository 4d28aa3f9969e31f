//! Simulates one frame's worth of engine subsystem traffic against the
//! pool: extraction and command recording at high priority, asset
//! streaming trickling in at low priority, and a burst of acceleration
//! structure refits with a demand hint.
//!
//! Run with `cargo run --example engine_frame`.

use std::time::Duration;

use renderpool::{logging, PoolConfig, ThreadPool};
use renderpool_api::{Priority, SubsystemConfig, SubsystemTag, WorkItem, WorkPayload};

fn main() -> anyhow::Result<()> {
    logging::init_default();

    let pool = ThreadPool::new(PoolConfig::default());
    pool.register_subsystem(
        SubsystemConfig::new(SubsystemTag::EntityExtract, 4)
            .with_min_workers(1)
            .with_default_priority(Priority::High),
    )?;
    pool.register_subsystem(
        SubsystemConfig::new(SubsystemTag::CommandRecord, 4)
            .with_default_priority(Priority::Critical),
    )?;
    pool.register_subsystem(SubsystemConfig::new(SubsystemTag::AccelBuild, 2))?;
    pool.register_subsystem(
        SubsystemConfig::new(SubsystemTag::AssetStream, 2)
            .with_default_priority(Priority::Low),
    )?;

    pool.set_worker_count_changed(|old, new| {
        println!("workers: {old} -> {new}");
    });
    pool.start(2)?;

    let (done_tx, done_rx) = flume::unbounded::<&'static str>();

    // Frame-critical extraction slices.
    for slice in 0..8 {
        let tx = done_tx.clone();
        pool.submit_job(
            WorkPayload::EntityExtract { view: 0, slice },
            Box::new(move || {
                std::thread::sleep(Duration::from_millis(3));
                let _ = tx.send("extract");
            }),
        )?;
    }

    // Burst of accel refits; hint the pool so it can grow ahead of time.
    let granted = pool.request_workers(SubsystemTag::AccelBuild, 2);
    println!("accel-build granted {granted} workers");
    for mesh_id in 0..4 {
        let tx = done_tx.clone();
        pool.submit_job(
            WorkPayload::AccelBuild { mesh_id },
            Box::new(move || {
                std::thread::sleep(Duration::from_millis(10));
                let _ = tx.send("accel");
            }),
        )?;
    }

    // Background streaming, explicitly low priority anyway.
    for i in 0..3 {
        let tx = done_tx.clone();
        pool.submit(WorkItem::new(
            Priority::Low,
            WorkPayload::AssetStream {
                path: format!("textures/tile_{i}.ktx2").into(),
            },
            Box::new(move || {
                std::thread::sleep(Duration::from_millis(20));
                let _ = tx.send("stream");
            }),
        ))?;
    }
    drop(done_tx);

    for label in done_rx.iter() {
        println!("finished: {label}");
    }

    let stats = pool.statistics();
    println!(
        "processed={} failed={} peak_workers={} avg_exec={:?}",
        stats.processed, stats.failed, stats.peak_workers, stats.avg_exec_time
    );
    pool.shutdown();
    Ok(())
}
