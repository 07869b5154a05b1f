// EsoxSolutions.ResourcePool
// Small driver showing a pool shared between worker threads.
// Run with: cargo run --features demo
// Run examples with: cargo run --example basic

use esox_resourcepool::{PoolConfiguration, PoolResult, ResourcePool};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let pool = Arc::new(ResourcePool::with_config(
        PoolConfiguration::new().with_name("demo").with_timeout(Duration::from_secs(2)),
    ));
    pool.open()?;
    for id in 1..=3u32 {
        pool.add(id)?;
    }

    let workers: Vec<_> = (0..6)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || -> PoolResult<()> {
                if let Some(conn) = pool.acquire_guard_timeout(Duration::from_secs(2))? {
                    info!(worker, conn = *conn, "working");
                    thread::sleep(Duration::from_millis(50));
                }
                Ok(())
            })
        })
        .collect();

    for worker in workers {
        match worker.join() {
            Ok(result) => result?,
            Err(_) => tracing::error!("worker panicked"),
        }
    }

    let metrics = pool.metrics();
    info!(acquired = metrics.total_acquired, released = metrics.total_released, "workers done");
    pool.close()?;
    info!(open = pool.is_open(), "pool closed");
    Ok(())
}
