//! Async usage examples

use esox_resourcepool::{PoolConfiguration, ResourcePool};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ResourcePool - Async Examples ===\n");

    // Example 1: Async acquire
    async_acquire().await;

    // Example 2: Async acquire with timeout
    async_with_timeout().await;

    // Example 3: Concurrent tasks sharing a pool
    concurrent_access().await;
}

async fn async_acquire() {
    println!("1. Async Acquire:");
    let pool = Arc::new(ResourcePool::new());
    pool.open().unwrap();
    pool.add(1).unwrap();

    let r = pool.acquire_async(Duration::from_secs(1)).await.unwrap();
    println!("   Got resource asynchronously: {:?}", r);
    println!();
}

async fn async_with_timeout() {
    println!("2. Async with Timeout:");
    let pool = Arc::new(ResourcePool::with_config(
        PoolConfiguration::new().with_timeout(Duration::from_millis(100)),
    ));
    pool.open().unwrap();
    pool.add(42).unwrap();

    let _held = pool.acquire().unwrap();
    let result = pool.acquire_async_default().await;
    println!("   Second acquire (configured timeout): {:?}", result);
    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");
    let pool = Arc::new(ResourcePool::new());
    pool.open().unwrap();
    for id in 1..=3 {
        pool.add(id).unwrap();
    }

    let mut handles = vec![];
    for task in 0..6 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            if let Ok(Some(r)) = pool.acquire_async(Duration::from_secs(1)).await {
                println!("   Task {} got resource {}", task, r);
                sleep(Duration::from_millis(20)).await;
                pool.release(&r).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    pool.close().unwrap();
    println!("   All tasks done, pool open: {}", pool.is_open());
}
