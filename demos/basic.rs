//! Basic usage examples for ResourcePool

use esox_resourcepool::{PoolConfiguration, ReleaseOutcome, ResourcePool};
use std::time::Duration;

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Explicit acquire and release
    simple_pool();

    // Example 2: Guards and validation
    configured_pool();

    // Example 3: Try and timed acquisition
    try_methods();

    // Example 4: Membership changes
    membership();

    // Example 5: Metrics and health
    metrics_and_health();
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = ResourcePool::new();
    pool.open().unwrap();
    pool.add(5).unwrap();
    pool.add(6).unwrap();

    let first = pool.acquire().unwrap();
    let second = pool.acquire().unwrap();
    println!("   Acquired {} then {}", first, second);

    pool.release(&first).unwrap();
    println!("   Released {}, next acquire gets {}", first, pool.acquire().unwrap());

    pool.close_now().unwrap();
    println!("   Open after close_now: {}\n", pool.is_open());
}

fn configured_pool() {
    println!("2. Configured Pool:");

    let config = PoolConfiguration::new()
        .with_name("sockets")
        .with_validation(|port: &u16| *port >= 1024);

    let pool = ResourcePool::with_config(config);
    pool.open().unwrap();
    pool.add(8080).unwrap();
    println!("   Adding port 80: {:?}", pool.add(80));

    {
        let port = pool.acquire_guard().unwrap();
        println!("   Using port {}, acquired: {}", *port, pool.acquired_count());
    }

    println!("   After guard dropped - free: {}\n", pool.free_count());
}

fn try_methods() {
    println!("3. Try Methods:");
    let pool = ResourcePool::new();
    pool.open().unwrap();
    pool.add(42).unwrap();

    let held = pool.try_acquire().unwrap();
    println!("   First try: {:?}", held);

    let second = pool.acquire_timeout(Duration::from_millis(50)).unwrap();
    println!("   Timed try while held: {:?}", second);

    if let Some(r) = held {
        pool.release(&r).unwrap();
    }
    println!("   After release: {:?}\n", pool.try_acquire().unwrap());
}

fn membership() {
    println!("4. Membership:");
    let pool = ResourcePool::new();
    pool.open().unwrap();
    pool.add("a").unwrap();
    pool.add("b").unwrap();

    println!("   remove(\"a\") while free: {}", pool.remove(&"a").unwrap());

    let b = pool.acquire().unwrap();
    println!("   remove_now(\"b\") while held: {}", pool.remove_now(&b).unwrap());
    let outcome = pool.release(&b).unwrap();
    assert_eq!(outcome, ReleaseOutcome::Revoked);
    println!("   Holder's release afterwards: {:?}\n", outcome);
}

fn metrics_and_health() {
    println!("5. Metrics and Health:");
    let pool = ResourcePool::new();
    pool.open().unwrap();
    for id in 1..=5 {
        pool.add(id).unwrap();
    }

    {
        let _a = pool.acquire_guard().unwrap();
        let _b = pool.acquire_guard().unwrap();

        let health = pool.health_status();
        println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
        println!("   Utilization: {:.1}%", health.utilization * 100.0);
        println!("   Acquired: {}, Free: {}", health.acquired_resources, health.free_resources);
    }

    let metrics = pool.export_metrics();
    println!("\n   Metrics:");
    let mut keys: Vec<_> = metrics.keys().collect();
    keys.sort();
    for key in keys {
        println!("     {}: {}", key, metrics[key]);
    }
}
