//! Draining shutdown and blocking removal across threads

use esox_resourcepool::{PoolError, ResourcePool};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Threaded Examples ===\n");

    // Example 1: close() waits for holders
    draining_close();

    // Example 2: remove() waits for the holder
    blocking_remove();

    // Example 3: close_now() wakes blocked acquirers
    forced_close();
}

fn draining_close() {
    println!("1. Draining Close:");
    let pool = Arc::new(ResourcePool::new());
    pool.open().unwrap();
    pool.add(1).unwrap();
    let held = pool.acquire().unwrap();

    let holder = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            println!("   Holder releasing {}", held);
            pool.release(&held).unwrap();
        })
    };

    pool.close().unwrap();
    println!("   close() returned, open: {}\n", pool.is_open());
    holder.join().unwrap();
}

fn blocking_remove() {
    println!("2. Blocking Remove:");
    let pool = Arc::new(ResourcePool::new());
    pool.open().unwrap();
    pool.add(5).unwrap();
    let held = pool.acquire().unwrap();

    let remover = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.remove(&5))
    };

    thread::sleep(Duration::from_millis(100));
    pool.release(&held).unwrap();
    println!("   remove(5) -> {:?}", remover.join().unwrap());
    println!("   Still registered: {}\n", pool.contains(&5));
}

fn forced_close() {
    println!("3. Forced Close:");
    let pool: Arc<ResourcePool<u32>> = Arc::new(ResourcePool::new());
    pool.open().unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.acquire())
    };

    while pool.waiting_acquirers() == 0 {
        thread::sleep(Duration::from_millis(5));
    }
    pool.close_now().unwrap();
    let result = waiter.join().unwrap();
    assert_eq!(result, Err(PoolError::NotOpen));
    println!("   Blocked acquire after close_now: {:?}", result);
}
