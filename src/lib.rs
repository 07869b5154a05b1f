//! # EsoxSolutions.ResourcePool
//!
//! Identity-tracked, thread-safe resource pool for Rust. Resources are
//! opaque, hashable values (connection ids, handles, `Arc`s) that callers
//! check out and return explicitly; the pool never creates or destroys them.
//!
//! ## Features
//!
//! - Blocking, timed and non-blocking acquisition with FIFO resource order
//! - Dynamic membership: add, wait-for-release remove, and immediate removal
//! - Draining `close` and immediate `close_now`, reopenable in fresh epochs
//! - RAII guards that release on drop
//! - Validation on add and release
//! - Health snapshots and metrics with Prometheus export
//! - Async bridge on tokio's blocking pool
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::ResourcePool;
//!
//! let pool = ResourcePool::new();
//! pool.open().unwrap();
//! pool.add("conn-1").unwrap();
//! {
//!     let conn = pool.acquire_guard().unwrap();
//!     println!("Got: {}", *conn);
//!     // Resource automatically released when `conn` goes out of scope
//! }
//! pool.close().unwrap();
//! ```

mod pool;
mod config;
mod metrics;
mod health;
mod errors;

pub use pool::{MembershipStatus, PooledResource, ReleaseOutcome, ResourcePool};
pub use config::PoolConfiguration;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use health::HealthStatus;
pub use errors::{PoolError, PoolResult};
