//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::ResourcePool;
///
/// let pool = ResourcePool::new();
/// pool.open().unwrap();
/// pool.add(7).unwrap();
///
/// let r = pool.acquire().unwrap();
/// let metrics = pool.metrics();
/// assert_eq!(metrics.total_acquired, 1);
/// assert_eq!(metrics.acquired_resources, 1);
/// pool.release(&r).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Total successful acquisitions
    pub total_acquired: usize,

    /// Total resources moved back to the free set by `release`
    pub total_released: usize,

    /// Total resources registered by `add`
    pub total_added: usize,

    /// Total resources deregistered by `remove` or `remove_now`
    pub total_removed: usize,

    /// Resources taken away from a holder by `remove_now`
    pub total_revoked: usize,

    /// Resources dropped because they failed validation on release
    pub validation_failures: usize,

    /// Timed acquisitions that gave up
    pub acquire_timeouts: usize,

    /// Number of times the pool has been opened
    pub epochs_opened: usize,

    /// Resources registered in the current epoch
    pub registered_resources: usize,

    /// Resources currently free
    pub free_resources: usize,

    /// Resources currently held by callers
    pub acquired_resources: usize,

    /// Threads parked waiting for a free resource
    pub waiting_acquirers: usize,

    /// Threads parked in a draining close
    pub waiting_closers: usize,

    /// Threads parked waiting to remove an acquired resource
    pub waiting_removers: usize,

    /// Current epoch, 0 while closed
    pub epoch: u64,

    pub is_open: bool,

    /// Share of registered resources currently acquired (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_added".to_string(), self.total_added.to_string());
        metrics.insert("total_removed".to_string(), self.total_removed.to_string());
        metrics.insert("total_revoked".to_string(), self.total_revoked.to_string());
        metrics.insert("validation_failures".to_string(), self.validation_failures.to_string());
        metrics.insert("acquire_timeouts".to_string(), self.acquire_timeouts.to_string());
        metrics.insert("epochs_opened".to_string(), self.epochs_opened.to_string());
        metrics.insert("registered_resources".to_string(), self.registered_resources.to_string());
        metrics.insert("free_resources".to_string(), self.free_resources.to_string());
        metrics.insert("acquired_resources".to_string(), self.acquired_resources.to_string());
        metrics.insert("waiting_acquirers".to_string(), self.waiting_acquirers.to_string());
        metrics.insert("waiting_closers".to_string(), self.waiting_closers.to_string());
        metrics.insert("waiting_removers".to_string(), self.waiting_removers.to_string());
        metrics.insert("epoch".to_string(), self.epoch.to_string());
        metrics.insert("is_open".to_string(), self.is_open.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{PoolConfiguration, ResourcePool};
    /// use std::collections::HashMap;
    ///
    /// let pool: ResourcePool<u32> =
    ///     ResourcePool::with_config(PoolConfiguration::new().with_name("db"));
    /// pool.open().unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus(Some(&tags));
    /// assert!(output.contains("resourcepool_resources_acquired{pool=\"db\""));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        Self::push_family(&mut output, &labels, "resourcepool_resources_registered", "gauge",
            "Resources registered in the current epoch", metrics.registered_resources);
        Self::push_family(&mut output, &labels, "resourcepool_resources_free", "gauge",
            "Resources available for acquisition", metrics.free_resources);
        Self::push_family(&mut output, &labels, "resourcepool_resources_acquired", "gauge",
            "Resources held by callers", metrics.acquired_resources);
        Self::push_family(&mut output, &labels, "resourcepool_waiting_acquirers", "gauge",
            "Threads blocked waiting for a resource", metrics.waiting_acquirers);
        Self::push_family(&mut output, &labels, "resourcepool_waiting_closers", "gauge",
            "Threads blocked in a draining close", metrics.waiting_closers);
        Self::push_family(&mut output, &labels, "resourcepool_waiting_removers", "gauge",
            "Threads blocked removing an acquired resource", metrics.waiting_removers);
        Self::push_family(&mut output, &labels, "resourcepool_open", "gauge",
            "Whether the pool is open", usize::from(metrics.is_open));

        output.push_str("# HELP resourcepool_utilization Share of registered resources acquired\n");
        output.push_str("# TYPE resourcepool_utilization gauge\n");
        output.push_str(&format!("resourcepool_utilization{{{}}} {:.2}\n", labels, metrics.utilization));

        // Counter metrics
        Self::push_family(&mut output, &labels, "resourcepool_acquired_total", "counter",
            "Total successful acquisitions", metrics.total_acquired);
        Self::push_family(&mut output, &labels, "resourcepool_released_total", "counter",
            "Total releases back to the free set", metrics.total_released);
        Self::push_family(&mut output, &labels, "resourcepool_added_total", "counter",
            "Total resources added", metrics.total_added);
        Self::push_family(&mut output, &labels, "resourcepool_removed_total", "counter",
            "Total resources removed", metrics.total_removed);
        Self::push_family(&mut output, &labels, "resourcepool_revoked_total", "counter",
            "Resources revoked from their holder", metrics.total_revoked);
        Self::push_family(&mut output, &labels, "resourcepool_validation_failures_total", "counter",
            "Resources discarded on release", metrics.validation_failures);
        Self::push_family(&mut output, &labels, "resourcepool_acquire_timeouts_total", "counter",
            "Timed acquisitions that expired", metrics.acquire_timeouts);
        Self::push_family(&mut output, &labels, "resourcepool_epochs_total", "counter",
            "Number of times the pool was opened", metrics.epochs_opened);

        output
    }

    fn push_family(output: &mut String, labels: &str, name: &str, kind: &str, help: &str, value: usize) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Live gauges read under the pool lock
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Gauges {
    pub registered: usize,
    pub free: usize,
    pub acquired: usize,
    pub waiting_acquirers: usize,
    pub waiting_closers: usize,
    pub waiting_removers: usize,
    pub epoch: u64,
    pub is_open: bool,
}

/// Internal metrics tracker
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_added: AtomicUsize,
    pub total_removed: AtomicUsize,
    pub total_revoked: AtomicUsize,
    pub validation_failures: AtomicUsize,
    pub acquire_timeouts: AtomicUsize,
    pub epochs_opened: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, gauges: Gauges) -> PoolMetrics {
        let utilization = if gauges.registered > 0 {
            gauges.acquired as f64 / gauges.registered as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_added: self.total_added.load(Ordering::Relaxed),
            total_removed: self.total_removed.load(Ordering::Relaxed),
            total_revoked: self.total_revoked.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            acquire_timeouts: self.acquire_timeouts.load(Ordering::Relaxed),
            epochs_opened: self.epochs_opened.load(Ordering::Relaxed),
            registered_resources: gauges.registered,
            free_resources: gauges.free,
            acquired_resources: gauges.acquired,
            waiting_acquirers: gauges.waiting_acquirers,
            waiting_closers: gauges.waiting_closers,
            waiting_removers: gauges.waiting_removers,
            epoch: gauges.epoch,
            is_open: gauges.is_open,
            utilization,
        }
    }
}
