//! Health monitoring for resource pools

use crate::metrics::PoolMetrics;

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::ResourcePool;
///
/// let pool = ResourcePool::new();
/// pool.open().unwrap();
/// pool.add("conn-a").unwrap();
///
/// let health = pool.health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.free_resources, 1);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    pub is_open: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Share of registered resources currently acquired (0.0 to 1.0)
    pub utilization: f64,

    pub free_resources: usize,

    pub acquired_resources: usize,

    pub registered_resources: usize,

    /// Threads parked in `acquire`
    pub waiting_acquirers: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn from_metrics(metrics: &PoolMetrics) -> Self {
        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if !metrics.is_open {
            warnings.push("Pool is closed".to_string());
            is_healthy = false;
        } else {
            if metrics.registered_resources == 0 {
                warnings.push("Pool has no registered resources".to_string());
            } else if metrics.free_resources == 0 {
                warnings.push("All resources are acquired".to_string());
            }

            if metrics.waiting_acquirers > 0 && metrics.free_resources == 0 {
                warnings.push(format!("{} thread(s) waiting for a resource", metrics.waiting_acquirers));
                is_healthy = false;
            }
        }

        Self {
            is_healthy,
            is_open: metrics.is_open,
            warning_count: warnings.len(),
            utilization: metrics.utilization,
            free_resources: metrics.free_resources,
            acquired_resources: metrics.acquired_resources,
            registered_resources: metrics.registered_resources,
            waiting_acquirers: metrics.waiting_acquirers,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
