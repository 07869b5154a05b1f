//! Core resource pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::metrics::{Gauges, MetricsExporter, MetricsTracker, PoolMetrics};

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::ops::Deref;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Where a registered resource currently sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipStatus {
    /// Waiting in the free queue
    Free,

    /// Checked out by a caller
    Acquired,
}

/// What `release` did with the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseOutcome {
    /// Moved from acquired to the tail of the free queue
    Released,

    /// The resource was already free; nothing changed
    AlreadyFree,

    /// The resource was taken away by `remove_now` while it was held.
    /// Reported once per revocation.
    Revoked,

    /// The resource failed validation on release and was dropped from the pool
    Discarded,
}

#[derive(Debug, Clone, Copy)]
struct Membership {
    ticket: u64,
    status: MembershipStatus,
}

/// Membership state for one open/close cycle.
///
/// `free` may hold stale entries for resources that were removed while free;
/// an entry is live only when the registry still marks that resource free
/// under the same ticket.
struct Epoch<R> {
    id: u64,
    registry: HashMap<R, Membership>,
    free: VecDeque<(R, u64)>,
    free_count: usize,
    acquired_count: usize,
    revoked: HashSet<R>,
    next_ticket: u64,
}

impl<R: Eq + Hash + Clone> Epoch<R> {
    fn new(id: u64) -> Self {
        Self {
            id,
            registry: HashMap::new(),
            free: VecDeque::new(),
            free_count: 0,
            acquired_count: 0,
            revoked: HashSet::new(),
            next_ticket: 0,
        }
    }

    fn status_of(&self, resource: &R) -> Option<MembershipStatus> {
        self.registry.get(resource).map(|m| m.status)
    }

    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Register a new resource at the tail of the free queue
    fn register(&mut self, resource: R) {
        let ticket = self.issue_ticket();
        self.registry.insert(
            resource.clone(),
            Membership { ticket, status: MembershipStatus::Free },
        );
        self.free.push_back((resource, ticket));
        self.free_count += 1;
    }

    /// Move an acquired resource to the tail of the free queue
    fn mark_free(&mut self, resource: &R) {
        let ticket = self.issue_ticket();
        if let Some(membership) = self.registry.get_mut(resource) {
            membership.ticket = ticket;
            membership.status = MembershipStatus::Free;
            self.free.push_back((resource.clone(), ticket));
            self.acquired_count -= 1;
            self.free_count += 1;
        }
    }

    fn pop_free(&mut self) -> Option<R> {
        while let Some((resource, ticket)) = self.free.pop_front() {
            match self.registry.get_mut(&resource) {
                Some(m) if m.status == MembershipStatus::Free && m.ticket == ticket => {
                    m.status = MembershipStatus::Acquired;
                    self.free_count -= 1;
                    self.acquired_count += 1;
                    return Some(resource);
                }
                _ => continue,
            }
        }
        None
    }

    fn deregister(&mut self, resource: &R) -> Option<MembershipStatus> {
        let membership = self.registry.remove(resource)?;
        match membership.status {
            MembershipStatus::Free => {
                self.free_count -= 1;
                self.compact();
            }
            MembershipStatus::Acquired => self.acquired_count -= 1,
        }
        Some(membership.status)
    }

    /// Drop stale queue entries once they outnumber live ones
    fn compact(&mut self) {
        if self.free.len() <= 2 * self.free_count + 32 {
            return;
        }
        let Epoch { free, registry, .. } = self;
        free.retain(|(resource, ticket)| {
            registry
                .get(resource)
                .is_some_and(|m| m.status == MembershipStatus::Free && m.ticket == *ticket)
        });
    }
}

enum Lifecycle<R> {
    Closed,
    Open(Epoch<R>),
}

struct PoolState<R> {
    lifecycle: Lifecycle<R>,
    last_epoch: u64,
    waiting_acquirers: usize,
    waiting_closers: usize,
    waiting_removers: usize,
}

impl<R> PoolState<R> {
    fn current(&self) -> PoolResult<&Epoch<R>> {
        match &self.lifecycle {
            Lifecycle::Open(epoch) => Ok(epoch),
            Lifecycle::Closed => Err(PoolError::NotOpen),
        }
    }

    fn current_mut(&mut self) -> PoolResult<&mut Epoch<R>> {
        match &mut self.lifecycle {
            Lifecycle::Open(epoch) => Ok(epoch),
            Lifecycle::Closed => Err(PoolError::NotOpen),
        }
    }

    /// The open epoch, provided it is still the one a waiter started in
    fn epoch_in(&mut self, id: u64) -> PoolResult<&mut Epoch<R>> {
        match &mut self.lifecycle {
            Lifecycle::Open(epoch) if epoch.id == id => Ok(epoch),
            _ => Err(PoolError::NotOpen),
        }
    }

    fn gauges(&self) -> Gauges {
        match &self.lifecycle {
            Lifecycle::Open(epoch) => Gauges {
                registered: epoch.registry.len(),
                free: epoch.free_count,
                acquired: epoch.acquired_count,
                waiting_acquirers: self.waiting_acquirers,
                waiting_closers: self.waiting_closers,
                waiting_removers: self.waiting_removers,
                epoch: epoch.id,
                is_open: true,
            },
            Lifecycle::Closed => Gauges {
                waiting_acquirers: self.waiting_acquirers,
                waiting_closers: self.waiting_closers,
                waiting_removers: self.waiting_removers,
                ..Gauges::default()
            },
        }
    }
}

/// Thread-safe pool of individually identified resources.
///
/// The pool starts closed. `open` begins an epoch with no resources; `add`
/// and `remove` change membership while callers move resources between the
/// free queue and the acquired set with `acquire` and `release`. All state
/// sits behind one mutex with three condition variables: one for "a resource
/// is free", one for "nothing is acquired" and one for "membership changed".
///
/// # Examples
///
/// ```
/// use esox_resourcepool::ResourcePool;
///
/// let pool = ResourcePool::new();
/// pool.open().unwrap();
/// pool.add(5).unwrap();
/// pool.add(6).unwrap();
///
/// assert_eq!(pool.acquire().unwrap(), 5);
/// assert_eq!(pool.acquire().unwrap(), 6);
/// pool.release(&5).unwrap();
/// assert_eq!(pool.acquire().unwrap(), 5);
///
/// pool.close_now().unwrap();
/// assert!(!pool.is_open());
/// ```
pub struct ResourcePool<R> {
    state: Mutex<PoolState<R>>,
    free_available: Condvar,
    drained: Condvar,
    changed: Condvar,
    config: PoolConfiguration<R>,
    metrics: MetricsTracker,
}

impl<R: Eq + Hash + Clone> Default for ResourcePool<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Eq + Hash + Clone> ResourcePool<R> {
    /// Create a closed pool with the default configuration
    pub fn new() -> Self {
        Self::with_config(PoolConfiguration::default())
    }

    /// Create a closed pool
    pub fn with_config(config: PoolConfiguration<R>) -> Self {
        Self {
            state: Mutex::new(PoolState {
                lifecycle: Lifecycle::Closed,
                last_epoch: 0,
                waiting_acquirers: 0,
                waiting_closers: 0,
                waiting_removers: 0,
            }),
            free_available: Condvar::new(),
            drained: Condvar::new(),
            changed: Condvar::new(),
            config,
            metrics: MetricsTracker::new(),
        }
    }

    pub fn config(&self) -> &PoolConfiguration<R> {
        &self.config
    }

    /// Open the pool, starting a new epoch with no resources
    pub fn open(&self) -> PoolResult<()> {
        let mut state = self.state.lock();
        if let Lifecycle::Open(_) = state.lifecycle {
            return Err(PoolError::AlreadyOpen);
        }
        state.last_epoch += 1;
        let id = state.last_epoch;
        state.lifecycle = Lifecycle::Open(Epoch::new(id));
        MetricsTracker::bump(&self.metrics.epochs_opened);
        debug!(pool = %self.config.name, epoch = id, "pool opened");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state.lock().lifecycle, Lifecycle::Open(_))
    }

    /// Current epoch number, `None` while closed
    pub fn epoch(&self) -> Option<u64> {
        self.state.lock().current().ok().map(|epoch| epoch.id)
    }

    /// Close the pool once every acquired resource has been released.
    ///
    /// Blocks while anything is acquired. Fails with `NotOpen` if the pool
    /// was not open, or if it was force-closed while this call was waiting.
    pub fn close(&self) -> PoolResult<()> {
        let mut state = self.state.lock();
        let id = state.current()?.id;
        loop {
            if state.epoch_in(id)?.acquired_count == 0 {
                break;
            }
            trace!(pool = %self.config.name, epoch = id, "close waiting for drain");
            state.waiting_closers += 1;
            self.drained.wait(&mut state);
            state.waiting_closers -= 1;
        }
        state.lifecycle = Lifecycle::Closed;
        self.wake_all();
        debug!(pool = %self.config.name, epoch = id, "pool closed");
        Ok(())
    }

    /// Close the pool immediately, abandoning outstanding holders and waking
    /// every blocked caller
    pub fn close_now(&self) -> PoolResult<()> {
        let mut state = self.state.lock();
        let epoch = state.current()?;
        let (id, outstanding) = (epoch.id, epoch.acquired_count);
        state.lifecycle = Lifecycle::Closed;
        self.wake_all();
        debug!(pool = %self.config.name, epoch = id, outstanding, "pool closed immediately");
        Ok(())
    }

    fn wake_all(&self) {
        self.free_available.notify_all();
        self.drained.notify_all();
        self.changed.notify_all();
    }

    /// Take the oldest free resource, blocking until one is available
    pub fn acquire(&self) -> PoolResult<R> {
        match self.acquire_until(None)? {
            Some(resource) => Ok(resource),
            None => Err(PoolError::NotOpen),
        }
    }

    /// Take the oldest free resource, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when the pool stays open but nothing became free
    /// in time.
    pub fn acquire_timeout(&self, timeout: Duration) -> PoolResult<Option<R>> {
        // An unrepresentable deadline waits forever
        self.acquire_until(Instant::now().checked_add(timeout))
    }

    /// `acquire_timeout` with the configured operation timeout
    pub fn acquire_default(&self) -> PoolResult<Option<R>> {
        match self.config.operation_timeout {
            Some(timeout) => self.acquire_timeout(timeout),
            None => self.acquire().map(Some),
        }
    }

    /// Take a free resource without waiting
    pub fn try_acquire(&self) -> PoolResult<Option<R>> {
        let mut state = self.state.lock();
        let epoch = state.current_mut()?;
        let resource = epoch.pop_free();
        if resource.is_some() {
            self.on_acquired(epoch.id);
        }
        Ok(resource)
    }

    fn acquire_until(&self, deadline: Option<Instant>) -> PoolResult<Option<R>> {
        let mut state = self.state.lock();
        let id = state.current()?.id;
        let mut timed_out = false;
        loop {
            if let Some(resource) = state.epoch_in(id)?.pop_free() {
                self.on_acquired(id);
                return Ok(Some(resource));
            }
            if timed_out {
                MetricsTracker::bump(&self.metrics.acquire_timeouts);
                warn!(pool = %self.config.name, epoch = id, "timed out waiting for a free resource");
                return Ok(None);
            }
            state.waiting_acquirers += 1;
            timed_out = match deadline {
                Some(deadline) => self.free_available.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.free_available.wait(&mut state);
                    false
                }
            };
            state.waiting_acquirers -= 1;
        }
    }

    fn on_acquired(&self, epoch: u64) {
        MetricsTracker::bump(&self.metrics.total_acquired);
        trace!(pool = %self.config.name, epoch, "resource acquired");
        self.changed.notify_all();
    }

    /// Acquire a resource wrapped in a guard that releases it on drop
    pub fn acquire_guard(&self) -> PoolResult<PooledResource<'_, R>> {
        self.acquire().map(|resource| PooledResource::new(resource, self))
    }

    /// Guarded variant of `acquire_timeout`
    pub fn acquire_guard_timeout(&self, timeout: Duration) -> PoolResult<Option<PooledResource<'_, R>>> {
        Ok(self
            .acquire_timeout(timeout)?
            .map(|resource| PooledResource::new(resource, self)))
    }

    /// Return an acquired resource to the tail of the free queue.
    ///
    /// Releasing a resource that is already free does nothing. Releasing a
    /// resource that `remove_now` took away from its holder succeeds once
    /// with `ReleaseOutcome::Revoked`. Anything else unknown to the current
    /// epoch fails with `NotRegistered`.
    pub fn release(&self, resource: &R) -> PoolResult<ReleaseOutcome> {
        let mut state = self.state.lock();
        let epoch = state.current_mut()?;
        let id = epoch.id;

        match epoch.status_of(resource) {
            Some(MembershipStatus::Acquired) => {}
            Some(MembershipStatus::Free) => return Ok(ReleaseOutcome::AlreadyFree),
            None => {
                if epoch.revoked.remove(resource) {
                    trace!(pool = %self.config.name, epoch = id, "revoked resource released");
                    return Ok(ReleaseOutcome::Revoked);
                }
                return Err(PoolError::NotRegistered);
            }
        }

        let outcome = if self.config.validate_on_release && !self.config.is_valid(resource) {
            epoch.deregister(resource);
            MetricsTracker::bump(&self.metrics.validation_failures);
            warn!(pool = %self.config.name, epoch = id, "released resource failed validation, discarding");
            ReleaseOutcome::Discarded
        } else {
            epoch.mark_free(resource);
            MetricsTracker::bump(&self.metrics.total_released);
            trace!(pool = %self.config.name, epoch = id, "resource released");
            self.free_available.notify_one();
            ReleaseOutcome::Released
        };

        if epoch.acquired_count == 0 {
            self.drained.notify_all();
        }
        self.changed.notify_all();
        Ok(outcome)
    }

    /// Register a resource and make it available.
    ///
    /// Returns `false` if it is already registered in this epoch.
    pub fn add(&self, resource: R) -> PoolResult<bool> {
        let mut state = self.state.lock();
        let epoch = state.current_mut()?;
        if !self.config.is_valid(&resource) {
            return Err(PoolError::InvalidArgument(
                "resource rejected by validation function".to_string(),
            ));
        }
        if epoch.registry.contains_key(&resource) {
            return Ok(false);
        }
        epoch.revoked.remove(&resource);
        epoch.register(resource);
        MetricsTracker::bump(&self.metrics.total_added);
        trace!(pool = %self.config.name, epoch = epoch.id, "resource added");
        self.free_available.notify_one();
        self.changed.notify_all();
        Ok(true)
    }

    /// Deregister a resource, waiting for its holder to release it first.
    ///
    /// Returns `false` if the resource is not registered, or stops being
    /// registered while this call waits. Fails with `NotOpen` if the pool
    /// is closed while waiting. Waits indefinitely on a holder that never
    /// releases.
    pub fn remove(&self, resource: &R) -> PoolResult<bool> {
        let mut state = self.state.lock();
        let id = state.current()?.id;
        loop {
            let epoch = match &mut state.lifecycle {
                Lifecycle::Open(epoch) if epoch.id == id => epoch,
                // The resource left with the epoch it was registered in
                Lifecycle::Open(_) => return Ok(false),
                Lifecycle::Closed => return Err(PoolError::NotOpen),
            };
            match epoch.status_of(resource) {
                None => return Ok(false),
                Some(MembershipStatus::Free) => {
                    epoch.deregister(resource);
                    MetricsTracker::bump(&self.metrics.total_removed);
                    trace!(pool = %self.config.name, epoch = id, "resource removed");
                    self.changed.notify_all();
                    return Ok(true);
                }
                Some(MembershipStatus::Acquired) => {
                    trace!(pool = %self.config.name, epoch = id, "remove waiting for release");
                    state.waiting_removers += 1;
                    self.changed.wait(&mut state);
                    state.waiting_removers -= 1;
                }
            }
        }
    }

    /// Deregister a resource immediately, even if a caller holds it
    pub fn remove_now(&self, resource: &R) -> PoolResult<bool> {
        let mut state = self.state.lock();
        let epoch = state.current_mut()?;
        let id = epoch.id;
        let removed = match epoch.deregister(resource) {
            None => return Ok(false),
            Some(MembershipStatus::Free) => {
                trace!(pool = %self.config.name, epoch = id, "free resource removed");
                true
            }
            Some(MembershipStatus::Acquired) => {
                epoch.revoked.insert(resource.clone());
                MetricsTracker::bump(&self.metrics.total_revoked);
                debug!(pool = %self.config.name, epoch = id, "acquired resource revoked");
                if epoch.acquired_count == 0 {
                    self.drained.notify_all();
                }
                true
            }
        };
        MetricsTracker::bump(&self.metrics.total_removed);
        self.changed.notify_all();
        Ok(removed)
    }

    /// Membership of `resource` in the current epoch
    pub fn status_of(&self, resource: &R) -> PoolResult<Option<MembershipStatus>> {
        Ok(self.state.lock().current()?.status_of(resource))
    }

    pub fn contains(&self, resource: &R) -> bool {
        matches!(self.status_of(resource), Ok(Some(_)))
    }

    /// Free resources; 0 while closed
    pub fn free_count(&self) -> usize {
        self.state.lock().gauges().free
    }

    /// Acquired resources; 0 while closed
    pub fn acquired_count(&self) -> usize {
        self.state.lock().gauges().acquired
    }

    /// Registered resources; 0 while closed
    pub fn registered_count(&self) -> usize {
        self.state.lock().gauges().registered
    }

    /// Threads currently parked in `acquire`
    pub fn waiting_acquirers(&self) -> usize {
        self.state.lock().waiting_acquirers
    }

    /// Threads currently parked in `close`
    pub fn waiting_closers(&self) -> usize {
        self.state.lock().waiting_closers
    }

    /// Threads currently parked in `remove`
    pub fn waiting_removers(&self) -> usize {
        self.state.lock().waiting_removers
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let gauges = self.state.lock().gauges();
        self.metrics.get_metrics(gauges)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format, labelled with the pool name
    pub fn export_metrics_prometheus(&self, tags: Option<&HashMap<String, String>>) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), &self.config.name, tags)
    }

    /// Get health status
    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::from_metrics(&self.metrics())
    }
}

#[cfg(feature = "async")]
const ASYNC_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[cfg(feature = "async")]
impl<R: Eq + Hash + Clone> ResourcePool<R> {
    /// Take the oldest free resource without blocking the runtime, waiting at
    /// most `timeout`.
    ///
    /// Each attempt completes under the lock before the next await, so
    /// dropping the future never leaves a resource acquired without a holder.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::ResourcePool;
    /// use std::time::Duration;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pool = ResourcePool::new();
    /// pool.open().unwrap();
    /// pool.add(1u32).unwrap();
    ///
    /// let r = pool.acquire_async(Duration::from_millis(100)).await.unwrap();
    /// assert_eq!(r, Some(1));
    /// # });
    /// ```
    pub async fn acquire_async(&self, timeout: Duration) -> PoolResult<Option<R>> {
        let id = self.state.lock().current()?.id;
        match tokio::time::timeout(timeout, self.poll_acquire(id)).await {
            Ok(resource) => resource.map(Some),
            Err(_) => {
                MetricsTracker::bump(&self.metrics.acquire_timeouts);
                warn!(pool = %self.config.name, epoch = id, "timed out waiting for a free resource");
                Ok(None)
            }
        }
    }

    /// `acquire_async` with the configured operation timeout
    pub async fn acquire_async_default(&self) -> PoolResult<Option<R>> {
        match self.config.operation_timeout {
            Some(timeout) => self.acquire_async(timeout).await,
            None => {
                let id = self.state.lock().current()?.id;
                self.poll_acquire(id).await.map(Some)
            }
        }
    }

    async fn poll_acquire(&self, id: u64) -> PoolResult<R> {
        loop {
            if let Some(resource) = self.try_acquire_in(id)? {
                return Ok(resource);
            }
            tokio::time::sleep(ASYNC_POLL_INTERVAL).await;
        }
    }

    fn try_acquire_in(&self, id: u64) -> PoolResult<Option<R>> {
        let mut state = self.state.lock();
        let resource = state.epoch_in(id)?.pop_free();
        if resource.is_some() {
            self.on_acquired(id);
        }
        Ok(resource)
    }
}

/// An acquired resource that goes back to its pool when dropped
pub struct PooledResource<'a, R: Eq + Hash + Clone> {
    resource: R,
    pool: &'a ResourcePool<R>,
    armed: bool,
}

impl<'a, R: Eq + Hash + Clone> PooledResource<'a, R> {
    fn new(resource: R, pool: &'a ResourcePool<R>) -> Self {
        Self {
            resource,
            pool,
            armed: true,
        }
    }

    /// Release now and report what happened
    pub fn release(mut self) -> PoolResult<ReleaseOutcome> {
        self.armed = false;
        self.pool.release(&self.resource)
    }

    /// Keep the resource checked out and stop tracking it; the caller is
    /// responsible for releasing it
    pub fn detach(mut self) -> R {
        self.armed = false;
        self.resource.clone()
    }
}

impl<R: Eq + Hash + Clone> Deref for PooledResource<'_, R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}

impl<R: Eq + Hash + Clone> Drop for PooledResource<'_, R> {
    fn drop(&mut self) {
        if self.armed
            && let Err(err) = self.pool.release(&self.resource)
        {
            warn!(pool = %self.pool.config.name, error = %err, "guard failed to release resource");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_pool(resources: &[i32]) -> ResourcePool<i32> {
        let pool = ResourcePool::new();
        pool.open().unwrap();
        for r in resources {
            assert!(pool.add(*r).unwrap());
        }
        pool
    }

    fn assert_partition(pool: &ResourcePool<i32>) {
        let state = pool.state.lock();
        let epoch = state.current().unwrap();
        let free = epoch.registry.values().filter(|m| m.status == MembershipStatus::Free).count();
        let acquired = epoch.registry.len() - free;
        assert_eq!(free, epoch.free_count);
        assert_eq!(acquired, epoch.acquired_count);
        let live = epoch
            .free
            .iter()
            .filter(|(r, t)| {
                epoch
                    .registry
                    .get(r)
                    .is_some_and(|m| m.status == MembershipStatus::Free && m.ticket == *t)
            })
            .count();
        assert_eq!(live, epoch.free_count);
    }

    #[test]
    fn test_starts_closed() {
        let pool: ResourcePool<i32> = ResourcePool::new();
        assert!(!pool.is_open());
        assert_eq!(pool.epoch(), None);
        assert_eq!(pool.acquire(), Err(PoolError::NotOpen));
        assert_eq!(pool.add(1), Err(PoolError::NotOpen));
        assert_eq!(pool.release(&1), Err(PoolError::NotOpen));
        assert_eq!(pool.remove(&1), Err(PoolError::NotOpen));
        assert_eq!(pool.remove_now(&1), Err(PoolError::NotOpen));
        assert_eq!(pool.close(), Err(PoolError::NotOpen));
        assert_eq!(pool.close_now(), Err(PoolError::NotOpen));
        assert_eq!(pool.acquire_timeout(Duration::from_millis(1)), Err(PoolError::NotOpen));
    }

    #[test]
    fn test_open_twice_fails() {
        let pool = open_pool(&[]);
        assert_eq!(pool.open(), Err(PoolError::AlreadyOpen));
        assert!(pool.is_open());
    }

    #[test]
    fn test_fifo_reuse() {
        let pool = open_pool(&[5, 6]);
        assert_eq!(pool.acquire().unwrap(), 5);
        assert_eq!(pool.acquire().unwrap(), 6);
        assert_eq!(pool.release(&5).unwrap(), ReleaseOutcome::Released);
        assert_eq!(pool.acquire().unwrap(), 5);
        assert_partition(&pool);
    }

    #[test]
    fn test_release_order_is_fifo() {
        let pool = open_pool(&[1, 2, 3]);
        let all: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(all, vec![1, 2, 3]);
        pool.release(&3).unwrap();
        pool.release(&1).unwrap();
        pool.release(&2).unwrap();
        assert_eq!(pool.acquire().unwrap(), 3);
        assert_eq!(pool.acquire().unwrap(), 1);
        assert_eq!(pool.acquire().unwrap(), 2);
    }

    #[test]
    fn test_acquire_release_round_trip() {
        let pool = open_pool(&[1, 2]);
        let before = (pool.free_count(), pool.acquired_count());
        let r = pool.acquire().unwrap();
        assert_eq!(pool.status_of(&r).unwrap(), Some(MembershipStatus::Acquired));
        pool.release(&r).unwrap();
        assert_eq!((pool.free_count(), pool.acquired_count()), before);
        assert_eq!(pool.status_of(&r).unwrap(), Some(MembershipStatus::Free));
        assert_partition(&pool);
    }

    #[test]
    fn test_release_tolerates_redundant_calls() {
        let pool = open_pool(&[1]);
        assert_eq!(pool.release(&1).unwrap(), ReleaseOutcome::AlreadyFree);
        let r = pool.acquire().unwrap();
        assert_eq!(pool.release(&r).unwrap(), ReleaseOutcome::Released);
        assert_eq!(pool.release(&r).unwrap(), ReleaseOutcome::AlreadyFree);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_release_unknown_fails() {
        let pool = open_pool(&[1]);
        assert_eq!(pool.release(&42), Err(PoolError::NotRegistered));
    }

    #[test]
    fn test_add_duplicate_returns_false() {
        let pool = open_pool(&[1]);
        assert!(!pool.add(1).unwrap());
        let r = pool.acquire().unwrap();
        assert!(!pool.add(r).unwrap());
        assert_eq!(pool.registered_count(), 1);
    }

    #[test]
    fn test_add_rejected_by_validator() {
        let pool = ResourcePool::with_config(PoolConfiguration::new().with_validation(|r: &i32| *r >= 0));
        pool.open().unwrap();
        assert!(matches!(pool.add(-1), Err(PoolError::InvalidArgument(_))));
        assert!(pool.add(1).unwrap());
    }

    #[test]
    fn test_validate_on_release_discards() {
        use std::sync::atomic::{AtomicBool, Ordering};
        static HEALTHY: AtomicBool = AtomicBool::new(true);

        let config = PoolConfiguration::new()
            .with_validation(|_: &i32| HEALTHY.load(Ordering::SeqCst))
            .with_validate_on_release();
        let pool = ResourcePool::with_config(config);
        pool.open().unwrap();
        pool.add(1).unwrap();
        let r = pool.acquire().unwrap();
        HEALTHY.store(false, Ordering::SeqCst);
        assert_eq!(pool.release(&r).unwrap(), ReleaseOutcome::Discarded);
        assert!(!pool.contains(&1));
        assert_eq!(pool.metrics().validation_failures, 1);
        HEALTHY.store(true, Ordering::SeqCst);
    }

    #[test]
    fn test_remove_free_resource() {
        let pool = open_pool(&[1, 2]);
        assert!(pool.remove(&1).unwrap());
        assert!(!pool.remove(&1).unwrap());
        assert!(!pool.contains(&1));
        assert_eq!(pool.acquire().unwrap(), 2);
        assert_eq!(pool.try_acquire().unwrap(), None);
        assert_partition(&pool);
    }

    #[test]
    fn test_readd_after_remove_keeps_single_entry() {
        let pool = open_pool(&[1, 2]);
        pool.remove(&1).unwrap();
        pool.add(1).unwrap();
        assert_eq!(pool.acquire().unwrap(), 2);
        assert_eq!(pool.acquire().unwrap(), 1);
        assert_eq!(pool.try_acquire().unwrap(), None);
    }

    #[test]
    fn test_remove_now_revokes_holder() {
        let pool = open_pool(&[1]);
        let r = pool.acquire().unwrap();
        assert!(pool.remove_now(&r).unwrap());
        assert!(!pool.contains(&r));
        assert_eq!(pool.acquired_count(), 0);
        assert_eq!(pool.release(&r).unwrap(), ReleaseOutcome::Revoked);
        assert_eq!(pool.release(&r), Err(PoolError::NotRegistered));
        assert!(!pool.remove_now(&r).unwrap());
        let metrics = pool.metrics();
        assert_eq!(metrics.total_revoked, 1);
        assert_eq!(metrics.total_removed, 1);
    }

    #[test]
    fn test_readd_clears_revocation() {
        let pool = open_pool(&[1]);
        let r = pool.acquire().unwrap();
        pool.remove_now(&r).unwrap();
        pool.add(1).unwrap();
        assert_eq!(pool.release(&1).unwrap(), ReleaseOutcome::AlreadyFree);
    }

    #[test]
    fn test_timeout_on_empty_pool() {
        let pool = open_pool(&[]);
        let start = Instant::now();
        assert_eq!(pool.acquire_timeout(Duration::from_millis(50)).unwrap(), None);
        assert!(start.elapsed() >= Duration::from_millis(45));
        assert_eq!(pool.metrics().acquire_timeouts, 1);
        assert_eq!(pool.waiting_acquirers(), 0);
    }

    #[test]
    fn test_timeout_budget_survives_spurious_wakeups() {
        use std::sync::Arc;
        use std::thread;

        let pool = Arc::new(open_pool(&[]));
        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let start = Instant::now();
                (pool.acquire_timeout(Duration::from_millis(300)), start.elapsed())
            })
        };

        while pool.waiting_acquirers() == 0 {
            thread::yield_now();
        }
        for _ in 0..10 {
            pool.free_available.notify_all();
            thread::sleep(Duration::from_millis(20));
        }

        let (result, elapsed) = waiter.join().unwrap();
        assert_eq!(result, Ok(None));
        assert!(elapsed >= Duration::from_millis(295));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[test]
    fn test_zero_timeout_takes_free_resource() {
        let pool = open_pool(&[3]);
        assert_eq!(pool.acquire_timeout(Duration::ZERO).unwrap(), Some(3));
        assert_eq!(pool.acquire_timeout(Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn test_acquire_default_uses_configured_timeout() {
        let pool: ResourcePool<i32> =
            ResourcePool::with_config(PoolConfiguration::new().with_timeout(Duration::from_millis(10)));
        pool.open().unwrap();
        assert_eq!(pool.acquire_default().unwrap(), None);
        pool.add(8).unwrap();
        assert_eq!(pool.acquire_default().unwrap(), Some(8));
    }

    #[test]
    fn test_close_with_nothing_acquired() {
        let pool = open_pool(&[1, 2]);
        pool.close().unwrap();
        assert!(!pool.is_open());
        assert_eq!(pool.registered_count(), 0);
    }

    #[test]
    fn test_reopen_starts_fresh_epoch() {
        let pool = open_pool(&[1, 2]);
        let r = pool.acquire().unwrap();
        assert_eq!(pool.epoch(), Some(1));
        pool.close_now().unwrap();
        pool.open().unwrap();
        assert_eq!(pool.epoch(), Some(2));
        assert_eq!(pool.registered_count(), 0);
        assert_eq!(pool.release(&r), Err(PoolError::NotRegistered));
        assert_eq!(pool.metrics().epochs_opened, 2);
    }

    #[test]
    fn test_close_now_with_acquired() {
        let pool = open_pool(&[5]);
        assert_eq!(pool.acquire().unwrap(), 5);
        pool.close_now().unwrap();
        assert!(!pool.is_open());
        assert_eq!(pool.acquire(), Err(PoolError::NotOpen));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let pool = open_pool(&[1]);
        {
            let guard = pool.acquire_guard().unwrap();
            assert_eq!(*guard, 1);
            assert_eq!(pool.acquired_count(), 1);
        }
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.metrics().total_released, 1);
    }

    #[test]
    fn test_guard_explicit_release_and_detach() {
        let pool = open_pool(&[1, 2]);
        let guard = pool.acquire_guard().unwrap();
        assert_eq!(guard.release().unwrap(), ReleaseOutcome::Released);

        let detached = pool.acquire_guard().unwrap().detach();
        assert_eq!(detached, 2);
        assert_eq!(pool.status_of(&2).unwrap(), Some(MembershipStatus::Acquired));
        pool.release(&detached).unwrap();

        assert!(pool.acquire_guard_timeout(Duration::ZERO).unwrap().is_some());
    }

    #[test]
    fn test_guard_drop_after_close_is_harmless() {
        let pool = open_pool(&[1]);
        let guard = pool.acquire_guard().unwrap();
        pool.close_now().unwrap();
        drop(guard);
        assert!(!pool.is_open());
    }

    #[test]
    fn test_stale_entries_are_compacted() {
        let pool = open_pool(&[]);
        for i in 0..200 {
            pool.add(i).unwrap();
        }
        for i in 0..190 {
            pool.remove(&i).unwrap();
        }
        {
            let state = pool.state.lock();
            let epoch = state.current().unwrap();
            assert!(epoch.free.len() <= 2 * epoch.free_count + 32);
        }
        assert_eq!(pool.acquire().unwrap(), 190);
        assert_partition(&pool);
    }

    #[test]
    fn test_health_reports_closed() {
        let pool: ResourcePool<i32> = ResourcePool::new();
        assert!(!pool.health_status().is_healthy());
        pool.open().unwrap();
        assert!(pool.health_status().is_healthy());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_acquire_async() {
        let pool = open_pool(&[4]);
        assert_eq!(pool.acquire_async(Duration::from_millis(50)).await.unwrap(), Some(4));
        assert_eq!(pool.acquire_async(Duration::from_millis(20)).await.unwrap(), None);
        assert_eq!(pool.metrics().acquire_timeouts, 1);
        pool.close_now().unwrap();
        assert_eq!(
            pool.acquire_async(Duration::from_millis(20)).await,
            Err(PoolError::NotOpen)
        );
    }

    #[cfg(feature = "async")]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_dropped_acquire_async_leaves_nothing_acquired() {
        use std::sync::Arc;

        let pool = Arc::new(open_pool(&[1]));
        let held = pool.acquire().unwrap();

        let pending = tokio::time::timeout(
            Duration::from_millis(20),
            pool.acquire_async(Duration::from_millis(200)),
        );
        assert!(pending.await.is_err());

        pool.release(&held).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.acquired_count(), 0);
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.status_of(&1).unwrap(), Some(MembershipStatus::Free));
        assert_partition(&pool);

        let closer = {
            let pool = Arc::clone(&pool);
            tokio::task::spawn_blocking(move || pool.close())
        };
        let closed = tokio::time::timeout(Duration::from_secs(5), closer).await;
        assert_eq!(closed.expect("close did not return").unwrap(), Ok(()));
        assert!(!pool.is_open());
    }

    #[cfg(feature = "async")]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_acquire_async_picks_up_released_resource() {
        use std::sync::Arc;

        let pool = Arc::new(open_pool(&[3]));
        let held = pool.acquire().unwrap();

        let releaser = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                pool.release(&held).unwrap()
            })
        };

        assert_eq!(pool.acquire_async(Duration::from_secs(5)).await.unwrap(), Some(3));
        assert_eq!(releaser.await.unwrap(), ReleaseOutcome::Released);
        assert_eq!(pool.acquired_count(), 1);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_acquire_async_fails_when_epoch_replaced() {
        let pool = open_pool(&[]);
        let pending = pool.acquire_async(Duration::from_secs(5));
        tokio::pin!(pending);

        // First poll fixes the epoch and parks on the sleep
        assert!(poll_once(pending.as_mut()).await.is_none());
        pool.close_now().unwrap();
        pool.open().unwrap();
        pool.add(8).unwrap();

        assert_eq!(pending.await, Err(PoolError::NotOpen));
        assert_eq!(pool.free_count(), 1);
    }

    #[cfg(feature = "async")]
    async fn poll_once<F: std::future::Future + Unpin>(future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            output = future => Some(output),
            _ = std::future::ready(()) => None,
        }
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_acquire_async_default_uses_configured_timeout() {
        let pool: ResourcePool<i32> = ResourcePool::with_config(
            PoolConfiguration::new().with_timeout(Duration::from_millis(20)),
        );
        pool.open().unwrap();

        let start = Instant::now();
        assert_eq!(pool.acquire_async_default().await.unwrap(), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(pool.metrics().acquire_timeouts, 1);

        pool.add(2).unwrap();
        assert_eq!(pool.acquire_async_default().await.unwrap(), Some(2));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_acquire_async_default_without_timeout_waits_for_resource() {
        let pool: ResourcePool<i32> =
            ResourcePool::with_config(PoolConfiguration::new().without_timeout());
        pool.open().unwrap();
        pool.add(6).unwrap();
        assert_eq!(pool.acquire_async_default().await.unwrap(), Some(6));

        pool.close_now().unwrap();
        assert_eq!(pool.acquire_async_default().await, Err(PoolError::NotOpen));
    }
}
