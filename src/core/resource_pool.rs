//! Per-resource capacity accounting.
//!
//! A `ResourcePool` owns one resource type's capacity and tracks which
//! consumer holds how much of it. Amounts are caller-defined `f64` units
//! (commonly fractions of 1.0). The pool never fails: requests that cannot
//! be met are clamped, down to zero.
//!
//! Invariants kept by every mutation:
//!
//! - `allocated() == sum of per-consumer allocations`
//! - `available() == capacity - allocated() - reserved() >= 0`
//! - `allocated() + reserved() <= capacity` unless the capacity was shrunk
//!   below current usage, which never evicts anybody

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::task::ResourceType;

/// Tolerance for floating point comparisons between amounts.
pub const AMOUNT_EPSILON: f64 = 1e-9;

/// Peak and running-average utilization of one pool.
///
/// `average_usage` is the arithmetic mean of `allocated()` sampled after
/// every allocate, set-allocation and release call on the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Highest `allocated()` ever observed.
    pub peak_usage: f64,
    /// Mean of all samples.
    pub average_usage: f64,
    /// Number of samples folded into `average_usage`.
    pub samples: u64,
}

impl UsageMetrics {
    fn record(&mut self, allocated: f64) {
        self.peak_usage = self.peak_usage.max(allocated);
        self.samples += 1;
        #[allow(clippy::cast_precision_loss)]
        let n = self.samples as f64;
        self.average_usage += (allocated - self.average_usage) / n;
    }
}

/// Capacity of a single resource type with per-consumer allocations.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    resource_type: ResourceType,
    capacity: f64,
    allocations: HashMap<String, f64>,
    reserved: f64,
    metrics: UsageMetrics,
}

fn sanitize(amount: f64) -> f64 {
    if amount.is_finite() {
        amount.max(0.0)
    } else {
        0.0
    }
}

impl ResourcePool {
    /// Create an empty pool. Negative or non-finite capacities become 0.
    pub fn new(resource_type: impl Into<ResourceType>, capacity: f64) -> Self {
        Self {
            resource_type: resource_type.into(),
            capacity: sanitize(capacity),
            allocations: HashMap::new(),
            reserved: 0.0,
            metrics: UsageMetrics::default(),
        }
    }

    /// Resource this pool accounts for.
    #[must_use]
    pub const fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    /// Total capacity.
    #[must_use]
    pub const fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Sum of all consumer allocations.
    #[must_use]
    pub fn allocated(&self) -> f64 {
        self.allocations.values().sum()
    }

    /// Headroom held back without a consumer.
    #[must_use]
    pub const fn reserved(&self) -> f64 {
        self.reserved
    }

    /// Capacity still grantable, never negative.
    #[must_use]
    pub fn available(&self) -> f64 {
        (self.capacity - self.allocated() - self.reserved).max(0.0)
    }

    /// Current allocation held by `consumer_id`, 0 if none.
    #[must_use]
    pub fn allocation_of(&self, consumer_id: &str) -> f64 {
        self.allocations.get(consumer_id).copied().unwrap_or(0.0)
    }

    /// Number of consumers holding a non-zero allocation.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.allocations.len()
    }

    /// `allocated() / capacity`, 0 for an empty pool.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.capacity > 0.0 {
            self.allocated() / self.capacity
        } else {
            0.0
        }
    }

    /// Usage metrics snapshot.
    #[must_use]
    pub const fn metrics(&self) -> UsageMetrics {
        self.metrics
    }

    /// Grant up to `amount` to `consumer_id`, adding to what it already holds.
    ///
    /// Returns the granted amount: `min(amount, available())`, or 0 when the
    /// request is non-positive, non-finite, or nothing is left.
    pub fn allocate(&mut self, consumer_id: &str, amount: f64) -> f64 {
        let available = self.available();
        let granted = sanitize(amount).min(available);
        if granted > 0.0 {
            *self.allocations.entry(consumer_id.to_string()).or_insert(0.0) += granted;
        }
        self.metrics.record(self.allocated());
        tracing::trace!(
            resource = %self.resource_type,
            consumer = consumer_id,
            requested = amount,
            granted,
            "allocate"
        );
        granted
    }

    /// Replace `consumer_id`'s allocation with up to `amount`.
    ///
    /// The consumer's current holding counts as available for the new grant.
    /// Returns the allocation now held.
    pub fn set_allocation(&mut self, consumer_id: &str, amount: f64) -> f64 {
        self.allocations.remove(consumer_id);
        let granted = sanitize(amount).min(self.available());
        if granted > 0.0 {
            self.allocations.insert(consumer_id.to_string(), granted);
        }
        self.metrics.record(self.allocated());
        granted
    }

    /// Hold back up to `amount` of headroom without attributing it to anyone.
    ///
    /// Returns the amount actually reserved.
    pub fn reserve(&mut self, amount: f64) -> f64 {
        let held = sanitize(amount).min(self.available());
        self.reserved += held;
        held
    }

    /// Return up to `amount` of previously reserved headroom.
    ///
    /// Returns the amount actually freed.
    pub fn unreserve(&mut self, amount: f64) -> f64 {
        let freed = sanitize(amount).min(self.reserved);
        self.reserved -= freed;
        if self.reserved < AMOUNT_EPSILON {
            self.reserved = 0.0;
        }
        freed
    }

    /// Remove and return everything `consumer_id` holds (0 if unknown).
    pub fn release(&mut self, consumer_id: &str) -> f64 {
        let freed = self.allocations.remove(consumer_id).unwrap_or(0.0);
        self.metrics.record(self.allocated());
        tracing::trace!(
            resource = %self.resource_type,
            consumer = consumer_id,
            freed,
            "release"
        );
        freed
    }

    /// Resize the pool. Existing allocations are kept even if they no longer fit.
    pub fn set_capacity(&mut self, capacity: f64) {
        self.capacity = sanitize(capacity);
    }

    /// Drop every allocation and reservation and reset metrics.
    pub(crate) fn reset(&mut self) {
        self.allocations.clear();
        self.reserved = 0.0;
        self.metrics = UsageMetrics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn invariant_holds(pool: &ResourcePool) -> bool {
        approx(
            pool.available() + pool.allocated() + pool.reserved(),
            pool.capacity(),
        )
    }

    #[test]
    fn test_allocation_is_clamped_to_available() {
        let mut pool = ResourcePool::new(ResourceType::Cpu, 1.0);
        assert!(approx(pool.allocate("t1", 0.6), 0.6));
        assert!(approx(pool.allocate("t2", 0.6), 0.4));
        assert!(approx(pool.allocate("t3", 0.1), 0.0));
        assert!(approx(pool.available(), 0.0));
        assert!(approx(pool.allocation_of("t3"), 0.0));
        assert_eq!(pool.consumer_count(), 2);
        assert!(invariant_holds(&pool));
    }

    #[test]
    fn test_release_restores_capacity() {
        let mut pool = ResourcePool::new(ResourceType::Memory, 1.0);
        pool.allocate("t1", 0.5);
        assert!(approx(pool.release("t1"), 0.5));
        assert!(approx(pool.available(), 1.0));
        assert!(approx(pool.release("t1"), 0.0));
        assert!(invariant_holds(&pool));
    }

    #[test]
    fn test_allocate_is_additive_per_consumer() {
        let mut pool = ResourcePool::new(ResourceType::Cpu, 1.0);
        pool.allocate("t1", 0.2);
        pool.allocate("t1", 0.3);
        assert!(approx(pool.allocation_of("t1"), 0.5));
        assert!(approx(pool.release("t1"), 0.5));
    }

    #[test]
    fn test_set_allocation_replaces() {
        let mut pool = ResourcePool::new(ResourceType::Cpu, 1.0);
        pool.allocate("t1", 0.7);
        pool.allocate("t2", 0.2);
        assert!(approx(pool.set_allocation("t1", 0.3), 0.3));
        assert!(approx(pool.allocated(), 0.5));
        // Can grow into its own old share plus the free remainder.
        assert!(approx(pool.set_allocation("t1", 0.9), 0.8));
        assert!(approx(pool.available(), 0.0));
        assert!(invariant_holds(&pool));
    }

    #[test]
    fn test_metrics_track_peak_and_mean() {
        let mut pool = ResourcePool::new(ResourceType::Gpu, 1.0);
        pool.allocate("t1", 0.3);
        pool.allocate("t2", 0.4);
        let metrics = pool.metrics();
        assert!(approx(metrics.peak_usage, 0.7));
        assert!(metrics.average_usage > 0.3 && metrics.average_usage < 0.7);
        assert!(approx(metrics.average_usage, 0.5));
        assert_eq!(metrics.samples, 2);

        pool.release("t1");
        pool.release("t2");
        let metrics = pool.metrics();
        assert!(approx(metrics.peak_usage, 0.7));
        assert!(approx(metrics.average_usage, (0.3 + 0.7 + 0.4 + 0.0) / 4.0));
    }

    #[test]
    fn test_reservation_reduces_available() {
        let mut pool = ResourcePool::new(ResourceType::Network, 1.0);
        assert!(approx(pool.reserve(0.25), 0.25));
        assert!(approx(pool.available(), 0.75));
        assert!(approx(pool.allocate("t1", 1.0), 0.75));
        assert!(approx(pool.reserve(0.1), 0.0));
        assert!(invariant_holds(&pool));

        assert!(approx(pool.unreserve(1.0), 0.25));
        assert!(approx(pool.reserved(), 0.0));
        assert!(approx(pool.available(), 0.25));
        assert!(invariant_holds(&pool));
    }

    #[test]
    fn test_bad_requests_grant_nothing() {
        let mut pool = ResourcePool::new(ResourceType::Cpu, 1.0);
        assert!(approx(pool.allocate("t1", -0.5), 0.0));
        assert!(approx(pool.allocate("t1", f64::NAN), 0.0));
        assert!(approx(pool.allocate("t1", 0.0), 0.0));
        assert_eq!(pool.consumer_count(), 0);
    }

    #[test]
    fn test_shrinking_capacity_keeps_allocations() {
        let mut pool = ResourcePool::new(ResourceType::Storage, 1.0);
        pool.allocate("t1", 0.8);
        pool.set_capacity(0.5);
        assert!(approx(pool.allocation_of("t1"), 0.8));
        assert!(approx(pool.available(), 0.0));
        pool.release("t1");
        assert!(approx(pool.available(), 0.5));
        assert!(invariant_holds(&pool));
    }

    #[test]
    fn test_utilization_and_reset() {
        let mut pool = ResourcePool::new(ResourceType::Cpu, 2.0);
        pool.allocate("t1", 0.5);
        pool.reserve(0.5);
        assert!(approx(pool.utilization(), 0.25));
        pool.reset();
        assert!(approx(pool.available(), 2.0));
        assert_eq!(pool.metrics().samples, 0);
        assert!(approx(ResourcePool::new(ResourceType::Cpu, 0.0).utilization(), 0.0));
    }
}
