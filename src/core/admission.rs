//! Two-phase admission: resolve how much of each requirement a task can get.
//!
//! Each requirement first tries its full `amount`, then falls back to
//! `min_amount`. A task is admitted only if every requirement resolves;
//! nothing is allocated until the whole plan is known to fit.

use std::collections::HashMap;

use super::resource_pool::{ResourcePool, AMOUNT_EPSILON};
use super::task::{ResourceRequirement, ResourceType};

/// Amounts to grant per requirement, in requirement order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationPlan {
    grants: Vec<(ResourceType, f64)>,
}

impl AllocationPlan {
    /// Planned `(resource, amount)` pairs.
    #[must_use]
    pub fn grants(&self) -> &[(ResourceType, f64)] {
        &self.grants
    }

    /// Planned total for `resource`.
    #[must_use]
    pub fn total_for(&self, resource: &ResourceType) -> f64 {
        self.grants
            .iter()
            .filter(|(kind, _)| kind == resource)
            .map(|(_, amount)| amount)
            .sum()
    }
}

/// Resolve one requirement against `available`.
///
/// Returns the full amount if it fits, else the minimum if that fits,
/// else `None`.
#[must_use]
pub fn resolve_amount(available: f64, requirement: &ResourceRequirement) -> Option<f64> {
    if available + AMOUNT_EPSILON >= requirement.amount() {
        Some(requirement.amount())
    } else if available + AMOUNT_EPSILON >= requirement.min_amount() {
        Some(requirement.min_amount())
    } else {
        None
    }
}

/// Plan every requirement against current pool availability.
///
/// Several requirements on the same resource draw from one shared budget.
/// Returns `None` if any requirement cannot be met at least at its minimum
/// or targets a resource without a pool.
#[must_use]
pub fn plan_allocation(
    pools: &HashMap<ResourceType, ResourcePool>,
    requirements: &[ResourceRequirement],
) -> Option<AllocationPlan> {
    let mut remaining: HashMap<&ResourceType, f64> = HashMap::new();
    let mut grants = Vec::with_capacity(requirements.len());

    for requirement in requirements {
        let kind = requirement.resource_type();
        let pool = pools.get(kind)?;
        let budget = remaining.entry(kind).or_insert_with(|| pool.available());
        let amount = resolve_amount(*budget, requirement)?;
        *budget -= amount;
        grants.push((kind.clone(), amount));
    }

    Some(AllocationPlan { grants })
}

/// Allocate a plan to `consumer_id`, returning granted totals per resource.
pub fn commit_plan(
    pools: &mut HashMap<ResourceType, ResourcePool>,
    consumer_id: &str,
    plan: &AllocationPlan,
) -> HashMap<ResourceType, f64> {
    let mut granted: HashMap<ResourceType, f64> = HashMap::new();
    for (kind, amount) in plan.grants() {
        if let Some(pool) = pools.get_mut(kind) {
            let got = pool.allocate(consumer_id, *amount);
            *granted.entry(kind.clone()).or_insert(0.0) += got;
        }
    }
    granted
}

/// Release everything `consumer_id` holds in the pools named by `granted`.
///
/// Returns the total amount freed across pools.
pub fn release_grants(
    pools: &mut HashMap<ResourceType, ResourcePool>,
    consumer_id: &str,
    granted: &HashMap<ResourceType, f64>,
) -> f64 {
    let mut freed = 0.0;
    for kind in granted.keys() {
        if let Some(pool) = pools.get_mut(kind) {
            freed += pool.release(consumer_id);
        }
    }
    freed
}
