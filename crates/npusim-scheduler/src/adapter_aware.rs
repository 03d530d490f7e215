//! Adapter-aware policy slot

use npusim_core::{Cluster, Task};
use tracing::debug;

use crate::policy::{Allocation, SchedulingPolicy};

/// Placeholder for a fragmentation/adapter-aware strategy
///
/// No placement heuristic is defined for this variant yet, so it never
/// places anything. Runs using it end with every task reported as
/// unschedulable, which keeps comparisons honest until real logic lands.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdapterAwarePolicy;

impl SchedulingPolicy for AdapterAwarePolicy {
    fn schedule(&self, pending: &[&Task], _cluster: &Cluster, now: f64) -> Vec<Allocation> {
        debug!(pending = pending.len(), time = now, "Adapter-aware policy places nothing");
        Vec::new()
    }

    fn name(&self) -> &str {
        "adapter-aware"
    }
}
