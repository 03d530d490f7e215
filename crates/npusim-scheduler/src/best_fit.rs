//! Best-fit policy
//!
//! An illustrative alternative to FIFO for comparison runs. It keeps FIFO's
//! task order and eligibility rule but packs each task onto the devices
//! that would be left with the least free memory, keeping roomier devices
//! for larger requests that arrive later.

use npusim_core::{Cluster, Npu, Task};
use std::collections::HashSet;
use tracing::trace;

use crate::policy::{arrival_order, is_eligible, Allocation, SchedulingPolicy};

#[derive(Debug, Default, Clone, Copy)]
pub struct BestFitPolicy;

impl SchedulingPolicy for BestFitPolicy {
    fn schedule(&self, pending: &[&Task], cluster: &Cluster, now: f64) -> Vec<Allocation> {
        let mut allocations = Vec::new();
        let mut reserved: HashSet<&str> = HashSet::new();

        for task in arrival_order(pending) {
            let needed = task.npu_requirement as usize;
            let mut candidates: Vec<&Npu> = cluster
                .npus()
                .iter()
                .filter(|npu| is_eligible(npu, task, &reserved))
                .collect();

            if candidates.len() < needed {
                trace!(
                    job_id = %task.job_id,
                    needed,
                    found = candidates.len(),
                    time = now,
                    "Not enough NPUs, task stays pending"
                );
                continue;
            }

            // Stable sort: equal leftovers keep cluster order.
            candidates.sort_by(|a, b| {
                leftover(a, task).total_cmp(&leftover(b, task))
            });
            let chosen: Vec<&str> = candidates
                .iter()
                .take(needed)
                .map(|npu| npu.npu_id.as_str())
                .collect();

            reserved.extend(chosen.iter().copied());
            allocations.push(Allocation::new(
                task.job_id.clone(),
                chosen.into_iter().map(String::from).collect(),
            ));
        }

        allocations
    }

    fn name(&self) -> &str {
        "best-fit"
    }
}

fn leftover(npu: &Npu, task: &Task) -> f64 {
    npu.memory_capacity_gb - npu.current_memory_usage - task.memory_requirement_gb
}
