//! First-in first-out policy

use npusim_core::{Cluster, Task};
use std::collections::HashSet;
use tracing::trace;

use crate::policy::{arrival_order, is_eligible, Allocation, SchedulingPolicy};

/// Baseline policy: arrival order, first fit over devices
///
/// Tasks are considered by ascending arrival time. Each task takes the first
/// idle devices, in cluster order, that have room for its memory requirement.
/// A task that cannot get all of its devices is skipped for this pass, so an
/// early large request can hold back later small ones on contested devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct FifoPolicy;

impl SchedulingPolicy for FifoPolicy {
    fn schedule(&self, pending: &[&Task], cluster: &Cluster, now: f64) -> Vec<Allocation> {
        let mut allocations = Vec::new();
        let mut reserved: HashSet<&str> = HashSet::new();

        for task in arrival_order(pending) {
            let needed = task.npu_requirement as usize;
            let found: Vec<&str> = cluster
                .npus()
                .iter()
                .filter(|npu| is_eligible(npu, task, &reserved))
                .map(|npu| npu.npu_id.as_str())
                .take(needed)
                .collect();

            if found.len() < needed {
                trace!(
                    job_id = %task.job_id,
                    needed,
                    found = found.len(),
                    time = now,
                    "Not enough NPUs, task stays pending"
                );
                continue;
            }

            reserved.extend(found.iter().copied());
            allocations.push(Allocation::new(
                task.job_id.clone(),
                found.into_iter().map(String::from).collect(),
            ));
        }

        allocations
    }

    fn name(&self) -> &str {
        "fifo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npusim_core::{Npu, NpuStatus, TaskKind};

    fn task(id: &str, arrival: f64, mem: f64, npus: u32) -> Task {
        Task::new(id, TaskKind::Training, arrival, 5.0, mem, npus)
    }

    #[test]
    fn test_first_fit_in_cluster_order() {
        let cluster = Cluster::homogeneous(4, 32.0, 8);
        let a = task("a", 0.0, 10.0, 2);
        let allocations = FifoPolicy.schedule(&[&a], &cluster, 0.0);
        assert_eq!(
            allocations,
            vec![Allocation::new("a", vec!["npu_0".into(), "npu_1".into()])]
        );
    }

    #[test]
    fn test_no_double_booking_in_one_pass() {
        let cluster = Cluster::homogeneous(4, 32.0, 8);
        let tasks: Vec<Task> = (0..4).map(|i| task(&format!("t{}", i), i as f64, 1.0, 1)).collect();
        let refs: Vec<&Task> = tasks.iter().collect();

        let allocations = FifoPolicy.schedule(&refs, &cluster, 4.0);
        assert_eq!(allocations.len(), 4);
        let mut used: Vec<&str> = allocations
            .iter()
            .flat_map(|a| a.npu_ids.iter().map(String::as_str))
            .collect();
        used.sort();
        used.dedup();
        assert_eq!(used.len(), 4);
    }

    #[test]
    fn test_earlier_arrival_wins_contested_device() {
        let cluster = Cluster::homogeneous(1, 32.0, 8);
        let late = task("late", 2.0, 1.0, 1);
        let early = task("early", 1.0, 1.0, 1);

        // Pending order does not matter, arrival time does.
        let allocations = FifoPolicy.schedule(&[&late, &early], &cluster, 2.0);
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].job_id, "early");
    }

    #[test]
    fn test_partial_allocation_is_skipped() {
        let cluster = Cluster::homogeneous(2, 32.0, 8);
        let big = task("big", 0.0, 1.0, 3);
        let small = task("small", 1.0, 1.0, 1);

        // The cluster check at ingestion would reject `big`; here it just cannot fit.
        let allocations = FifoPolicy.schedule(&[&big, &small], &cluster, 1.0);
        assert_eq!(allocations, vec![Allocation::new("small", vec!["npu_0".into()])]);
    }

    #[test]
    fn test_skips_busy_and_full_devices() {
        let mut cluster = Cluster::new();
        let mut busy = Npu::new("busy", "node_0", 32.0);
        busy.status = NpuStatus::Busy;
        let small = Npu::new("small", "node_0", 8.0);
        cluster.add_npu(busy).unwrap();
        cluster.add_npu(small).unwrap();
        cluster.add_npu(Npu::new("free", "node_0", 32.0)).unwrap();

        let a = task("a", 0.0, 16.0, 1);
        let allocations = FifoPolicy.schedule(&[&a], &cluster, 0.0);
        assert_eq!(allocations, vec![Allocation::new("a", vec!["free".into()])]);
    }

    #[test]
    fn test_empty_pending() {
        let cluster = Cluster::homogeneous(2, 32.0, 8);
        assert!(FifoPolicy.schedule(&[], &cluster, 0.0).is_empty());
    }
}
