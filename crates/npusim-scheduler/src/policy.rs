//! Scheduling policy interface

use npusim_core::{Cluster, Npu, PolicyKind, Task};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::adapter_aware::AdapterAwarePolicy;
use crate::best_fit::BestFitPolicy;
use crate::fifo::FifoPolicy;

/// A placement decision for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Task being placed
    pub job_id: String,
    /// Devices it should run on, exactly `npu_requirement` of them
    pub npu_ids: Vec<String>,
}

impl Allocation {
    pub fn new(job_id: impl Into<String>, npu_ids: Vec<String>) -> Self {
        Self {
            job_id: job_id.into(),
            npu_ids,
        }
    }
}

/// Strategy for placing pending tasks onto devices
///
/// Implementations read the cluster but never mutate it; the engine
/// commits the returned allocations. A task is either fully placed or
/// absent from the result, and no device id may appear in two
/// allocations of the same pass.
pub trait SchedulingPolicy: Send + Sync {
    /// Decide which pending tasks to start at `now`
    fn schedule(&self, pending: &[&Task], cluster: &Cluster, now: f64) -> Vec<Allocation>;

    /// Name of the scheduling policy
    fn name(&self) -> &str;
}

/// Create the policy selected by `kind`
pub fn build_policy(kind: PolicyKind) -> Box<dyn SchedulingPolicy> {
    match kind {
        PolicyKind::Fifo => Box::new(FifoPolicy),
        PolicyKind::BestFit => Box::new(BestFitPolicy),
        PolicyKind::AdapterAware => Box::new(AdapterAwarePolicy),
    }
}

/// Pending tasks by ascending arrival time; ties keep pending order
pub(crate) fn arrival_order<'a>(pending: &[&'a Task]) -> Vec<&'a Task> {
    let mut ordered = pending.to_vec();
    ordered.sort_by(|a, b| a.arrival_time.total_cmp(&b.arrival_time));
    ordered
}

/// Whether `npu` can take `task` in this pass
pub(crate) fn is_eligible(npu: &Npu, task: &Task, reserved: &HashSet<&str>) -> bool {
    npu.is_idle()
        && !reserved.contains(npu.npu_id.as_str())
        && npu.fits(task.memory_requirement_gb)
}
