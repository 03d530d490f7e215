//! NPU allocator: the only place cluster state changes during a run

use npusim_core::{Cluster, NpuStatus, SimError, SimResult, Task};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::outcome::Anomaly;

/// Usage below this after a release counts as an accounting error rather
/// than floating-point noise.
const USAGE_EPSILON: f64 = 1e-9;

/// Owns the cluster for the duration of a run and applies commits and
/// releases to it
#[derive(Debug)]
pub struct NpuAllocator {
    cluster: Cluster,
}

impl NpuAllocator {
    pub fn new(cluster: Cluster) -> Self {
        Self { cluster }
    }

    /// Current device state
    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn into_cluster(self) -> Cluster {
        self.cluster
    }

    /// Check that `task` can take exactly `npu_ids` right now
    pub fn check(&self, task: &Task, npu_ids: &[String]) -> SimResult<()> {
        let reject = |reason: String| SimError::AllocationRejected {
            job_id: task.job_id.clone(),
            reason,
        };

        if npu_ids.len() != task.npu_requirement as usize {
            return Err(reject(format!(
                "expected {} NPUs, got {}",
                task.npu_requirement,
                npu_ids.len()
            )));
        }

        let mut seen = HashSet::with_capacity(npu_ids.len());
        for npu_id in npu_ids {
            if !seen.insert(npu_id.as_str()) {
                return Err(reject(format!("NPU {} listed twice", npu_id)));
            }
            let npu = self
                .cluster
                .get(npu_id)
                .ok_or_else(|| reject(format!("unknown NPU {}", npu_id)))?;
            if !npu.is_idle() {
                return Err(reject(format!("NPU {} is busy", npu_id)));
            }
            if !npu.fits(task.memory_requirement_gb) {
                return Err(reject(format!(
                    "NPU {} has {} GB free, needs {} GB",
                    npu_id,
                    npu.free_memory(),
                    task.memory_requirement_gb
                )));
            }
        }
        Ok(())
    }

    /// Bind `task` to `npu_ids`; nothing changes if any device is unfit
    pub fn commit(&mut self, task: &Task, npu_ids: &[String]) -> SimResult<()> {
        self.check(task, npu_ids)?;

        for npu_id in npu_ids {
            let npu = self
                .cluster
                .get_mut(npu_id)
                .ok_or_else(|| SimError::NpuNotFound(npu_id.clone()))?;
            npu.status = NpuStatus::Busy;
            npu.current_memory_usage += task.memory_requirement_gb;
            npu.running_tasks.push(task.job_id.clone());
        }

        debug!(job_id = %task.job_id, npus = ?npu_ids, "Allocated NPUs");
        Ok(())
    }

    /// Unbind `task` from every device it was allocated
    ///
    /// Devices the task is no longer bound to are left untouched, so a
    /// repeated release is harmless. Usage is floored at zero.
    pub fn release(&mut self, task: &Task, now: f64) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        for npu_id in &task.allocated_npu_ids {
            let Some(npu) = self.cluster.get_mut(npu_id) else {
                warn!(job_id = %task.job_id, npu_id = %npu_id, "Release of unknown NPU");
                continue;
            };

            let Some(pos) = npu.running_tasks.iter().position(|id| id == &task.job_id) else {
                warn!(job_id = %task.job_id, npu_id = %npu_id, "NPU already released");
                anomalies.push(Anomaly::DuplicateRelease {
                    time: now,
                    npu_id: npu_id.clone(),
                    job_id: task.job_id.clone(),
                });
                continue;
            };
            npu.running_tasks.remove(pos);

            npu.current_memory_usage -= task.memory_requirement_gb;
            if npu.current_memory_usage < -USAGE_EPSILON {
                warn!(
                    job_id = %task.job_id,
                    npu_id = %npu_id,
                    usage = npu.current_memory_usage,
                    "Negative memory usage clamped to zero"
                );
                anomalies.push(Anomaly::NegativeUsageClamped {
                    time: now,
                    npu_id: npu_id.clone(),
                    job_id: task.job_id.clone(),
                    usage: npu.current_memory_usage,
                });
            }
            if npu.current_memory_usage < 0.0
                || (npu.running_tasks.is_empty() && npu.current_memory_usage < USAGE_EPSILON)
            {
                npu.current_memory_usage = 0.0;
            }

            if npu.running_tasks.is_empty() {
                npu.status = NpuStatus::Idle;
            }
            debug!(job_id = %task.job_id, npu_id = %npu_id, "Released NPU");
        }

        anomalies
    }
}
