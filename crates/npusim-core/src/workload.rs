//! Workload loading and ingestion-boundary validation

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{SimError, SimResult};
use crate::npu::Cluster;
use crate::task::{Task, TaskKind, TaskState};

/// A list of tasks submitted for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub tasks: Vec<Task>,
}

/// JSON workloads may be a bare array or a `{ "tasks": [...] }` object
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonWorkload {
    Bare(Vec<Task>),
    Wrapped(Workload),
}

impl Workload {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Load a workload from a `.toml` or `.json` file
    pub fn from_file(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            other => Err(SimError::Config(format!(
                "Unsupported workload format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Parse a TOML workload (`[[tasks]]` tables)
    pub fn from_toml(content: &str) -> SimResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse a JSON workload
    pub fn from_json(content: &str) -> SimResult<Self> {
        let parsed: JsonWorkload = serde_json::from_str(content)?;
        Ok(match parsed {
            JsonWorkload::Bare(tasks) => Self { tasks },
            JsonWorkload::Wrapped(workload) => workload,
        })
    }

    /// Generate `n` identical training jobs arriving every two seconds
    pub fn mock(n: usize) -> Self {
        let tasks = (0..n)
            .map(|i| {
                Task::new(
                    format!("job_{}", i),
                    TaskKind::Training,
                    i as f64 * 2.0,
                    10.0,
                    16.0,
                    1,
                )
            })
            .collect();
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Validate against the cluster the workload will run on
    pub fn validate(&self, cluster: &Cluster) -> SimResult<()> {
        validate_tasks(&self.tasks, cluster)
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}

/// Reject inputs that can never be simulated correctly
///
/// Runs before any simulation starts: unique job ids, the per-task field
/// rules, device count within cluster size, and memory within the largest
/// device. Tasks must also arrive unscheduled.
pub fn validate_tasks(tasks: &[Task], cluster: &Cluster) -> SimResult<()> {
    let mut seen = HashSet::with_capacity(tasks.len());
    let cluster_size = cluster.len();
    let max_capacity = cluster.max_capacity();

    for task in tasks {
        task.validate()?;

        if !seen.insert(task.job_id.as_str()) {
            return Err(SimError::DuplicateTask(task.job_id.clone()));
        }
        if task.npu_requirement as usize > cluster_size {
            return Err(SimError::invalid_task(
                &task.job_id,
                format!(
                    "requires {} NPUs but the cluster has {}",
                    task.npu_requirement, cluster_size
                ),
            ));
        }
        if task.memory_requirement_gb > max_capacity {
            return Err(SimError::invalid_task(
                &task.job_id,
                format!(
                    "requires {} GB but the largest NPU has {} GB",
                    task.memory_requirement_gb, max_capacity
                ),
            ));
        }
        if task.is_scheduled()
            || task.end_time.is_some()
            || task.state != TaskState::Pending
            || !task.allocated_npu_ids.is_empty()
        {
            return Err(SimError::invalid_task(
                &task.job_id,
                "task already carries scheduling state",
            ));
        }
    }
    Ok(())
}
