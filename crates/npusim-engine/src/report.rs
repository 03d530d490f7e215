//! Summary metrics for comparing policies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::SimulationOutcome;

/// Headline numbers for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Unique id for this report
    pub run_id: Uuid,
    /// When the report was produced (wall clock)
    pub generated_at: DateTime<Utc>,
    /// Policy under test
    pub policy: String,
    pub total_tasks: usize,
    pub completed: usize,
    pub unschedulable: usize,
    pub events: usize,
    pub anomalies: usize,
    /// Completion time of the last task
    pub makespan: f64,
    /// Mean start - arrival over completed tasks
    pub mean_wait: f64,
    /// Mean end - arrival over completed tasks
    pub mean_turnaround: f64,
    /// Busy device-seconds over device-seconds available until makespan
    pub utilization: f64,
}

impl SimulationReport {
    /// Summarize a finished run
    pub fn from_outcome(outcome: &SimulationOutcome) -> Self {
        let makespan = outcome.makespan();
        let completed = &outcome.completed;

        let mean = |values: Vec<f64>| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        let mean_wait = mean(completed.iter().filter_map(|t| t.wait_time()).collect());
        let mean_turnaround = mean(completed.iter().filter_map(|t| t.turnaround()).collect());

        let busy: f64 = completed
            .iter()
            .map(|t| t.duration * t.allocated_npu_ids.len() as f64)
            .sum();
        let capacity = outcome.cluster.len() as f64 * makespan;
        let utilization = if capacity > 0.0 { busy / capacity } else { 0.0 };

        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            policy: outcome.policy.clone(),
            total_tasks: outcome.total_tasks(),
            completed: completed.len(),
            unschedulable: outcome.unschedulable.len(),
            events: outcome.log.len(),
            anomalies: outcome.anomalies.len(),
            makespan,
            mean_wait,
            mean_turnaround,
            utilization,
        }
    }
}
