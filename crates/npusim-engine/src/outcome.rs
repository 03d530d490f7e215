//! Run results handed to reporting and comparison tooling

use npusim_core::{Cluster, Task};
use serde::{Deserialize, Serialize};

use crate::event::EventRecord;

/// A non-fatal irregularity observed during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// Release would have driven device usage below zero
    NegativeUsageClamped {
        time: f64,
        npu_id: String,
        job_id: String,
        usage: f64,
    },
    /// A device was released for a task no longer bound to it
    DuplicateRelease {
        time: f64,
        npu_id: String,
        job_id: String,
    },
    /// A policy returned an allocation the engine refused to commit
    PolicyViolation {
        time: f64,
        job_id: String,
        reason: String,
    },
    /// The task could never be placed, even on an idle cluster
    StalledTask { time: f64, job_id: String },
}

/// Why a task never started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnschedulableReason {
    /// No remaining event could free enough capacity
    Stalled,
    /// The simulated-time cutoff was reached first
    CutoffReached,
}

impl std::fmt::Display for UnschedulableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnschedulableReason::Stalled => write!(f, "stalled"),
            UnschedulableReason::CutoffReached => write!(f, "cutoff reached"),
        }
    }
}

/// A task that was still pending when the run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unschedulable {
    pub job_id: String,
    pub reason: UnschedulableReason,
}

/// Where and when a task ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub job_id: String,
    pub npu_ids: Vec<String>,
    pub start_time: f64,
    pub end_time: f64,
}

/// Everything a finished run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutcome {
    /// Policy that made the decisions
    pub policy: String,
    /// Processed events, in processing order
    pub log: Vec<EventRecord>,
    /// Tasks that ran to completion, in completion order
    pub completed: Vec<Task>,
    /// Tasks that never started
    pub pending: Vec<Task>,
    /// Final device state
    pub cluster: Cluster,
    /// Pending tasks with the reason they never started
    pub unschedulable: Vec<Unschedulable>,
    /// Irregularities recorded along the way
    pub anomalies: Vec<Anomaly>,
    /// Simulated time of the last processed event
    pub final_time: f64,
    /// Cutoff in effect for the run
    pub duration_limit: Option<f64>,
}

impl SimulationOutcome {
    /// Completion time of the last task, 0 when nothing completed
    pub fn makespan(&self) -> f64 {
        self.completed
            .iter()
            .filter_map(|t| t.end_time)
            .fold(0.0, f64::max)
    }

    /// Number of tasks the run was given
    pub fn total_tasks(&self) -> usize {
        self.completed.len() + self.pending.len()
    }

    /// Placements of completed tasks, ordered by start time then job id
    pub fn placements(&self) -> Vec<Placement> {
        let mut placements: Vec<Placement> = self
            .completed
            .iter()
            .filter_map(|t| {
                Some(Placement {
                    job_id: t.job_id.clone(),
                    npu_ids: t.allocated_npu_ids.clone(),
                    start_time: t.start_time?,
                    end_time: t.end_time?,
                })
            })
            .collect();
        placements.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        placements
    }
}
