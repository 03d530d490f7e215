//! Task type definitions

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Kind of compute job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Training,
    LoraFinetune,
    Inference,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Training => write!(f, "Training"),
            TaskKind::LoraFinetune => write!(f, "LoRA-Finetune"),
            TaskKind::Inference => write!(f, "Inference"),
        }
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Waiting for devices (or not yet arrived)
    #[default]
    Pending,
    /// Running on its allocated devices
    Scheduled,
    /// Finished and released its devices
    Completed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "Pending"),
            TaskState::Scheduled => write!(f, "Scheduled"),
            TaskState::Completed => write!(f, "Completed"),
        }
    }
}

fn default_npu_requirement() -> u32 {
    1
}

fn default_priority() -> i32 {
    1
}

/// A compute job to be placed on the cluster
///
/// Identity and requirements are fixed at ingestion. The scheduling state
/// (`state`, `start_time`, `end_time`, `allocated_npu_ids`) is written only
/// by the simulation engine; policies read it but never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique job identifier
    pub job_id: String,
    /// Kind of job
    #[serde(rename = "task_type")]
    pub kind: TaskKind,
    /// Arrival time in simulated seconds
    pub arrival_time: f64,
    /// Estimated duration in seconds
    pub duration: f64,
    /// Memory required on each allocated device, in GB
    pub memory_requirement_gb: f64,
    /// Number of devices needed
    #[serde(default = "default_npu_requirement")]
    pub npu_requirement: u32,
    /// Reserved; no policy reads it yet
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Lifecycle state
    #[serde(default)]
    pub state: TaskState,
    /// Simulated start time, once scheduled
    #[serde(default)]
    pub start_time: Option<f64>,
    /// Simulated end time, once scheduled
    #[serde(default)]
    pub end_time: Option<f64>,
    /// Devices backing this task, once scheduled
    #[serde(default)]
    pub allocated_npu_ids: Vec<String>,
}

impl Task {
    /// Create a new pending task
    pub fn new(
        job_id: impl Into<String>,
        kind: TaskKind,
        arrival_time: f64,
        duration: f64,
        memory_requirement_gb: f64,
        npu_requirement: u32,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            arrival_time,
            duration,
            memory_requirement_gb,
            npu_requirement,
            priority: default_priority(),
            state: TaskState::Pending,
            start_time: None,
            end_time: None,
            allocated_npu_ids: Vec::new(),
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Check the per-task ingestion rules
    pub fn validate(&self) -> SimResult<()> {
        if self.job_id.trim().is_empty() {
            return Err(SimError::invalid_task(&self.job_id, "job id is empty"));
        }
        if !self.arrival_time.is_finite() || self.arrival_time < 0.0 {
            return Err(SimError::invalid_task(
                &self.job_id,
                format!("arrival time must be >= 0, got {}", self.arrival_time),
            ));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(SimError::invalid_task(
                &self.job_id,
                format!("duration must be > 0, got {}", self.duration),
            ));
        }
        if !self.memory_requirement_gb.is_finite() || self.memory_requirement_gb < 0.0 {
            return Err(SimError::invalid_task(
                &self.job_id,
                format!(
                    "memory requirement must be >= 0, got {}",
                    self.memory_requirement_gb
                ),
            ));
        }
        if self.npu_requirement == 0 {
            return Err(SimError::invalid_task(
                &self.job_id,
                "npu requirement must be at least 1",
            ));
        }
        Ok(())
    }

    /// Whether the engine has placed this task
    pub fn is_scheduled(&self) -> bool {
        self.start_time.is_some()
    }

    /// Time spent waiting for devices
    pub fn wait_time(&self) -> Option<f64> {
        self.start_time.map(|start| start - self.arrival_time)
    }

    /// Time from arrival to completion
    pub fn turnaround(&self) -> Option<f64> {
        match self.state {
            TaskState::Completed => self.end_time.map(|end| end - self.arrival_time),
            _ => None,
        }
    }
}
