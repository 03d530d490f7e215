//! Error types for npusim

use thiserror::Error;

/// Main error type for npusim
#[derive(Error, Debug)]
pub enum SimError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A task failed validation at the ingestion boundary
    #[error("Invalid task '{job_id}': {reason}")]
    InvalidTask { job_id: String, reason: String },

    /// Two tasks share a job id
    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    /// Two devices share a device id
    #[error("Duplicate NPU id: {0}")]
    DuplicateNpu(String),

    /// Device not found in the cluster
    #[error("NPU not found: {0}")]
    NpuNotFound(String),

    /// Unknown scheduling policy name
    #[error("Unknown scheduling policy: {0}")]
    UnknownPolicy(String),

    /// An allocation could not be committed
    #[error("Allocation rejected for task '{job_id}': {reason}")]
    AllocationRejected { job_id: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for npusim operations
pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub(crate) fn invalid_task(job_id: &str, reason: impl Into<String>) -> Self {
        SimError::InvalidTask {
            job_id: job_id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for SimError {
    fn from(err: toml::de::Error) -> Self {
        SimError::Config(err.to_string())
    }
}
