//! Configuration types for npusim

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{SimError, SimResult};
use crate::npu::{Cluster, Npu, DEFAULT_NPU_MEMORY_GB};

/// Scheduling policy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// First-in first-out, first-fit over devices
    #[default]
    Fifo,
    /// Arrival order, tightest memory fit over devices
    BestFit,
    /// Adapter/topology-aware placeholder; places nothing
    #[serde(alias = "optimized")]
    AdapterAware,
}

impl PolicyKind {
    /// All selectable policies, in display order
    pub const ALL: [PolicyKind; 3] = [
        PolicyKind::Fifo,
        PolicyKind::BestFit,
        PolicyKind::AdapterAware,
    ];
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::Fifo => write!(f, "fifo"),
            PolicyKind::BestFit => write!(f, "best-fit"),
            PolicyKind::AdapterAware => write!(f, "adapter-aware"),
        }
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fifo" => Ok(PolicyKind::Fifo),
            "best-fit" | "bestfit" | "best_fit" => Ok(PolicyKind::BestFit),
            "adapter-aware" | "adapter_aware" | "optimized" => Ok(PolicyKind::AdapterAware),
            other => Err(SimError::UnknownPolicy(other.to_string())),
        }
    }
}

/// An explicitly configured device, for heterogeneous clusters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub npu_id: String,
    #[serde(default = "default_node_id")]
    pub node_id: String,
    pub memory_capacity_gb: f64,
}

fn default_node_id() -> String {
    "node_0".to_string()
}

/// Configuration for a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Devices in a homogeneous cluster
    pub total_npus: u32,
    /// Memory per device in GB
    pub memory_per_npu: f64,
    /// Devices grouped under one node id
    pub npus_per_node: u32,
    /// Scheduling policy
    pub algorithm: PolicyKind,
    /// Simulated-seconds cutoff; `None` runs until the queue drains
    pub duration_limit: Option<f64>,
    /// Explicit device list; overrides the homogeneous sizing when non-empty
    pub devices: Vec<DeviceSpec>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            total_npus: 8,
            memory_per_npu: DEFAULT_NPU_MEMORY_GB,
            npus_per_node: 8,
            algorithm: PolicyKind::Fifo,
            duration_limit: Some(3600.0),
            devices: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("Failed to read config file: {}", e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SimError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot describe a cluster
    pub fn validate(&self) -> SimResult<()> {
        if let Some(limit) = self.duration_limit {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(SimError::Config(format!(
                    "duration_limit must be positive, got {}",
                    limit
                )));
            }
        }

        if !self.devices.is_empty() {
            let mut seen = HashSet::new();
            for device in &self.devices {
                if !seen.insert(device.npu_id.as_str()) {
                    return Err(SimError::DuplicateNpu(device.npu_id.clone()));
                }
                if !device.memory_capacity_gb.is_finite() || device.memory_capacity_gb <= 0.0 {
                    return Err(SimError::Config(format!(
                        "device {} must have positive memory",
                        device.npu_id
                    )));
                }
            }
            return Ok(());
        }

        if self.total_npus == 0 {
            return Err(SimError::Config("total_npus must be at least 1".to_string()));
        }
        if !self.memory_per_npu.is_finite() || self.memory_per_npu <= 0.0 {
            return Err(SimError::Config(format!(
                "memory_per_npu must be positive, got {}",
                self.memory_per_npu
            )));
        }
        if self.npus_per_node == 0 {
            return Err(SimError::Config(
                "npus_per_node must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the cluster this configuration describes
    pub fn build_cluster(&self) -> SimResult<Cluster> {
        self.validate()?;
        if self.devices.is_empty() {
            return Ok(Cluster::homogeneous(
                self.total_npus,
                self.memory_per_npu,
                self.npus_per_node,
            ));
        }

        let mut cluster = Cluster::new();
        for device in &self.devices {
            cluster.add_npu(Npu::new(
                device.npu_id.clone(),
                device.node_id.clone(),
                device.memory_capacity_gb,
            ))?;
        }
        Ok(cluster)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
