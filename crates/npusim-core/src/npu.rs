//! NPU devices and the cluster that owns them

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{SimError, SimResult};

/// Default device memory in GB
pub const DEFAULT_NPU_MEMORY_GB: f64 = 32.0;

/// Device status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NpuStatus {
    #[default]
    Idle,
    Busy,
}

impl std::fmt::Display for NpuStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NpuStatus::Idle => write!(f, "Idle"),
            NpuStatus::Busy => write!(f, "Busy"),
        }
    }
}

/// Represents a single NPU device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npu {
    /// Device identifier, unique within a cluster
    pub npu_id: String,
    /// Owning node (grouping only)
    pub node_id: String,
    /// Total memory in GB
    pub memory_capacity_gb: f64,
    /// Memory in use in GB
    pub current_memory_usage: f64,
    /// Current status
    pub status: NpuStatus,
    /// Job ids currently bound to this device
    #[serde(default)]
    pub running_tasks: Vec<String>,
}

impl Npu {
    /// Create an idle device
    pub fn new(npu_id: impl Into<String>, node_id: impl Into<String>, memory_capacity_gb: f64) -> Self {
        Self {
            npu_id: npu_id.into(),
            node_id: node_id.into(),
            memory_capacity_gb,
            current_memory_usage: 0.0,
            status: NpuStatus::Idle,
            running_tasks: Vec::new(),
        }
    }

    /// Whether the device can be handed to a new task
    pub fn is_idle(&self) -> bool {
        self.status == NpuStatus::Idle
    }

    /// Memory still available in GB
    pub fn free_memory(&self) -> f64 {
        (self.memory_capacity_gb - self.current_memory_usage).max(0.0)
    }

    /// Whether `memory_gb` more fits on this device
    pub fn fits(&self, memory_gb: f64) -> bool {
        self.current_memory_usage + memory_gb <= self.memory_capacity_gb
    }
}

/// The device pool
///
/// Devices keep their insertion order; policies rely on it as the stable
/// scan order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "ClusterSnapshot", into = "ClusterSnapshot")]
pub struct Cluster {
    npus: Vec<Npu>,
    index: HashMap<String, usize>,
}

/// Serialized form of a cluster
#[derive(Serialize, Deserialize)]
struct ClusterSnapshot {
    npus: Vec<Npu>,
}

impl TryFrom<ClusterSnapshot> for Cluster {
    type Error = SimError;

    fn try_from(snapshot: ClusterSnapshot) -> SimResult<Self> {
        let mut cluster = Cluster::new();
        for npu in snapshot.npus {
            cluster.add_npu(npu)?;
        }
        Ok(cluster)
    }
}

impl From<Cluster> for ClusterSnapshot {
    fn from(cluster: Cluster) -> Self {
        ClusterSnapshot { npus: cluster.npus }
    }
}

impl PartialEq for Cluster {
    fn eq(&self, other: &Self) -> bool {
        self.npus == other.npus
    }
}

impl Cluster {
    /// Create an empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Build `total` identical devices, `npus_per_node` to a node
    pub fn homogeneous(total: u32, memory_per_npu: f64, npus_per_node: u32) -> Self {
        let per_node = npus_per_node.max(1);
        let mut cluster = Self::new();
        for i in 0..total {
            let npu = Npu::new(
                format!("npu_{}", i),
                format!("node_{}", i / per_node),
                memory_per_npu,
            );
            cluster.npus.push(npu);
            cluster.index.insert(format!("npu_{}", i), i as usize);
        }
        cluster
    }

    /// Add a device; ids must be unique
    pub fn add_npu(&mut self, npu: Npu) -> SimResult<()> {
        if self.index.contains_key(&npu.npu_id) {
            return Err(SimError::DuplicateNpu(npu.npu_id));
        }
        self.index.insert(npu.npu_id.clone(), self.npus.len());
        self.npus.push(npu);
        Ok(())
    }

    /// Number of devices
    pub fn len(&self) -> usize {
        self.npus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npus.is_empty()
    }

    /// Devices in stable iteration order
    pub fn npus(&self) -> &[Npu] {
        &self.npus
    }

    /// Look up a device by id
    pub fn get(&self, npu_id: &str) -> Option<&Npu> {
        self.position(npu_id).map(|i| &self.npus[i])
    }

    /// Look up a device by id for mutation
    pub fn get_mut(&mut self, npu_id: &str) -> Option<&mut Npu> {
        match self.position(npu_id) {
            Some(i) => self.npus.get_mut(i),
            None => None,
        }
    }

    /// Largest single-device capacity, 0 for an empty cluster
    pub fn max_capacity(&self) -> f64 {
        self.npus
            .iter()
            .map(|n| n.memory_capacity_gb)
            .fold(0.0, f64::max)
    }

    /// Number of idle devices
    pub fn idle_count(&self) -> usize {
        self.npus.iter().filter(|n| n.is_idle()).count()
    }

    /// Sum of memory in use across all devices
    pub fn total_memory_usage(&self) -> f64 {
        self.npus.iter().map(|n| n.current_memory_usage).sum()
    }

    fn position(&self, npu_id: &str) -> Option<usize> {
        self.index.get(npu_id).copied()
    }
}
