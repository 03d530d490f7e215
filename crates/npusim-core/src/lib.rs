//! npusim-core: Core types for the npusim cluster scheduling simulator
//!
//! This crate provides the data model shared by the policies and the engine:
//! - Tasks and their lifecycle state
//! - NPU devices and the cluster that owns them
//! - Simulation configuration
//! - Workload loading and ingestion-boundary validation
//! - Error handling

pub mod config;
pub mod error;
pub mod npu;
pub mod task;
pub mod workload;

pub use config::*;
pub use error::*;
pub use npu::*;
pub use task::*;
pub use workload::*;
