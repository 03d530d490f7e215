//! npusim-engine: Discrete-event simulation engine for npusim
//!
//! This crate owns simulated time and all cluster mutation during a run:
//! - The ordered event queue (completions before arrivals on ties)
//! - The NPU allocator that commits and releases devices
//! - The simulator loop that drives a scheduling policy
//! - Run outcomes and summary reports

pub mod allocator;
pub mod event;
pub mod outcome;
pub mod report;
pub mod simulator;

pub use allocator::NpuAllocator;
pub use event::{EventKind, EventQueue, EventRecord};
pub use outcome::{Anomaly, Placement, SimulationOutcome, Unschedulable, UnschedulableReason};
pub use report::SimulationReport;
pub use simulator::Simulator;
