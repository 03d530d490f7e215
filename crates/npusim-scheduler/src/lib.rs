//! npusim-scheduler: Scheduling policies for npusim
//!
//! This crate provides the placement decisions the engine asks for after
//! every event:
//! - The `SchedulingPolicy` trait and `Allocation` result type
//! - FIFO (baseline), best-fit, and the adapter-aware slot
//! - Policy selection from configuration

pub mod adapter_aware;
pub mod best_fit;
pub mod fifo;
pub mod policy;

pub use adapter_aware::AdapterAwarePolicy;
pub use best_fit::BestFitPolicy;
pub use fifo::FifoPolicy;
pub use policy::{build_policy, Allocation, SchedulingPolicy};
