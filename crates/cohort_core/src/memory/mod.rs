//! # Memory Management
//!
//! Reusable-instance pools for allocation-free steady-state operation.
//!
//! ## Design Philosophy
//!
//! Once the context has warmed up, entity churn and component mutation
//! recycle what they need:
//! - Entity records come back from the reuse pool
//! - Scratch lists for group updates come back from an [`ObjectPool`]
//! - Removed components are parked in [`ComponentPools`]

mod pool;

pub use pool::{ComponentPools, ObjectPool};
