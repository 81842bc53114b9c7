//! ahp-partition: assign flattened components to ranks and threads.
//!
//! Two interchangeable strategies:
//! - [`HierarchyAware`] keeps assembly subtrees together and spreads them across ranks
//! - [`Deferred`] assigns nothing and leaves placement to the host at load time
//!
//! Both are deterministic functions of the hierarchy and configuration, so every
//! process of a distributed run computes the same placement independently.

pub mod deferred;
pub mod hierarchy;
pub mod report;
pub mod strategy;

pub use deferred::Deferred;
pub use hierarchy::HierarchyAware;
pub use report::PartitionReport;
pub use strategy::{PartitionConfig, Partitioner, StrategyKind, partition};
